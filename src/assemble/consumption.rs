//! Consumptive water use of technologies and historical extraction.
use super::table::RATIO_UNIT;
use super::{Assembly, AssemblyContext};
use crate::commodity::{FRESHWATER_SUPPLY, WaterSupplyType};
use crate::parameter::{ParameterKey, ParameterName, ParameterSet};
use crate::region::RegionID;
use crate::technology::TechnologyID;
use crate::time_slice::TimeSliceID;
use crate::year::historical_years;
use anyhow::Result;
use indexmap::{IndexMap, IndexSet};
use log::info;
use std::collections::BTreeMap;

/// Unit of historical extraction
const EXTRACTION_UNIT: &str = "km3/yr";

/// Add consumption emission factors for every technology which both withdraws and returns water.
///
/// The factor is the withdrawal minus the return flow for the same key. Records for which the
/// return flow exceeds the withdrawal are clamped to zero and reported as a warning per
/// (technology, region).
pub fn add_consumption_emissions(assembly: &mut Assembly) {
    let mut buffer = ParameterSet::new(assembly.parameters.digits());
    let mut clamped: IndexMap<(RegionID, TechnologyID), usize> = IndexMap::new();

    let inputs = assembly
        .parameters
        .records(ParameterName::Input)
        .collect::<Vec<_>>();
    for input in inputs {
        let Some(supply) = input
            .key
            .commodity
            .as_ref()
            .and_then(|commodity| WaterSupplyType::from_supply_commodity(commodity.as_str()))
        else {
            continue;
        };

        let output_key = ParameterKey {
            commodity: Some(supply.return_commodity()),
            ..input.key.clone()
        };
        let Some(output) = assembly.parameters.get(ParameterName::Output, &output_key) else {
            continue;
        };

        // The factor does not depend on the time slice
        let key = ParameterKey {
            commodity: None,
            level: None,
            time: None,
            ..input.key.clone()
        }
        .with_emission(&supply.consumption_emission());
        if buffer.get(ParameterName::EmissionFactor, &key).is_some() {
            continue;
        }

        let mut value = input.value - output;
        if value < 0.0 {
            if let Some((region, technology)) = key.node_technology() {
                *clamped
                    .entry((region.clone(), technology.clone()))
                    .or_default() += 1;
            }
            value = 0.0;
        }

        if let Err(err) = buffer.add_value(ParameterName::EmissionFactor, key, value, RATIO_UNIT) {
            assembly.fatal(format!("Consumption emission factors: {err:#}"));
            return;
        }
    }

    for ((region, technology), count) in clamped {
        assembly.warn(
            Some(&technology),
            Some(&region),
            format!(
                "Return flow of {technology} in {region} exceeds its withdrawal for {count} \
                 record(s); consumption set to zero"
            ),
        );
    }

    info!("[consumption] {} emission factors", buffer.len());
    if let Err(err) = assembly.parameters.merge(buffer) {
        assembly.fatal(format!("Consumption emission factors: {err:#}"));
    }
}

/// Add historical activity of extraction technologies.
///
/// In each historical year the fresh water withdrawn by all sectors and by cooling variants is
/// split across extraction technologies by their configured shares. Extraction technologies
/// whose records were not assembled for a region get no historical activity there.
pub fn add_historical_extraction(context: &AssemblyContext, assembly: &mut Assembly) {
    let parameters = &context.model.parameters;
    if parameters.extraction_shares.is_empty() {
        return;
    }

    let cooling = cooling_withdrawal(context, &assembly.parameters);
    let mut buffer = context.buffer();
    for region in context.model.iter_regions() {
        let result = add_regional_extraction(context, assembly, &cooling, region, &mut buffer);
        if let Err(err) = result {
            assembly.fatal(format!("Historical extraction in {region}: {err:#}"));
        }
    }

    if let Err(err) = assembly.parameters.merge(buffer) {
        assembly.fatal(format!("Historical extraction: {err:#}"));
    }
}

fn add_regional_extraction(
    context: &AssemblyContext,
    assembly: &Assembly,
    cooling: &BTreeMap<(RegionID, u32, TimeSliceID), f64>,
    region: &RegionID,
    buffer: &mut ParameterSet,
) -> Result<()> {
    let parameters = &context.model.parameters;
    for year in historical_years(context.years(), parameters.historical_cutoff) {
        let demand = context.demand.total_withdrawal(region, year).value();
        for (time, duration) in context.time_slices() {
            let cooling = cooling
                .get(&(region.clone(), year, time.clone()))
                .copied()
                .unwrap_or(0.0);
            let total = demand * duration + cooling;

            for (technology, &share) in &parameters.extraction_shares {
                let value = total * share;
                if value <= 0.0 || !assembly.succeeded(technology, region) {
                    continue;
                }
                buffer.add_value(
                    ParameterName::HistoricalActivity,
                    ParameterKey::technology(region, technology)
                        .with_activity_year(year)
                        .with_mode_time(context.default_mode(), time),
                    value,
                    EXTRACTION_UNIT,
                )?;
            }
        }
    }

    Ok(())
}

/// Fresh water withdrawn by cooling variants per region, year and time slice.
///
/// Historical activity is multiplied by the withdrawal intensity of the latest vintage active in
/// that year.
fn cooling_withdrawal(
    context: &AssemblyContext,
    parameters: &ParameterSet,
) -> BTreeMap<(RegionID, u32, TimeSliceID), f64> {
    let variants: IndexSet<&TechnologyID> = context
        .model
        .cooling_shares
        .keys()
        .map(|variant| &variant.id)
        .collect();

    // Keyed by region, technology, activity year, mode and time slice
    let mut intensity = BTreeMap::new();
    for input in parameters.records(ParameterName::Input) {
        let key = input.key;
        if key.commodity.as_ref().map(|commodity| commodity.as_str()) != Some(FRESHWATER_SUPPLY) {
            continue;
        }
        let (Some(region), Some(technology), Some(vintage), Some(year), Some(mode), Some(time)) =
            (key.node, key.technology, key.year_vtg, key.year_act, key.mode, key.time)
        else {
            continue;
        };
        if !variants.contains(&technology) {
            continue;
        }

        // Records are ordered by vintage, so the latest one wins
        intensity.insert((region, technology, year, mode, time), (vintage, input.value));
    }

    let mut withdrawal = BTreeMap::new();
    for activity in parameters.records(ParameterName::HistoricalActivity) {
        let key = activity.key;
        let (Some(region), Some(technology), Some(year), Some(mode), Some(time)) =
            (key.node, key.technology, key.year_act, key.mode, key.time)
        else {
            continue;
        };
        let Some(&(_, value)) =
            intensity.get(&(region.clone(), technology, year, mode, time.clone()))
        else {
            continue;
        };
        *withdrawal.entry((region, year, time)).or_insert(0.0) += activity.value * value;
    }

    withdrawal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commodity::{FRESH_RETURN, LEVEL_WATER_SUPPLY};
    use float_cmp::assert_approx_eq;

    fn flow_key(commodity: &str, vintage: u32, time: &str) -> ParameterKey {
        ParameterKey::technology(&"R11_AFR".into(), &"coal_ppl__ot_fresh".into())
            .with_years(vintage, 2030)
            .with_mode_time(&"M1".into(), &time.into())
            .with_commodity(&commodity.into(), &LEVEL_WATER_SUPPLY.into())
    }

    fn emission_key(vintage: u32) -> ParameterKey {
        ParameterKey::technology(&"R11_AFR".into(), &"coal_ppl__ot_fresh".into())
            .with_years(vintage, 2030)
            .with_mode(&"M1".into())
            .with_emission(&"fresh_consumption".into())
    }

    fn add_flows(assembly: &mut Assembly, vintage: u32, input: f64, output: f64) {
        for time in ["summer", "winter"] {
            assembly
                .parameters
                .add_value(
                    ParameterName::Input,
                    flow_key(FRESHWATER_SUPPLY, vintage, time),
                    input,
                    "km3/GWa",
                )
                .unwrap();
            assembly
                .parameters
                .add_value(
                    ParameterName::Output,
                    flow_key(FRESH_RETURN, vintage, time),
                    output,
                    "km3/GWa",
                )
                .unwrap();
        }
    }

    #[test]
    fn consumption_is_withdrawal_minus_return() {
        let mut assembly = Assembly::new(6);
        add_flows(&mut assembly, 2020, 0.5, 0.45);
        add_consumption_emissions(&mut assembly);

        let value = assembly
            .parameters
            .get(ParameterName::EmissionFactor, &emission_key(2020))
            .unwrap();
        assert_approx_eq!(f64, value, 0.05);
        assert_eq!(
            assembly
                .parameters
                .records(ParameterName::EmissionFactor)
                .count(),
            1
        );
        assert!(assembly.warnings.is_empty());
    }

    #[test]
    fn negative_consumption_is_clamped_with_warning() {
        let mut assembly = Assembly::new(6);
        add_flows(&mut assembly, 2020, 0.4, 0.5);
        add_flows(&mut assembly, 2030, 0.4, 0.3);
        add_consumption_emissions(&mut assembly);

        assert_eq!(
            assembly
                .parameters
                .get(ParameterName::EmissionFactor, &emission_key(2020)),
            Some(0.0)
        );
        let value = assembly
            .parameters
            .get(ParameterName::EmissionFactor, &emission_key(2030))
            .unwrap();
        assert_approx_eq!(f64, value, 0.1);

        assert!(assembly.errors.is_empty());
        assert_eq!(assembly.warnings.len(), 1);
        assert_eq!(
            assembly.warnings[0].technology,
            Some("coal_ppl__ot_fresh".into())
        );
        assert!(assembly.warnings[0].message.contains("1 record(s)"));
    }
}
