//! Records for the cooling variants of power-plant technologies.
//!
//! Every variant outputs the commodity linking it to its base technology. Variants which use
//! water also withdraw from a supply commodity, return part of it and may use electricity and
//! release heat into the water body.
use super::table::{RATIO_UNIT, YEAR_UNIT};
use super::{Assembly, AssemblyContext, Stage, log_progress};
use crate::commodity::{
    CommodityID, ELECTRICITY, LEVEL_SECONDARY, LEVEL_SHARE, LEVEL_WATER_SUPPLY, LevelID,
    cooling_link_commodity,
};
use crate::cooling::{CoefficientSource, derive};
use crate::error::PipelineError;
use crate::historical::{CapacityActivity, allocate, locked_in, new_capacity, variant_series};
use crate::parameter::{ParameterKey, ParameterName, ParameterSet};
use crate::region::RegionID;
use crate::technology::{CoolingVariant, TechnologyID};
use crate::units::usd_per_kw_to_musd_per_gw;
use crate::year::{locked_in_gap_years, vintage_activity_years};
use anyhow::Result;
use indexmap::IndexMap;
use itertools::Itertools;
use std::collections::BTreeMap;

/// Unit of water flows per unit of power-plant activity
const WATER_PER_ACTIVITY_UNIT: &str = "km3/GWa";

/// Historical values of one base technology in one region, allocated to its variants
struct AllocatedHistory {
    capacity: BTreeMap<(TechnologyID, u32), f64>,
    activity: BTreeMap<(TechnologyID, u32), f64>,
}

/// Add records for all cooling variants
pub fn add_cooling(context: &AssemblyContext, assembly: &mut Assembly) {
    let model = context.model;
    let bases = model.cooled_technologies();
    for (index, base) in bases.iter().enumerate() {
        log_progress(Stage::Cooling, base, index, bases.len());

        // Without efficiency data nothing can be derived for any variant
        let source = match CoefficientSource::lookup(
            base,
            &model.efficiency_overrides,
            &model.base_efficiency,
        ) {
            Ok(source) => source,
            Err(err) => {
                assembly.fatal(format!("{base}: {err}"));
                continue;
            }
        };

        for region in model.iter_regions() {
            let variants = model
                .cooling_variants(base)
                .filter_map(|variant| {
                    let share = *model.cooling_shares[variant].get(region)?;
                    Some((variant, share))
                })
                .collect_vec();
            if variants.is_empty() {
                continue;
            }

            let shares: IndexMap<TechnologyID, f64> = variants
                .iter()
                .map(|(variant, share)| (variant.id.clone(), *share))
                .collect();
            let history = match allocate_history(context, base, region, &shares) {
                Ok(history) => history,
                Err(err) => {
                    assembly.fatal(format!("{base} in {region}: {err:#}"));
                    continue;
                }
            };

            for (variant, _) in variants {
                assembly.run_stratum(&variant.id, region, false, context.buffer(), |buffer| {
                    add_variant_records(context, variant, region, &source, &history, buffer)
                });
            }
        }
    }
}

/// Allocate the historical capacity and activity of a base technology to its variants
fn allocate_history(
    context: &AssemblyContext,
    base: &TechnologyID,
    region: &RegionID,
    shares: &IndexMap<TechnologyID, f64>,
) -> Result<AllocatedHistory> {
    let cutoff = context.model.parameters.historical_cutoff;
    let history = context
        .model
        .historical_power
        .get(&(base.clone(), region.clone()));
    let series = |get: fn(&CapacityActivity) -> f64| -> BTreeMap<u32, f64> {
        history
            .into_iter()
            .flatten()
            .filter(|&(&year, _)| year <= cutoff)
            .map(|(&year, value)| (year, get(value)))
            .collect()
    };

    Ok(AllocatedHistory {
        capacity: allocate(
            &format!("{base} capacity in {region}"),
            &series(|value| value.capacity),
            shares,
        )?,
        activity: allocate(
            &format!("{base} activity in {region}"),
            &series(|value| value.activity),
            shares,
        )?,
    })
}

/// Add the records of one cooling variant in one region
fn add_variant_records(
    context: &AssemblyContext,
    variant: &CoolingVariant,
    region: &RegionID,
    source: &CoefficientSource,
    history: &AllocatedHistory,
    buffer: &mut ParameterSet,
) -> Result<()> {
    let model = context.model;
    let parameters = &model.parameters;
    let row = model
        .cooling_coefficients
        .get(&(variant.base.clone(), variant.mode))
        .ok_or_else(|| {
            PipelineError::missing_coefficient(
                &variant.id,
                format!("no coefficients for {} cooling of {}", variant.mode, variant.base),
            )
        })?;

    let pairs = vintage_activity_years(context.years(), row.technical_lifetime);
    let efficiency = source.efficiency_series(&pairs);
    let coefficients = derive(&efficiency, row, parameters.coefficient_level)?;
    let supply = match row.water_supply_type {
        Some(supply) => Some(supply),
        None if variant.mode.uses_water() => {
            return Err(
                PipelineError::missing_coefficient(&variant.id, "no water supply type").into(),
            );
        }
        None => None,
    };

    let link = cooling_link_commodity(variant.base.as_str());
    let share_level = LevelID::from(LEVEL_SHARE);
    let supply_level = LevelID::from(LEVEL_WATER_SUPPLY);
    let electricity = CommodityID::from(ELECTRICITY);
    let electricity_level = LevelID::from(LEVEL_SECONDARY);
    let base = ParameterKey::technology(region, &variant.id);

    for &(vintage, year) in &pairs {
        for mode in &parameters.modes {
            let key = base.clone().with_years(vintage, year);
            if let Some(supply) = supply
                && coefficients.emits_thermal_pollution
            {
                buffer.add_value(
                    ParameterName::EmissionFactor,
                    key.clone()
                        .with_emission(&supply.thermal_pollution_emission())
                        .with_mode(mode),
                    coefficients.thermal_pollution,
                    RATIO_UNIT,
                )?;
            }

            for (time, _) in context.time_slices() {
                let key = key.clone().with_mode_time(mode, time);
                buffer.add_value(
                    ParameterName::Output,
                    key.clone().with_commodity(&link, &share_level),
                    1.0,
                    RATIO_UNIT,
                )?;

                let Some(supply) = supply else {
                    continue;
                };
                let withdrawal = coefficients.withdrawal.get(&(vintage, year)).copied();
                let Some(withdrawal) = withdrawal else {
                    continue;
                };
                buffer.add_value(
                    ParameterName::Input,
                    key.clone()
                        .with_commodity(&supply.supply_commodity(), &supply_level),
                    withdrawal,
                    WATER_PER_ACTIVITY_UNIT,
                )?;

                let return_flow = coefficients
                    .return_flow
                    .get(&(vintage, year))
                    .copied()
                    .unwrap_or(0.0);
                if return_flow > 0.0 {
                    buffer.add_value(
                        ParameterName::Output,
                        key.clone()
                            .with_commodity(&supply.return_commodity(), &supply_level),
                        return_flow,
                        WATER_PER_ACTIVITY_UNIT,
                    )?;
                }
                if coefficients.parasitic_electricity > 0.0 {
                    buffer.add_value(
                        ParameterName::Input,
                        key.with_commodity(&electricity, &electricity_level),
                        coefficients.parasitic_electricity,
                        "GWa/GWa",
                    )?;
                }
            }
        }
    }

    for vintage in pairs.iter().map(|&(vintage, _)| vintage).dedup() {
        let key = base.clone().with_vintage(vintage);
        buffer.add_value(
            ParameterName::InvCost,
            key.clone(),
            usd_per_kw_to_musd_per_gw(row.inv_cost_usd_per_kw),
            "MUSD/GW",
        )?;
        buffer.add_value(
            ParameterName::TechnicalLifetime,
            key,
            f64::from(row.technical_lifetime),
            YEAR_UNIT,
        )?;
    }

    add_history(context, variant, region, history, buffer)
}

/// Add historical and locked-in capacity and activity of a variant
fn add_history(
    context: &AssemblyContext,
    variant: &CoolingVariant,
    region: &RegionID,
    history: &AllocatedHistory,
    buffer: &mut ParameterSet,
) -> Result<()> {
    let parameters = &context.model.parameters;
    let base = ParameterKey::technology(region, &variant.id);

    let capacity = variant_series(&history.capacity, &variant.id);
    for (year, value) in new_capacity(&capacity, parameters.historical_cutoff) {
        buffer.add_value(
            ParameterName::HistoricalNewCapacity,
            base.clone().with_vintage(year),
            value,
            "GW",
        )?;
    }
    for (year, activity) in variant_series(&history.activity, &variant.id) {
        add_activity(context, &base, year, activity, buffer)?;
    }

    for year in locked_in_gap_years(
        context.years(),
        parameters.historical_cutoff,
        parameters.first_model_year,
    ) {
        let value = locked_in(&context.model.locked_in, &variant.id, region, year);
        if value.capacity > 0.0 {
            buffer.add_value(
                ParameterName::HistoricalNewCapacity,
                base.clone().with_vintage(year),
                value.capacity,
                "GW",
            )?;
        }
        if value.activity > 0.0 {
            add_activity(context, &base, year, value.activity, buffer)?;
        }
    }

    Ok(())
}

/// Add historical activity for a year, split across time slices by duration
fn add_activity(
    context: &AssemblyContext,
    base: &ParameterKey,
    year: u32,
    activity: f64,
    buffer: &mut ParameterSet,
) -> Result<()> {
    for (time, duration) in context.time_slices() {
        buffer.add_value(
            ParameterName::HistoricalActivity,
            base.clone()
                .with_activity_year(year)
                .with_mode_time(context.default_mode(), time),
            activity * duration,
            "GWa",
        )?;
    }

    Ok(())
}
