//! Records for technologies whose coefficients come straight from the technology data table.
use super::{Assembly, AssemblyContext, Stage, log_progress};
use crate::commodity::{CommodityID, ELECTRICITY, LEVEL_SECONDARY, LevelID};
use crate::error::PipelineError;
use crate::parameter::{ParameterKey, ParameterName, ParameterSet};
use crate::region::RegionID;
use crate::technology::{Technology, TechnologyFamily};
use crate::units::{
    kwh_per_m3_to_gwa_per_km3, usd_per_m3_per_day_to_musd_per_km3_per_year,
    usd_per_m3_to_musd_per_km3,
};
use crate::year::vintage_activity_years;
use anyhow::Result;
use itertools::Itertools;

/// Unit of input and output ratios
pub const RATIO_UNIT: &str = "-";
/// Unit of capacity-related costs
pub const CAPACITY_COST_UNIT: &str = "MUSD/km3/yr";
/// Unit of activity-related costs
pub const ACTIVITY_COST_UNIT: &str = "MUSD/km3";
/// Unit of lifetimes
pub const YEAR_UNIT: &str = "y";

/// Add records for every technology of a family in every region it is requested for
pub fn add_family(
    stage: Stage,
    context: &AssemblyContext,
    assembly: &mut Assembly,
    family: TechnologyFamily,
) {
    let technologies = context.model.iter_family(family).collect_vec();
    for (index, technology) in technologies.iter().enumerate() {
        log_progress(stage, &technology.id, index, technologies.len());
        for region in &technology.regions {
            assembly.run_stratum(
                &technology.id,
                region,
                family.is_required(),
                context.buffer(),
                |buffer| add_technology_records(context, technology, region, buffer),
            );
        }
    }
}

/// Add the input, output, cost and lifetime records of a technology in one region
pub fn add_technology_records(
    context: &AssemblyContext,
    technology: &Technology,
    region: &RegionID,
    buffer: &mut ParameterSet,
) -> Result<()> {
    let parameters = &context.model.parameters;
    let data = context
        .model
        .technology_data
        .lookup(&technology.id, region)
        .ok_or_else(|| PipelineError::missing_coefficient(&technology.id, "no technology data"))?;
    let lifetime = data.technical_lifetime.ok_or_else(|| {
        PipelineError::missing_coefficient(&technology.id, "no technical lifetime")
    })?;

    let output_default = if technology.family == TechnologyFamily::Distribution {
        parameters.combined_efficiency
    } else {
        1.0
    };
    let electricity_commodity = CommodityID::from(ELECTRICITY);
    let electricity_level = LevelID::from(LEVEL_SECONDARY);
    let electricity = data
        .electricity_kwh_per_m3
        .filter(|&value| value > 0.0)
        .map(kwh_per_m3_to_gwa_per_km3);

    let pairs = vintage_activity_years(context.years(), lifetime);
    let base = ParameterKey::technology(region, &technology.id);
    for &(vintage, year) in &pairs {
        let key = base.clone().with_years(vintage, year);
        for mode in &parameters.modes {
            for (time, _) in context.time_slices() {
                let key = key.clone().with_mode_time(mode, time);
                if let Some(input) = &data.input {
                    buffer.add_value(
                        ParameterName::Input,
                        key.clone().with_commodity(&input.commodity, &input.level),
                        input.value.unwrap_or(1.0),
                        RATIO_UNIT,
                    )?;
                }
                if let Some(value) = electricity {
                    buffer.add_value(
                        ParameterName::Input,
                        key.clone()
                            .with_commodity(&electricity_commodity, &electricity_level),
                        value,
                        "GWa/km3",
                    )?;
                }
                if let Some(output) = &data.output {
                    buffer.add_value(
                        ParameterName::Output,
                        key.clone().with_commodity(&output.commodity, &output.level),
                        output.value.unwrap_or(output_default),
                        RATIO_UNIT,
                    )?;
                }
                if let Some(cost) = data.var_cost_usd_per_m3 {
                    buffer.add_value(
                        ParameterName::VarCost,
                        key,
                        usd_per_m3_to_musd_per_km3(cost),
                        ACTIVITY_COST_UNIT,
                    )?;
                }
            }
        }

        if let Some(factor) = data.capacity_factor {
            for (time, _) in context.time_slices() {
                buffer.add_value(
                    ParameterName::CapacityFactor,
                    key.clone().with_time(time),
                    factor,
                    RATIO_UNIT,
                )?;
            }
        }
        if let Some(cost) = data.fix_cost_usd_per_m3_per_day {
            buffer.add_value(
                ParameterName::FixCost,
                key,
                usd_per_m3_per_day_to_musd_per_km3_per_year(cost),
                CAPACITY_COST_UNIT,
            )?;
        }
    }

    for vintage in pairs.iter().map(|&(vintage, _)| vintage).dedup() {
        let key = base.clone().with_vintage(vintage);
        if let Some(cost) = data.inv_cost_usd_per_m3_per_day {
            buffer.add_value(
                ParameterName::InvCost,
                key.clone(),
                usd_per_m3_per_day_to_musd_per_km3_per_year(cost),
                CAPACITY_COST_UNIT,
            )?;
        }
        buffer.add_value(
            ParameterName::TechnicalLifetime,
            key.clone(),
            f64::from(lifetime),
            YEAR_UNIT,
        )?;
        if let Some(time) = data.construction_time {
            buffer.add_value(
                ParameterName::ConstructionTime,
                key,
                f64::from(time),
                YEAR_UNIT,
            )?;
        }
    }

    Ok(())
}
