//! Records for desalination technologies, including their historical capacity and activity.
use super::table::add_technology_records;
use super::{Assembly, AssemblyContext, Stage, log_progress};
use crate::historical::{allocate, new_capacity, variant_series};
use crate::parameter::{ParameterKey, ParameterName, ParameterSet};
use crate::region::RegionID;
use crate::technology::{Technology, TechnologyFamily, TechnologyID};
use anyhow::Result;
use indexmap::IndexMap;
use itertools::Itertools;
use std::collections::BTreeMap;

/// Unit of desalination capacity and activity
const WATER_UNIT: &str = "km3/yr";

/// Add records for all desalination technologies
pub fn add_desalination(context: &AssemblyContext, assembly: &mut Assembly) {
    let mut histories = BTreeMap::new();
    for region in context.model.iter_regions() {
        match regional_history(context, region) {
            Ok(history) => {
                histories.insert(region.clone(), history);
            }
            Err(err) => assembly.fatal(format!("Desalination history in {region}: {err:#}")),
        }
    }

    let technologies = context
        .model
        .iter_family(TechnologyFamily::Desalination)
        .collect_vec();
    for (index, technology) in technologies.iter().enumerate() {
        log_progress(Stage::Desalination, &technology.id, index, technologies.len());
        for region in &technology.regions {
            let Some(history) = histories.get(region) else {
                continue;
            };
            assembly.run_stratum(&technology.id, region, false, context.buffer(), |buffer| {
                add_technology_records(context, technology, region, buffer)?;
                add_history(context, technology, region, history, buffer)
            });
        }
    }
}

/// Historical desalination capacity of a region, allocated to technologies by their shares
fn regional_history(
    context: &AssemblyContext,
    region: &RegionID,
) -> Result<BTreeMap<(TechnologyID, u32), f64>> {
    let desalination = &context.model.desalination;
    let Some(capacity) = desalination.historical_capacity.get(region) else {
        return Ok(BTreeMap::new());
    };
    let cutoff = context.model.parameters.historical_cutoff;
    let capacity: BTreeMap<u32, f64> = capacity.range(..=cutoff).map(|(&y, &v)| (y, v)).collect();
    let shares: IndexMap<TechnologyID, f64> = desalination
        .shares
        .iter()
        .filter_map(|(id, shares)| Some((id.clone(), *shares.get(region)?)))
        .collect();

    allocate(&format!("desalination capacity in {region}"), &capacity, &shares)
}

/// Add historical new capacity and activity of a desalination technology
fn add_history(
    context: &AssemblyContext,
    technology: &Technology,
    region: &RegionID,
    history: &BTreeMap<(TechnologyID, u32), f64>,
    buffer: &mut ParameterSet,
) -> Result<()> {
    let parameters = &context.model.parameters;
    let base = ParameterKey::technology(region, &technology.id);
    let capacity = variant_series(history, &technology.id);

    for (year, value) in new_capacity(&capacity, parameters.historical_cutoff) {
        buffer.add_value(
            ParameterName::HistoricalNewCapacity,
            base.clone().with_vintage(year),
            value,
            WATER_UNIT,
        )?;
    }

    // Historical plants are assumed to run at full capacity
    for (year, value) in capacity {
        for (time, duration) in context.time_slices() {
            buffer.add_value(
                ParameterName::HistoricalActivity,
                base.clone()
                    .with_activity_year(year)
                    .with_mode_time(context.default_mode(), time),
                value * duration,
                WATER_UNIT,
            )?;
        }
    }

    Ok(())
}
