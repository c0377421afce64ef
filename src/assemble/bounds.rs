//! Policy bounds on the activity of desalination and recycling technologies.
use super::{Assembly, AssemblyContext};
use crate::demand::DemandSector;
use crate::parameter::{ParameterKey, ParameterName, ParameterSet};
use crate::rate::RateKind;
use crate::region::RegionID;
use crate::series::{SeriesBuilder, SeriesMode};
use crate::technology::{TechnologyFamily, TechnologyID};
use anyhow::Result;
use itertools::Itertools;
use log::info;
use std::collections::BTreeMap;

/// Unit of activity bounds
const BOUND_UNIT: &str = "km3/yr";

/// Add activity bounds for the years optimised by the downstream model
pub fn add_bounds(context: &AssemblyContext, assembly: &mut Assembly) {
    let first_model_year = context.model.parameters.first_model_year;
    let years = context
        .years()
        .iter()
        .copied()
        .filter(|&year| year >= first_model_year)
        .collect_vec();

    let before = assembly.parameters.len();
    for region in context.model.iter_regions() {
        let potential = desalination_potential(context, assembly, region, &years);
        add_desalination_bounds(context, assembly, region, &years, potential.as_ref());
        add_recycling_bounds(context, assembly, region, &years);
    }
    info!("[bounds] {} records", assembly.parameters.len() - before);
}

/// The desalination potential of a region, completed onto the given years.
///
/// Returns `None` if the region has no potential data or it cannot be extrapolated.
fn desalination_potential(
    context: &AssemblyContext,
    assembly: &mut Assembly,
    region: &RegionID,
    years: &[u32],
) -> Option<BTreeMap<u32, f64>> {
    let observed = context.model.desalination.potential.get(region)?;
    let builder = SeriesBuilder::new(
        SeriesMode::Withdrawal,
        context.model.parameters.rounding_digits,
    );
    match builder.complete(&format!("desalination potential in {region}"), observed, years) {
        Ok(series) => Some(series),
        Err(err) => {
            assembly.warn(
                None,
                Some(region),
                format!("No upper bound on desalination in {region}: {err}"),
            );
            None
        }
    }
}

fn add_desalination_bounds(
    context: &AssemblyContext,
    assembly: &mut Assembly,
    region: &RegionID,
    years: &[u32],
    potential: Option<&BTreeMap<u32, f64>>,
) {
    let rates = context.rates.series(region, RateKind::Desalination);
    let assembled = context
        .model
        .iter_family(TechnologyFamily::Desalination)
        .any(|technology| assembly.succeeded(&technology.id, region));
    if rates.is_none() && assembled && !years.is_empty() {
        assembly.warn(
            None,
            Some(region),
            format!("No desalination rate for {region}; no lower bound on desalination"),
        );
    }

    for technology in context.model.iter_family(TechnologyFamily::Desalination) {
        let Some(&share) = context
            .model
            .desalination
            .shares
            .get(&technology.id)
            .and_then(|shares| shares.get(region))
        else {
            continue;
        };
        if !assembly.succeeded(&technology.id, region) {
            continue;
        }

        let mut buffer = context.buffer();
        let result: Result<()> = years.iter().try_for_each(|&year| {
            if let Some(rate) = rates.and_then(|rates| rates.get(&year)) {
                let urban = urban_withdrawal(context, region, year);
                add_bound(
                    context,
                    &mut buffer,
                    ParameterName::BoundActivityLo,
                    (region, &technology.id, year),
                    rate * urban * share,
                )?;
            }
            if let Some(&limit) = potential.and_then(|potential| potential.get(&year)) {
                add_bound(
                    context,
                    &mut buffer,
                    ParameterName::BoundActivityUp,
                    (region, &technology.id, year),
                    limit * share,
                )?;
            }
            Ok(())
        });
        merge(assembly, &technology.id, region, buffer, result);
    }
}

fn add_recycling_bounds(
    context: &AssemblyContext,
    assembly: &mut Assembly,
    region: &RegionID,
    years: &[u32],
) {
    for technology in &context.model.parameters.recycling_technologies {
        if !assembly.succeeded(technology, region) {
            continue;
        }

        let mut buffer = context.buffer();
        let result: Result<()> = years.iter().try_for_each(|&year| {
            let recycling = context.rates.get(region, RateKind::Recycling, year);
            let treatment = context.rates.get(region, RateKind::Treatment, year);
            let (Some(recycling), Some(treatment)) = (recycling, treatment) else {
                return Ok(());
            };
            let collected = urban_return_flow(context, region, year) * treatment;
            add_bound(
                context,
                &mut buffer,
                ParameterName::BoundActivityLo,
                (region, technology, year),
                recycling * collected,
            )
        });
        merge(assembly, technology, region, buffer, result);
    }
}

fn urban_withdrawal(context: &AssemblyContext, region: &RegionID, year: u32) -> f64 {
    context
        .demand
        .get(region, DemandSector::Urban, year)
        .map_or(0.0, |point| point.withdrawal.value())
}

fn urban_return_flow(context: &AssemblyContext, region: &RegionID, year: u32) -> f64 {
    context
        .demand
        .get(region, DemandSector::Urban, year)
        .map_or(0.0, |point| point.return_flow.abs().value())
}

/// Add a bound on annual activity, split across time slices by duration
fn add_bound(
    context: &AssemblyContext,
    buffer: &mut ParameterSet,
    name: ParameterName,
    (region, technology, year): (&RegionID, &TechnologyID, u32),
    value: f64,
) -> Result<()> {
    for (time, duration) in context.time_slices() {
        buffer.add_value(
            name,
            ParameterKey::technology(region, technology)
                .with_activity_year(year)
                .with_mode_time(context.default_mode(), time),
            value * duration,
            BOUND_UNIT,
        )?;
    }

    Ok(())
}

fn merge(
    assembly: &mut Assembly,
    technology: &TechnologyID,
    region: &RegionID,
    buffer: ParameterSet,
    result: Result<()>,
) {
    if let Err(err) = result.and_then(|()| assembly.parameters.merge(buffer)) {
        assembly.fatal(format!("Bounds for {technology} in {region}: {err:#}"));
    }
}
