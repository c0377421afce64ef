//! Allocation of historical capacity and activity of base technologies to their variants.
use crate::region::RegionID;
use crate::technology::TechnologyID;
use anyhow::{Result, ensure};
use indexmap::IndexMap;
use itertools::Itertools;
use log::warn;
use std::collections::BTreeMap;

/// Tolerance when checking that shares sum to one
const SHARE_SUM_TOLERANCE: f64 = 1e-6;

/// Gap assumed before the first historical year if there is only one
const DEFAULT_FIRST_PERIOD: u32 = 5;

/// Historical values are smoothed over this many periods for the first historical year
const FIRST_YEAR_SMOOTHING: f64 = 3.0;

/// Capacity and activity of a technology in one year
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CapacityActivity {
    /// Installed capacity
    pub capacity: f64,
    /// Activity
    pub activity: f64,
}

/// Historical or locked-in values keyed by technology and region, then year
pub type CapacityActivityMap = BTreeMap<(TechnologyID, RegionID), BTreeMap<u32, CapacityActivity>>;

/// Split an aggregate series across variants using static shares.
///
/// Shares are not renormalised: a negative share is an error, while shares which do not sum to
/// one only produce a warning.
///
/// # Arguments
///
/// * `what` - Description of the allocation, for messages
/// * `aggregate` - The aggregate value per year
/// * `shares` - The share of each variant
pub fn allocate(
    what: &str,
    aggregate: &BTreeMap<u32, f64>,
    shares: &IndexMap<TechnologyID, f64>,
) -> Result<BTreeMap<(TechnologyID, u32), f64>> {
    for (variant, &share) in shares {
        ensure!(
            share >= 0.0,
            "Negative share ({share}) for {variant} when allocating {what}"
        );
    }

    let total: f64 = shares.values().sum();
    if !shares.is_empty() && (total - 1.0).abs() > SHARE_SUM_TOLERANCE {
        warn!("Shares for {what} sum to {total} rather than 1");
    }

    Ok(shares
        .iter()
        .cartesian_product(aggregate)
        .map(|((variant, share), (&year, value))| ((variant.clone(), year), value * share))
        .collect())
}

/// The allocated series of a single variant
pub fn variant_series(
    allocated: &BTreeMap<(TechnologyID, u32), f64>,
    variant: &TechnologyID,
) -> BTreeMap<u32, f64> {
    allocated
        .iter()
        .filter(|((id, _), _)| id == variant)
        .map(|(&(_, year), &value)| (year, value))
        .collect()
}

/// Estimate new capacity per historical year from allocated capacity snapshots.
///
/// For the first year this is the installed capacity spread over three periods. For later years
/// it is the (non-negative) increase since the previous snapshot per year. Years after the
/// historical cutoff are ignored.
pub fn new_capacity(allocated: &BTreeMap<u32, f64>, historical_cutoff: u32) -> BTreeMap<u32, f64> {
    let historical = allocated.range(..=historical_cutoff).collect_vec();
    let Some(&(&first_year, &first_value)) = historical.first() else {
        return BTreeMap::new();
    };

    let first_period = historical
        .get(1)
        .map_or(DEFAULT_FIRST_PERIOD, |&(&next, _)| next - first_year);
    let mut out = BTreeMap::new();
    out.insert(
        first_year,
        (first_value / (f64::from(first_period) * FIRST_YEAR_SMOOTHING)).max(0.0),
    );

    for ((&prev_year, &prev), (&year, &value)) in historical.into_iter().tuple_windows() {
        let increment = (value - prev) / f64::from(year - prev_year);
        out.insert(year, increment.max(0.0));
    }

    out
}

/// Look up the locked-in capacity and activity for a year.
///
/// Missing entries are zero and negative values are clamped to zero.
pub fn locked_in(
    table: &CapacityActivityMap,
    technology: &TechnologyID,
    region: &RegionID,
    year: u32,
) -> CapacityActivity {
    let value = table
        .get(&(technology.clone(), region.clone()))
        .and_then(|years| years.get(&year))
        .copied()
        .unwrap_or_default();

    CapacityActivity {
        capacity: value.capacity.max(0.0),
        activity: value.activity.max(0.0),
    }
}
