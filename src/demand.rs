//! Sectoral water demand: harmonisation of raw withdrawal and return-flow tables into complete
//! trajectories.
//!
//! Withdrawals are positive and return flows negative. The absolute return flow never exceeds a
//! fixed fraction (the return-flow cap) of the withdrawal for the same region, sector and year.
use crate::region::RegionID;
use crate::series::{SeriesBuilder, SeriesMode};
use crate::units::{Km3PerYear, mcm_per_year_to_km3, round_to};
use anyhow::Result;
use indexmap::IndexSet;
use log::warn;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::collections::BTreeMap;

/// The sector a demand belongs to
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    DeserializeLabeledStringEnum,
    strum::Display,
    strum::EnumIter,
)]
pub enum DemandSector {
    /// Urban households
    #[string = "urban"]
    #[strum(serialize = "urban")]
    Urban,
    /// Rural households
    #[string = "rural"]
    #[strum(serialize = "rural")]
    Rural,
    /// Manufacturing
    #[string = "industry"]
    #[strum(serialize = "industry")]
    Industry,
}

impl DemandSector {
    /// Whether connection and treatment rates apply to the sector
    pub fn has_access_rates(self) -> bool {
        !matches!(self, Self::Industry)
    }
}

/// Whether a raw demand table contains withdrawals or return flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, DeserializeLabeledStringEnum)]
pub enum DemandKind {
    /// Water withdrawn
    #[string = "withdrawal"]
    Withdrawal,
    /// Water returned after use
    #[string = "return_flow"]
    ReturnFlow,
}

/// Raw demand observations in mcm/year, keyed by region, sector and kind
pub type RawDemandMap = BTreeMap<(RegionID, DemandSector, DemandKind), BTreeMap<u32, f64>>;

/// Withdrawal and return flow for one region, sector and year
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DemandPoint {
    /// Water withdrawn (non-negative)
    pub withdrawal: Km3PerYear,
    /// Water returned (non-positive)
    pub return_flow: Km3PerYear,
}

/// Complete demand trajectories
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemandSeries(BTreeMap<(RegionID, DemandSector, u32), DemandPoint>);

impl DemandSeries {
    /// The demand for a region, sector and year
    pub fn get(&self, region: &RegionID, sector: DemandSector, year: u32) -> Option<DemandPoint> {
        self.0.get(&(region.clone(), sector, year)).copied()
    }

    /// Iterate over all demand points in a deterministic order
    pub fn iter(&self) -> impl Iterator<Item = (&(RegionID, DemandSector, u32), &DemandPoint)> {
        self.0.iter()
    }

    /// Total withdrawal of all sectors for a region and year
    pub fn total_withdrawal(&self, region: &RegionID, year: u32) -> Km3PerYear {
        self.0
            .iter()
            .filter(|((r, _, y), _)| r == region && *y == year)
            .map(|(_, point)| point.withdrawal)
            .sum()
    }
}

/// Limit the return flow to `cap` times the withdrawal.
///
/// Both values are rounded. A capped return flow is rounded towards zero, so the bound holds for
/// the values returned; they are final and must not be rounded again.
pub fn clamp_return_flow(withdrawal: f64, return_flow: f64, cap: f64, digits: u32) -> (f64, f64) {
    let withdrawal = round_to(withdrawal.abs(), digits);
    let limit = cap * withdrawal;
    let mut magnitude = round_to(return_flow.abs(), digits);
    if magnitude > limit {
        let scale = 10f64.powi(i32::try_from(digits).unwrap_or(i32::MAX).min(15));
        magnitude = round_to(limit, digits);
        if magnitude > limit {
            magnitude = round_to(magnitude - 1.0 / scale, digits);
        }

        // For large values the rounding grid is coarser than f64 precision, so step down to the
        // next representable value instead. `magnitude > limit >= 0`, so it is positive here.
        while magnitude > limit {
            magnitude = f64::from_bits(magnitude.to_bits() - 1);
        }
    }

    // Adding zero turns -0.0 into 0.0
    (withdrawal, -magnitude + 0.0)
}

/// Harmonise raw demand tables into complete trajectories.
///
/// Raw values are converted from mcm/year to km3/year, the sign convention is enforced and the
/// return flow is capped both before and after the series are completed. Regions and sectors
/// without withdrawal data have no demand.
///
/// # Arguments
///
/// * `raw` - Raw demand observations
/// * `regions` - The model regions
/// * `years` - The years for which demand is required
/// * `return_flow_cap` - Largest permitted ratio of return flow to withdrawal
/// * `digits` - Rounding precision
pub fn harmonise(
    raw: &RawDemandMap,
    regions: &IndexSet<RegionID>,
    years: &[u32],
    return_flow_cap: f64,
    digits: u32,
) -> Result<DemandSeries> {
    let builder = SeriesBuilder::new(SeriesMode::Withdrawal, digits);
    let mut series = BTreeMap::new();

    for region in regions {
        for sector in [DemandSector::Urban, DemandSector::Rural, DemandSector::Industry] {
            let Some(withdrawal) = raw.get(&(region.clone(), sector, DemandKind::Withdrawal))
            else {
                continue;
            };
            let withdrawal: BTreeMap<u32, f64> = withdrawal
                .iter()
                .map(|(&year, &value)| (year, mcm_per_year_to_km3(value).value().abs()))
                .collect();

            // Return flows are completed as magnitudes and made negative afterwards
            let mut return_flow: BTreeMap<u32, f64> = raw
                .get(&(region.clone(), sector, DemandKind::ReturnFlow))
                .into_iter()
                .flatten()
                .map(|(&year, &value)| (year, mcm_per_year_to_km3(value).value().abs()))
                .collect();
            let mut capped = 0;
            for (year, value) in &mut return_flow {
                if let Some(&w) = withdrawal.get(year)
                    && *value > return_flow_cap * w
                {
                    *value = return_flow_cap * w;
                    capped += 1;
                }
            }
            if capped > 0 {
                warn!(
                    "Capped {capped} {sector} return flow observation(s) in {region} at \
                     {return_flow_cap} of withdrawal"
                );
            }

            let what = format!("{sector} withdrawal in {region}");
            let withdrawal = builder.complete(&what, &withdrawal, years)?;
            let return_flow = if return_flow.is_empty() {
                BTreeMap::new()
            } else {
                let what = format!("{sector} return flow in {region}");
                builder.complete(&what, &return_flow, years)?
            };

            for (&year, &w) in &withdrawal {
                let r = return_flow.get(&year).copied().unwrap_or(0.0);
                let (w, r) = clamp_return_flow(w, r, return_flow_cap, digits);
                series.insert(
                    (region.clone(), sector, year),
                    DemandPoint {
                        withdrawal: Km3PerYear(w),
                        return_flow: Km3PerYear(r),
                    },
                );
            }
        }
    }

    Ok(DemandSeries(series))
}
