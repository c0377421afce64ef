//! Access-rate trajectories (connection, treatment, desalination and recycling rates).
//!
//! Connection and treatment rates are projected from an income-driven logistic model which is
//! fitted to cross-country observations. Desalination and recycling rates come from sparse tables
//! and are completed with the [`SeriesBuilder`](crate::series::SeriesBuilder).
use crate::id::define_id_type;
use crate::region::RegionID;
use serde::Serialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::collections::BTreeMap;

pub mod fit;
pub mod projection;
pub use fit::fit_logistic;
pub use projection::{build_rate_series, project};

define_id_type! {CountryID}

/// The kind of rate described by a series
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
    Serialize,
    strum::Display,
    strum::EnumIter,
)]
pub enum RateKind {
    /// Share of the population connected to a piped water supply
    #[string = "connection"]
    #[strum(serialize = "connection")]
    Connection,
    /// Share of collected wastewater that is treated
    #[string = "treatment"]
    #[strum(serialize = "treatment")]
    Treatment,
    /// Share of urban municipal water supplied by desalination
    #[string = "desalination"]
    #[strum(serialize = "desalination")]
    Desalination,
    /// Share of collected wastewater which is recycled
    #[string = "recycling"]
    #[strum(serialize = "recycling")]
    Recycling,
}

impl RateKind {
    /// Whether this kind of rate is projected with the logistic model
    pub fn is_modelled(&self) -> bool {
        matches!(self, Self::Connection | Self::Treatment)
    }
}

/// Parameters of the logistic curve `r(I) = A / (1 + exp(-k (ln I - x0)))`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticParams {
    /// The asymptote, `A`
    pub asymptote: f64,
    /// The steepness, `k`
    pub scale: f64,
    /// The midpoint in log-income, `x0`
    pub midpoint: f64,
}

impl LogisticParams {
    /// The rate implied by the curve at the given income
    pub fn rate_at(&self, income: f64) -> f64 {
        self.asymptote / (1.0 + (-self.scale * (income.ln() - self.midpoint)).exp())
    }
}

/// An observed (country, income, rate) point used to fit the logistic model
#[derive(Debug, Clone, PartialEq)]
pub struct RateObservation {
    /// The country observed
    pub country: CountryID,
    /// What sort of rate was observed
    pub kind: RateKind,
    /// GDP per capita
    pub income: f64,
    /// The observed rate
    pub rate: f64,
}

/// A country's observed base-year rate, with an optional override
#[derive(Debug, Clone, PartialEq)]
pub struct BaseRate {
    /// The country
    pub country: CountryID,
    /// What sort of rate this is
    pub kind: RateKind,
    /// The observed rate
    pub rate: f64,
    /// A value to use instead of the discounted observed rate
    pub rate_override: Option<f64>,
}

/// A country, the region it belongs to and its population
#[derive(Debug, Clone, PartialEq)]
pub struct Country {
    /// The country's ID
    pub id: CountryID,
    /// The region the country belongs to
    pub region: RegionID,
    /// Population, used as a weight when aggregating
    pub population: f64,
}

/// All raw inputs needed to build rate trajectories
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateInputs {
    /// Cross-country observations for the logistic fit
    pub observations: Vec<RateObservation>,
    /// Base-year rates per country
    pub base_rates: Vec<BaseRate>,
    /// Country-to-region mapping
    pub countries: Vec<Country>,
    /// GDP per capita per region, keyed by year
    pub income: BTreeMap<RegionID, BTreeMap<u32, f64>>,
    /// Sparse desalination and recycling rates
    pub tabular: BTreeMap<(RegionID, RateKind), BTreeMap<u32, f64>>,
}

/// Constants controlling how rates are projected and post-processed
#[derive(Debug, Clone, PartialEq)]
pub struct RateConfig {
    /// The year in which observed base rates apply
    pub base_year: u32,
    /// Upper bound for all rates (also the logistic asymptote)
    pub rate_ceiling: f64,
    /// Lower bound for recycling rates
    pub recycling_floor: f64,
    /// Fraction by which observed base rates are reduced
    pub base_year_rate_discount: f64,
    /// The projected gap to the logistic curve shrinks by this factor over the horizon
    pub convergence_factor: f64,
    /// From this year on, connection and treatment rates are at least `rate_ceiling`
    pub full_access_year: Option<u32>,
    /// Decimal places for rounding
    pub rounding_digits: u32,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            base_year: 2015,
            rate_ceiling: 0.99,
            recycling_floor: 0.001,
            base_year_rate_discount: 0.05,
            convergence_factor: 100.0,
            full_access_year: None,
            rounding_digits: crate::units::DEFAULT_ROUNDING_DIGITS,
        }
    }
}

/// Complete rate trajectories, keyed by region and kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateSeries(BTreeMap<(RegionID, RateKind), BTreeMap<u32, f64>>);

impl RateSeries {
    /// Add (or replace) the series for a region and kind
    pub fn insert(&mut self, region: RegionID, kind: RateKind, series: BTreeMap<u32, f64>) {
        self.0.insert((region, kind), series);
    }

    /// The rate for a given region, kind and year
    pub fn get(&self, region: &RegionID, kind: RateKind, year: u32) -> Option<f64> {
        self.0.get(&(region.clone(), kind))?.get(&year).copied()
    }

    /// The whole series for a region and kind
    pub fn series(&self, region: &RegionID, kind: RateKind) -> Option<&BTreeMap<u32, f64>> {
        self.0.get(&(region.clone(), kind))
    }

    /// Iterate over all series
    pub fn iter(&self) -> impl Iterator<Item = (&(RegionID, RateKind), &BTreeMap<u32, f64>)> {
        self.0.iter()
    }

    /// Raise connection and treatment rates to at least `floor` from `from_year` onwards.
    ///
    /// This is a scenario-specific policy and is applied after projection.
    pub fn apply_policy_floor(&mut self, from_year: u32, floor: f64) {
        for ((_, kind), series) in &mut self.0 {
            if !kind.is_modelled() {
                continue;
            }

            for (_, value) in series.range_mut(from_year..) {
                *value = value.max(floor);
            }
        }
    }
}
