//! Read and validate model parameters from `model.toml`.
//!
//! Besides the model years and regions, this file holds the constants which control how raw data
//! are harmonised (rounding precision, return-flow cap, rate ceilings and so on).
use crate::cooling::CoefficientLevel;
use crate::input::{
    deserialise_proportion, deserialise_proportion_nonzero, input_err_msg, is_sorted_and_unique,
    read_toml,
};
use crate::rate::RateConfig;
use crate::region::RegionID;
use crate::technology::{DEFAULT_MODE, ModeID, TechnologyID};
use crate::time_slice::{ANNUAL_TIME_SLICE, TimeSliceID, TimeSliceInfo};
use crate::units::DEFAULT_ROUNDING_DIGITS;
use anyhow::{Context, Result, ensure};
use float_cmp::approx_eq;
use indexmap::{IndexMap, IndexSet};
use log::warn;
use serde::Deserialize;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

/// Largest supported number of decimal places
const MAX_ROUNDING_DIGITS: u32 = 15;

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_base_year, u32, 2015);
define_param_default!(default_rounding_digits, u32, DEFAULT_ROUNDING_DIGITS);
define_param_default!(default_return_flow_cap, f64, 0.92);
define_param_default!(default_rate_ceiling, f64, 0.99);
define_param_default!(default_recycling_floor, f64, 0.001);
define_param_default!(default_base_year_rate_discount, f64, 0.05);
define_param_default!(default_combined_efficiency, f64, 0.8 * 0.9);
define_param_default!(default_convergence_factor, f64, 100.0);
define_param_default!(
    default_time_slices,
    IndexMap<TimeSliceID, f64>,
    [(ANNUAL_TIME_SLICE.into(), 1.0)].into_iter().collect()
);
define_param_default!(default_modes, Vec<ModeID>, vec![DEFAULT_MODE.into()]);

/// Scenario-specific policy options
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct PolicyOptions {
    /// From this year, connection and treatment rates are raised to the rate ceiling
    pub full_access_year: Option<u32>,
}

/// Model parameters as defined in the `model.toml` file.
#[derive(Debug, Deserialize, PartialEq)]
pub struct ModelParameters {
    /// All model years, including historical years
    pub years: Vec<u32>,
    /// The first year optimised by the downstream model
    pub first_model_year: u32,
    /// The last year for which historical data are used directly
    pub historical_cutoff: u32,
    /// The year in which observed base rates apply
    #[serde(default = "default_base_year")]
    pub base_year: u32,
    /// The model regions
    pub regions: Vec<RegionID>,
    /// Time slices and their durations as fractions of a year
    #[serde(default = "default_time_slices")]
    pub time_slices: IndexMap<TimeSliceID, f64>,
    /// Modes of operation
    #[serde(default = "default_modes")]
    pub modes: Vec<ModeID>,
    /// Which estimate of cooling water intensity to use
    #[serde(default)]
    pub coefficient_level: CoefficientLevel,
    /// Number of decimal places values are rounded to
    #[serde(default = "default_rounding_digits")]
    pub rounding_digits: u32,
    /// Largest permitted ratio of return flow to withdrawal
    #[serde(default = "default_return_flow_cap")]
    #[serde(deserialize_with = "deserialise_proportion_nonzero")]
    pub return_flow_cap: f64,
    /// Upper bound for all rates and the asymptote of the logistic rate model
    #[serde(default = "default_rate_ceiling")]
    #[serde(deserialize_with = "deserialise_proportion_nonzero")]
    pub rate_ceiling: f64,
    /// Lower bound for recycling rates
    #[serde(default = "default_recycling_floor")]
    #[serde(deserialize_with = "deserialise_proportion")]
    pub recycling_floor: f64,
    /// Fraction by which observed base-year rates are reduced
    #[serde(default = "default_base_year_rate_discount")]
    #[serde(deserialize_with = "deserialise_proportion")]
    pub base_year_rate_discount: f64,
    /// Output ratio of distribution technologies without one in the data
    #[serde(default = "default_combined_efficiency")]
    #[serde(deserialize_with = "deserialise_proportion_nonzero")]
    pub combined_efficiency: f64,
    /// Factor by which the gap between projected and logistic rates shrinks over the horizon
    #[serde(default = "default_convergence_factor")]
    pub convergence_factor: f64,
    /// Shares of historical fresh water withdrawal met by each extraction technology
    #[serde(default)]
    pub extraction_shares: IndexMap<TechnologyID, f64>,
    /// Efficiencies of base technologies which are not in the efficiency table
    #[serde(default)]
    pub efficiency_overrides: IndexMap<TechnologyID, f64>,
    /// Wastewater technologies whose activity is bounded below by the recycling rate
    #[serde(default)]
    pub recycling_technologies: Vec<TechnologyID>,
    /// Policy options
    #[serde(default)]
    pub policy: PolicyOptions,
}

/// Check that the `years` parameter is valid
fn check_years(years: &[u32]) -> Result<()> {
    ensure!(!years.is_empty(), "`years` is empty");
    ensure!(
        is_sorted_and_unique(years),
        "`years` must be composed of unique values in order"
    );

    Ok(())
}

/// Check the historical cutoff and first model year against the model years
fn check_year_boundaries(
    years: &[u32],
    first_model_year: u32,
    historical_cutoff: u32,
) -> Result<()> {
    ensure!(
        years.contains(&first_model_year),
        "first_model_year ({first_model_year}) must be one of the model years"
    );
    ensure!(
        historical_cutoff < first_model_year,
        "historical_cutoff ({historical_cutoff}) must be before first_model_year \
         ({first_model_year})"
    );

    Ok(())
}

/// Check that the regions are not empty and contain no duplicates
fn check_regions(regions: &[RegionID]) -> Result<()> {
    ensure!(!regions.is_empty(), "`regions` is empty");
    let unique: IndexSet<_> = regions.iter().collect();
    ensure!(unique.len() == regions.len(), "`regions` contains duplicates");

    Ok(())
}

/// Check that the `rounding_digits` parameter is valid
fn check_rounding_digits(value: u32) -> Result<()> {
    ensure!(
        value <= MAX_ROUNDING_DIGITS,
        "rounding_digits must be at most {MAX_ROUNDING_DIGITS}"
    );

    Ok(())
}

/// Check that the `convergence_factor` parameter is valid
fn check_convergence_factor(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value > 1.0,
        "convergence_factor must be a finite number greater than one"
    );

    Ok(())
}

/// Check the extraction shares are non-negative, warning if they don't sum to one
fn check_extraction_shares(shares: &IndexMap<TechnologyID, f64>) -> Result<()> {
    for (technology, &share) in shares {
        ensure!(
            share.is_finite() && share >= 0.0,
            "Extraction share for {technology} must be a non-negative number"
        );
    }

    let total: f64 = shares.values().sum();
    if !shares.is_empty() && !approx_eq!(f64, total, 1.0, epsilon = 1e-6) {
        warn!("Extraction shares sum to {total} rather than 1");
    }

    Ok(())
}

/// Check that efficiency overrides are in (0, 1]
fn check_efficiency_overrides(overrides: &IndexMap<TechnologyID, f64>) -> Result<()> {
    for (technology, &value) in overrides {
        ensure!(
            value > 0.0 && value <= 1.0,
            "Efficiency override for {technology} must be in the range (0, 1]"
        );
    }

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_years(&self.years)?;
        check_year_boundaries(&self.years, self.first_model_year, self.historical_cutoff)?;
        check_regions(&self.regions)?;
        ensure!(!self.modes.is_empty(), "`modes` is empty");
        check_rounding_digits(self.rounding_digits)?;
        check_convergence_factor(self.convergence_factor)?;
        check_extraction_shares(&self.extraction_shares)?;
        check_efficiency_overrides(&self.efficiency_overrides)?;

        // time_slices
        TimeSliceInfo::new(self.time_slices.clone()).context("Invalid time_slices")?;

        // Proportions already validated when deserialising
        ensure!(
            self.recycling_floor <= self.rate_ceiling,
            "recycling_floor must not exceed rate_ceiling"
        );

        Ok(())
    }

    /// The model regions as a set
    pub fn region_ids(&self) -> IndexSet<RegionID> {
        self.regions.iter().cloned().collect()
    }

    /// Time slice information
    pub fn time_slice_info(&self) -> Result<TimeSliceInfo> {
        TimeSliceInfo::new(self.time_slices.clone())
    }

    /// Settings for the rate model
    pub fn rate_config(&self) -> RateConfig {
        RateConfig {
            base_year: self.base_year,
            rate_ceiling: self.rate_ceiling,
            recycling_floor: self.recycling_floor,
            base_year_rate_discount: self.base_year_rate_discount,
            convergence_factor: self.convergence_factor,
            full_access_year: self.policy.full_access_year,
            rounding_digits: self.rounding_digits,
        }
    }
}
