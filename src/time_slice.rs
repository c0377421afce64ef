//! Time slices divide each model year into sub-annual periods.
//!
//! Annual quantities (e.g. demand) are distributed across time slices in proportion to their
//! duration. Most water models use a single `year` slice.
use crate::id::define_id_type;
use anyhow::{Result, ensure};
use float_cmp::approx_eq;
use indexmap::IndexMap;

define_id_type! {TimeSliceID}

/// The name of the time slice used when the model has no sub-annual resolution
pub const ANNUAL_TIME_SLICE: &str = "year";

/// Time slices and their durations, as fractions of a year
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSliceInfo {
    durations: IndexMap<TimeSliceID, f64>,
}

impl Default for TimeSliceInfo {
    fn default() -> Self {
        Self {
            durations: [(ANNUAL_TIME_SLICE.into(), 1.0)].into_iter().collect(),
        }
    }
}

impl TimeSliceInfo {
    /// Create from a map of durations, checking they are positive and sum to one
    pub fn new(durations: IndexMap<TimeSliceID, f64>) -> Result<Self> {
        ensure!(!durations.is_empty(), "At least one time slice is required");
        ensure!(
            durations.values().all(|&d| d.is_finite() && d > 0.0),
            "Time slice durations must be positive"
        );
        let total: f64 = durations.values().sum();
        ensure!(
            approx_eq!(f64, total, 1.0, epsilon = 1e-6),
            "Time slice durations must sum to one (got {total})"
        );

        Ok(Self { durations })
    }

    /// Iterate over time slices and their durations
    pub fn iter(&self) -> impl Iterator<Item = (&TimeSliceID, f64)> {
        self.durations.iter().map(|(ts, &d)| (ts, d))
    }

    /// Iterate over time slice IDs
    pub fn iter_ids(&self) -> impl Iterator<Item = &TimeSliceID> {
        self.durations.keys()
    }

    /// Number of time slices
    pub fn len(&self) -> usize {
        self.durations.len()
    }

    /// Whether there are no time slices (never true for a validated instance)
    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }
}
