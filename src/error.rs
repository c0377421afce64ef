//! Errors raised by the parameterisation pipeline which callers are expected to handle.
//!
//! I/O and validation failures are reported with `anyhow`; the variants here are the ones that
//! decide whether a series, technology or whole run is abandoned. IDs are held as plain strings so
//! the errors are `Send + Sync` and can travel inside `anyhow::Error`.
use crate::region::RegionID;
use crate::technology::TechnologyID;
use thiserror::Error;

/// An error from one of the pipeline stages
#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    /// Too few observations to extrapolate a series
    #[error("Insufficient data for {what}: {observations} observation(s), at least 2 required")]
    InsufficientData {
        /// Description of the series
        what: String,
        /// Number of observations available
        observations: usize,
    },
    /// The nonlinear logistic fit did not converge
    #[error("Logistic fit for {what} did not converge: {reason}")]
    FitDiverged {
        /// Description of what was being fitted
        what: String,
        /// Why the fit was rejected
        reason: String,
    },
    /// A raw coefficient needed for a technology is missing
    #[error("Missing coefficient for technology {technology}: {detail}")]
    MissingCoefficient {
        /// The technology lacking data
        technology: String,
        /// What exactly is missing
        detail: String,
    },
    /// An assembled parameter set failed a consistency check
    #[error("Invariant violated for {technology} in {region}: {detail}")]
    InvariantViolation {
        /// The technology concerned
        technology: String,
        /// The region concerned
        region: String,
        /// Description of the violation
        detail: String,
    },
}

impl PipelineError {
    /// Create a [`PipelineError::MissingCoefficient`]
    pub fn missing_coefficient(technology: &TechnologyID, detail: impl Into<String>) -> Self {
        Self::MissingCoefficient {
            technology: technology.to_string(),
            detail: detail.into(),
        }
    }

    /// Create a [`PipelineError::InvariantViolation`]
    pub fn invariant_violation(
        technology: &TechnologyID,
        region: &RegionID,
        detail: impl Into<String>,
    ) -> Self {
        Self::InvariantViolation {
            technology: technology.to_string(),
            region: region.to_string(),
            detail: detail.into(),
        }
    }
}
