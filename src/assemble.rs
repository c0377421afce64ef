//! Assembly of the full parameter set from a loaded model.
//!
//! Technology families are processed in a fixed order, because later stages read records written
//! by earlier ones. Each (technology, region) stratum is built in its own buffer and only merged
//! into the parameter set once it is complete, so a failing stratum never leaves partial records
//! behind.
use crate::demand::{DemandSeries, harmonise};
use crate::error::PipelineError;
use crate::model::Model;
use crate::parameter::ParameterSet;
use crate::rate::{RateSeries, build_rate_series};
use crate::region::RegionID;
use crate::technology::{ModeID, TechnologyFamily, TechnologyID};
use crate::time_slice::TimeSliceID;
use anyhow::{Context, Result};
use indexmap::IndexSet;
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt::Display;
use strum::IntoEnumIterator;

pub mod bounds;
pub mod check;
pub mod consumption;
pub mod cooling;
pub mod demand;
pub mod desalination;
pub mod skip;
pub use skip::{SkipEntry, SkipRegistry};
pub mod table;

/// A stage of the assembly, in the order in which stages are run
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIter)]
pub enum Stage {
    /// Surface, ground and saline water extraction
    #[strum(serialize = "extraction")]
    Extraction,
    /// Power-plant cooling variants
    #[strum(serialize = "cooling")]
    Cooling,
    /// Sectoral withdrawals and return flows
    #[strum(serialize = "demand")]
    Demand,
    /// Desalination plants and their history
    #[strum(serialize = "desalination")]
    Desalination,
    /// Wastewater collection, treatment and recycling
    #[strum(serialize = "wastewater")]
    Wastewater,
    /// Distribution and efficiency measures
    #[strum(serialize = "distribution")]
    Distribution,
    /// Reservoir storage
    #[strum(serialize = "storage")]
    Storage,
    /// Consumption emission factors and historical extraction
    #[strum(serialize = "consumption")]
    Consumption,
    /// Policy bounds on activity
    #[strum(serialize = "bounds")]
    Bounds,
}

/// Derived inputs shared by all stages
pub struct AssemblyContext<'a> {
    /// The model being assembled
    pub model: &'a Model,
    /// Harmonised sectoral demand
    pub demand: DemandSeries,
    /// Access, desalination and recycling rates
    pub rates: RateSeries,
}

impl<'a> AssemblyContext<'a> {
    /// Harmonise demand and project rates for the model
    pub fn new(model: &'a Model) -> Result<Self> {
        let parameters = &model.parameters;
        let demand = harmonise(
            &model.raw_demand,
            &model.region_ids,
            &parameters.years,
            parameters.return_flow_cap,
            parameters.rounding_digits,
        )
        .context("Failed to harmonise demand")?;
        let rates = build_rate_series(
            &model.rate_inputs,
            &model.region_ids,
            &parameters.years,
            &parameters.rate_config(),
        )
        .context("Failed to build rate series")?;

        Ok(Self {
            model,
            demand,
            rates,
        })
    }

    /// The model years
    pub fn years(&self) -> &[u32] {
        &self.model.parameters.years
    }

    /// The mode used for historical activity and bounds
    pub fn default_mode(&self) -> &ModeID {
        &self.model.parameters.modes[0]
    }

    /// Time slices and their durations
    pub fn time_slices(&self) -> impl Iterator<Item = (&TimeSliceID, f64)> {
        self.model.time_slice_info.iter()
    }

    /// An empty buffer with the model's rounding precision
    pub fn buffer(&self) -> ParameterSet {
        ParameterSet::new(self.model.parameters.rounding_digits)
    }
}

/// A data-quality problem which does not stop the run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataWarning {
    /// The technology concerned, if any
    pub technology: Option<TechnologyID>,
    /// The region concerned, if any
    pub region: Option<RegionID>,
    /// What is wrong
    pub message: String,
}

/// Counts of (technology, region) strata by outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssembleSummary {
    /// Strata whose records were merged
    pub succeeded: usize,
    /// Strata skipped because of missing data
    pub skipped: usize,
    /// Fatal errors
    pub fatal: usize,
    /// Number of records in the parameter set
    pub records: usize,
}

impl Display for AssembleSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} succeeded, {} skipped, {} fatal ({} records)",
            self.succeeded, self.skipped, self.fatal, self.records
        )
    }
}

/// The result of an assembly run
#[derive(Debug, Clone, PartialEq)]
pub struct AssembleOutcome {
    /// The assembled parameter set
    pub parameters: ParameterSet,
    /// (technology, region) pairs for which no records were produced
    pub skipped: SkipRegistry,
    /// Data-quality warnings
    pub warnings: Vec<DataWarning>,
    /// Fatal errors
    pub errors: Vec<String>,
    /// Counts of outcomes
    pub summary: AssembleSummary,
}

impl AssembleOutcome {
    /// Whether the run finished without fatal errors
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// The state of an assembly run, passed from stage to stage
pub struct Assembly {
    /// Records merged so far
    pub parameters: ParameterSet,
    /// Skipped strata
    pub skipped: SkipRegistry,
    /// Data-quality warnings
    pub warnings: Vec<DataWarning>,
    /// Fatal errors
    pub errors: Vec<String>,
    succeeded: IndexSet<(TechnologyID, RegionID)>,
}

impl Assembly {
    /// Start an assembly with an empty parameter set
    pub fn new(digits: u32) -> Self {
        Self {
            parameters: ParameterSet::new(digits),
            skipped: SkipRegistry::default(),
            warnings: Vec::new(),
            errors: Vec::new(),
            succeeded: IndexSet::new(),
        }
    }

    /// Build the records for one (technology, region) stratum and merge them on success.
    ///
    /// A missing coefficient causes the stratum to be skipped, unless `required` is set, in which
    /// case it is a fatal error (as is any other error).
    pub fn run_stratum<F>(
        &mut self,
        technology: &TechnologyID,
        region: &RegionID,
        required: bool,
        mut buffer: ParameterSet,
        build: F,
    ) -> bool
    where
        F: FnOnce(&mut ParameterSet) -> Result<()>,
    {
        let result = build(&mut buffer).and_then(|()| self.parameters.merge(buffer));
        match result {
            Ok(()) => {
                self.succeeded.insert((technology.clone(), region.clone()));
                true
            }
            Err(err) => {
                let missing = matches!(
                    err.downcast_ref::<PipelineError>(),
                    Some(PipelineError::MissingCoefficient { .. })
                );
                if missing && !required {
                    warn!("Skipping {technology} in {region}: {err}");
                    self.skipped.record(technology, region, &err.to_string());
                } else {
                    self.fatal(format!("{technology} in {region}: {err:#}"));
                }
                false
            }
        }
    }

    /// Whether the records of a stratum were merged
    pub fn succeeded(&self, technology: &TechnologyID, region: &RegionID) -> bool {
        self.succeeded
            .contains(&(technology.clone(), region.clone()))
    }

    /// Record a fatal error
    pub fn fatal(&mut self, message: String) {
        log::error!("{message}");
        self.errors.push(message);
    }

    /// Record a data-quality warning
    pub fn warn(
        &mut self,
        technology: Option<&TechnologyID>,
        region: Option<&RegionID>,
        message: String,
    ) {
        warn!("{message}");
        self.warnings.push(DataWarning {
            technology: technology.cloned(),
            region: region.cloned(),
            message,
        });
    }

    /// Finish the run, producing its outcome
    pub fn finish(self) -> AssembleOutcome {
        let summary = AssembleSummary {
            succeeded: self.succeeded.len(),
            skipped: self.skipped.len(),
            fatal: self.errors.len(),
            records: self.parameters.len(),
        };
        AssembleOutcome {
            parameters: self.parameters,
            skipped: self.skipped,
            warnings: self.warnings,
            errors: self.errors,
            summary,
        }
    }
}

/// Log progress through the technologies of a stage
pub(crate) fn log_progress(stage: Stage, technology: &TechnologyID, index: usize, total: usize) {
    let percent = if total == 0 {
        100
    } else {
        (index + 1) * 100 / total
    };
    info!("[{stage}] {technology} ({percent}%)");
}

/// Assemble the parameter set for a model.
///
/// Errors which affect only some strata are collected in the outcome. An error is returned only
/// if the shared inputs (demand and rates) cannot be built.
pub fn assemble(model: &Model) -> Result<AssembleOutcome> {
    let context = AssemblyContext::new(model)?;
    let mut assembly = Assembly::new(model.parameters.rounding_digits);

    for stage in Stage::iter() {
        debug!("Starting stage: {stage}");
        run_stage(stage, &context, &mut assembly)?;
    }

    check::check_flow_pairing(&mut assembly);
    check::check_bound_order(&mut assembly);

    let outcome = assembly.finish();
    info!("Assembly finished: {}", outcome.summary);

    Ok(outcome)
}

fn run_stage(stage: Stage, context: &AssemblyContext, assembly: &mut Assembly) -> Result<()> {
    match stage {
        Stage::Extraction => {
            table::add_family(stage, context, assembly, TechnologyFamily::Extraction);
        }
        Stage::Cooling => cooling::add_cooling(context, assembly),
        Stage::Demand => demand::add_demand(context, assembly)?,
        Stage::Desalination => desalination::add_desalination(context, assembly),
        Stage::Wastewater => {
            table::add_family(stage, context, assembly, TechnologyFamily::Wastewater);
        }
        Stage::Distribution => {
            table::add_family(stage, context, assembly, TechnologyFamily::Distribution);
            table::add_family(stage, context, assembly, TechnologyFamily::Efficiency);
        }
        Stage::Storage => table::add_family(stage, context, assembly, TechnologyFamily::Storage),
        Stage::Consumption => {
            consumption::add_consumption_emissions(assembly);
            consumption::add_historical_extraction(context, assembly);
        }
        Stage::Bounds => bounds::add_bounds(context, assembly),
    }

    Ok(())
}
