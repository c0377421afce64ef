//! The interface to the scenario store holding a model instance's sets and parameters.
//!
//! The assembler never writes to a store directly: the finished parameter set is handed to
//! [`write_parameter_set`], which performs the whole write in a single transaction.
use crate::parameter::{ParameterKey, ParameterName, ParameterRecord, ParameterSet, SET_NAMES};
use crate::region::RegionID;
use crate::technology::TechnologyID;
use anyhow::{Context, Result, bail, ensure};
use log::{info, warn};
use std::fmt::{self, Display};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use strum::IntoEnumIterator;

pub mod csv;
pub use csv::CsvScenarioStore;

/// The name of the scenario used when none is given
pub const DEFAULT_SCENARIO_NAME: &str = "baseline";

/// Operations on a scenario in the store.
///
/// Writes are only allowed between [`check_out`](ScenarioStore::check_out) and either
/// [`commit`](ScenarioStore::commit) or [`discard`](ScenarioStore::discard).
pub trait ScenarioStore {
    /// Start a transaction
    fn check_out(&mut self) -> Result<()>;

    /// The elements of a set
    fn set(&self, set: &str) -> Vec<String>;

    /// Add an element to a set
    fn add_set(&mut self, set: &str, element: &str) -> Result<()>;

    /// Remove an element from a set
    fn remove_set(&mut self, set: &str, element: &str) -> Result<()>;

    /// Add a parameter value, replacing any existing value with the same key
    fn add_par(&mut self, name: ParameterName, key: &ParameterKey, value: f64, unit: &str)
    -> Result<()>;

    /// Remove a parameter value
    fn remove_par(&mut self, name: ParameterName, key: &ParameterKey) -> Result<()>;

    /// The values of a parameter matching a filter
    fn par(&self, name: ParameterName, filter: &ParameterFilter) -> Vec<ParameterRecord>;

    /// Persist the changes and end the transaction.
    ///
    /// If persisting fails the transaction stays open, so the commit can be retried.
    fn commit(&mut self, message: &str) -> Result<()>;

    /// End the transaction without persisting, restoring the last committed contents
    fn discard(&mut self) -> Result<()>;

    /// Copy the committed contents of this scenario into a new scenario of the same model
    fn clone_scenario(&self, scenario: &str) -> Result<Self>
    where
        Self: Sized;

    /// Make this the default scenario of its model
    fn set_as_default(&mut self) -> Result<()>;
}

/// Selects parameter records by region, technology and activity year
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterFilter {
    /// Only records for this region
    pub node: Option<RegionID>,
    /// Only records for this technology
    pub technology: Option<TechnologyID>,
    /// Only records for this activity year
    pub year_act: Option<u32>,
}

impl ParameterFilter {
    /// Whether a key passes the filter
    pub fn matches(&self, key: &ParameterKey) -> bool {
        fn check<T: PartialEq>(wanted: Option<&T>, actual: Option<&T>) -> bool {
            wanted.is_none_or(|wanted| actual == Some(wanted))
        }

        check(self.node.as_ref(), key.node.as_ref())
            && check(self.technology.as_ref(), key.technology.as_ref())
            && check(self.year_act.as_ref(), key.year_act.as_ref())
    }
}

/// The location of a scenario.
///
/// Either `<model>/<scenario>`, resolved under the store root, or `file://<path>` giving the
/// scenario directory itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioUrl {
    /// A scenario of a model in the store root
    Named {
        /// The model name
        model: String,
        /// The scenario name
        scenario: String,
    },
    /// A scenario directory anywhere on disk
    Path(PathBuf),
}

impl ScenarioUrl {
    /// The directory holding the scenario's files
    pub fn resolve(&self, store_root: &Path) -> PathBuf {
        match self {
            Self::Named { model, scenario } => store_root.join(model).join(scenario),
            Self::Path(path) => path.clone(),
        }
    }

    /// The default URL for a model directory: the `baseline` scenario of a model named after it
    pub fn for_model_dir(model_dir: &Path) -> Result<Self> {
        let model = model_dir
            .canonicalize()
            .with_context(|| format!("Invalid model directory: {}", model_dir.display()))?
            .file_name()
            .context("Model directory has no name")?
            .to_string_lossy()
            .into_owned();

        Ok(Self::Named {
            model,
            scenario: DEFAULT_SCENARIO_NAME.to_string(),
        })
    }
}

impl FromStr for ScenarioUrl {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(path) = s.strip_prefix("file://") {
            ensure!(!path.is_empty(), "Empty path in scenario URL: {s}");
            return Ok(Self::Path(PathBuf::from(path)));
        }

        let Some((model, scenario)) = s.split_once('/') else {
            bail!("Invalid scenario URL: {s} (expected <model>/<scenario> or file://<path>)");
        };
        let valid = |name: &str| {
            !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
        };
        ensure!(
            valid(model) && valid(scenario),
            "Invalid scenario URL: {s} (expected <model>/<scenario> or file://<path>)"
        );

        Ok(Self::Named {
            model: model.to_string(),
            scenario: scenario.to_string(),
        })
    }
}

impl Display for ScenarioUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named { model, scenario } => write!(f, "{model}/{scenario}"),
            Self::Path(path) => write!(f, "file://{}", path.display()),
        }
    }
}

/// Write a parameter set to a scenario, replacing its previous contents.
///
/// Sets and parameters are written in one transaction. Committing is retried up to `retries`
/// times if it fails; if the write still fails the transaction is discarded, leaving the store
/// free for another attempt.
pub fn write_parameter_set<S: ScenarioStore>(
    store: &mut S,
    parameters: &ParameterSet,
    message: &str,
    retries: u32,
) -> Result<()> {
    store.check_out()?;

    let result = stage_parameter_set(store, parameters)
        .and_then(|()| commit_with_retries(store, message, retries));
    if let Err(err) = result {
        if let Err(discard_err) = store.discard() {
            warn!("Could not discard scenario changes: {discard_err:#}");
        }
        return Err(err);
    }
    info!("Wrote {} records to the scenario store", parameters.len());

    Ok(())
}

/// Make the checked-out scenario hold exactly the sets and records of `parameters`
fn stage_parameter_set<S: ScenarioStore>(store: &mut S, parameters: &ParameterSet) -> Result<()> {
    for set in SET_NAMES {
        let wanted = parameters.sets().get(set);
        for element in store.set(set) {
            if !wanted.is_some_and(|wanted| wanted.contains(&element)) {
                store.remove_set(set, &element)?;
            }
        }
        for element in wanted.into_iter().flatten() {
            store.add_set(set, element)?;
        }
    }

    for name in ParameterName::iter() {
        for record in store.par(name, &ParameterFilter::default()) {
            if parameters.get(name, &record.key).is_none() {
                store.remove_par(name, &record.key)?;
            }
        }
    }
    for record in parameters.iter() {
        store.add_par(record.name, &record.key, record.value, &record.unit)?;
    }

    Ok(())
}

fn commit_with_retries<S: ScenarioStore>(store: &mut S, message: &str, retries: u32) -> Result<()> {
    let mut attempt = 0;
    loop {
        match store.commit(message) {
            Ok(()) => return Ok(()),
            Err(err) if attempt < retries => {
                attempt += 1;
                warn!("Commit failed (attempt {attempt} of {}): {err:#}", retries + 1);
            }
            Err(err) => return Err(err.context("Failed to commit parameter set")),
        }
    }
}
