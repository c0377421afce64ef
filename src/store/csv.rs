//! A scenario store backed by CSV files.
//!
//! Each scenario is a directory holding `sets.csv`, one `<parameter>.csv` per parameter and a
//! log of commits. The model directory above it holds a `default` file naming the default
//! scenario.
use super::{ParameterFilter, ScenarioStore};
use crate::input::{input_err_msg, read_csv_optional};
use crate::parameter::{ParameterKey, ParameterName, ParameterRecord, ParameterRow};
use anyhow::{Context, Result, bail, ensure};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;

const SETS_FILE_NAME: &str = "sets.csv";
const COMMITS_FILE_NAME: &str = "commits.csv";
const DEFAULT_FILE_NAME: &str = "default";

#[derive(Debug, Serialize, Deserialize)]
struct SetRow {
    set: String,
    element: String,
}

/// An entry in a scenario's commit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRow {
    /// The commit message
    pub message: String,
    /// When the commit was made (RFC 3339)
    pub timestamp: String,
}

type SetMap = BTreeMap<String, BTreeSet<String>>;
type ParameterMap = BTreeMap<(ParameterName, ParameterKey), (f64, String)>;

/// A scenario stored as CSV files in a directory
#[derive(Debug)]
pub struct CsvScenarioStore {
    dir: PathBuf,
    sets: SetMap,
    parameters: ParameterMap,
    /// The committed contents, kept while a transaction is open
    snapshot: Option<(SetMap, ParameterMap)>,
}

impl CsvScenarioStore {
    /// Open the scenario in the given directory.
    ///
    /// If the directory does not exist the scenario starts empty and is created on the first
    /// commit.
    pub fn open<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let mut store = Self {
            dir: dir.into(),
            sets: BTreeMap::new(),
            parameters: BTreeMap::new(),
            snapshot: None,
        };
        if store.dir.is_dir() {
            store.load()?;
        }

        Ok(store)
    }

    /// The scenario directory
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Whether the scenario holds no sets or parameters
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty() && self.parameters.is_empty()
    }

    /// The commit log, oldest first
    pub fn commits(&self) -> Result<Vec<CommitRow>> {
        let file_path = self.dir.join(COMMITS_FILE_NAME);
        Ok(read_csv_optional(&file_path)?.collect())
    }

    fn load(&mut self) -> Result<()> {
        let sets_path = self.dir.join(SETS_FILE_NAME);
        for row in read_csv_optional::<SetRow>(&sets_path)? {
            self.sets.entry(row.set).or_default().insert(row.element);
        }

        for name in ParameterName::iter() {
            let file_path = self.parameter_path(name);
            for row in read_csv_optional::<ParameterRow>(&file_path)? {
                let record =
                    ParameterRecord::try_from(row).with_context(|| input_err_msg(&file_path))?;
                ensure!(
                    record.name == name,
                    "{} contains a {} record",
                    file_path.display(),
                    record.name
                );
                self.parameters
                    .insert((record.name, record.key), (record.value, record.unit));
            }
        }

        Ok(())
    }

    fn parameter_path(&self, name: ParameterName) -> PathBuf {
        self.dir.join(format!("{name}.csv"))
    }

    fn is_checked_out(&self) -> bool {
        self.snapshot.is_some()
    }

    fn ensure_checked_out(&self) -> Result<()> {
        ensure!(
            self.is_checked_out(),
            "Scenario {} must be checked out before it is modified",
            self.dir.display()
        );
        Ok(())
    }

    /// Write all sets and parameters to the scenario directory
    fn persist(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let mut writer = ::csv::Writer::from_path(self.dir.join(SETS_FILE_NAME))?;
        for (set, elements) in &self.sets {
            for element in elements {
                writer.serialize(SetRow {
                    set: set.clone(),
                    element: element.clone(),
                })?;
            }
        }
        writer.flush()?;

        for name in ParameterName::iter() {
            let file_path = self.parameter_path(name);
            let records = self.par(name, &ParameterFilter::default());
            if records.is_empty() {
                if file_path.exists() {
                    fs::remove_file(&file_path)?;
                }
                continue;
            }

            let mut writer = ::csv::Writer::from_path(&file_path)?;
            for record in &records {
                writer.serialize(ParameterRow::from(record))?;
            }
            writer.flush()?;
        }

        Ok(())
    }

    fn append_commit(&self, message: &str) -> Result<()> {
        let file_path = self.dir.join(COMMITS_FILE_NAME);
        let is_new = !file_path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)?;
        let mut writer = ::csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        writer.serialize(CommitRow {
            message: message.to_string(),
            timestamp: Local::now().to_rfc3339(),
        })?;
        writer.flush()?;

        Ok(())
    }
}

impl ScenarioStore for CsvScenarioStore {
    fn check_out(&mut self) -> Result<()> {
        ensure!(
            !self.is_checked_out(),
            "Scenario {} is already checked out",
            self.dir.display()
        );
        self.snapshot = Some((self.sets.clone(), self.parameters.clone()));
        Ok(())
    }

    fn set(&self, set: &str) -> Vec<String> {
        self.sets
            .get(set)
            .map(|elements| elements.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn add_set(&mut self, set: &str, element: &str) -> Result<()> {
        self.ensure_checked_out()?;
        self.sets
            .entry(set.to_string())
            .or_default()
            .insert(element.to_string());
        Ok(())
    }

    fn remove_set(&mut self, set: &str, element: &str) -> Result<()> {
        self.ensure_checked_out()?;
        if let Some(elements) = self.sets.get_mut(set) {
            elements.remove(element);
            if elements.is_empty() {
                self.sets.remove(set);
            }
        }
        Ok(())
    }

    fn add_par(
        &mut self,
        name: ParameterName,
        key: &ParameterKey,
        value: f64,
        unit: &str,
    ) -> Result<()> {
        self.ensure_checked_out()?;
        self.parameters
            .insert((name, key.clone()), (value, unit.to_string()));
        Ok(())
    }

    fn remove_par(&mut self, name: ParameterName, key: &ParameterKey) -> Result<()> {
        self.ensure_checked_out()?;
        self.parameters.remove(&(name, key.clone()));
        Ok(())
    }

    fn par(&self, name: ParameterName, filter: &ParameterFilter) -> Vec<ParameterRecord> {
        self.parameters
            .iter()
            .filter(|((n, key), _)| *n == name && filter.matches(key))
            .map(|((name, key), (value, unit))| ParameterRecord {
                name: *name,
                key: key.clone(),
                value: *value,
                unit: unit.clone(),
            })
            .collect()
    }

    fn commit(&mut self, message: &str) -> Result<()> {
        self.ensure_checked_out()?;
        self.persist()
            .and_then(|()| self.append_commit(message))
            .with_context(|| format!("Failed to write scenario to {}", self.dir.display()))?;
        self.snapshot = None;

        Ok(())
    }

    fn discard(&mut self) -> Result<()> {
        let (sets, parameters) = self.snapshot.take().with_context(|| {
            format!("Scenario {} is not checked out", self.dir.display())
        })?;
        self.sets = sets;
        self.parameters = parameters;
        Ok(())
    }

    fn clone_scenario(&self, scenario: &str) -> Result<Self> {
        ensure!(
            !self.is_checked_out(),
            "Cannot clone scenario {} while it is checked out",
            self.dir.display()
        );
        let model_dir = self
            .dir
            .parent()
            .context("Scenario directory has no parent")?;
        let dir = model_dir.join(scenario);
        ensure!(!dir.exists(), "Scenario {} already exists", dir.display());

        let mut clone = Self {
            dir,
            sets: self.sets.clone(),
            parameters: self.parameters.clone(),
            snapshot: Some((SetMap::new(), ParameterMap::new())),
        };
        clone.commit(&format!("Cloned from {}", self.dir.display()))?;

        Ok(clone)
    }

    fn set_as_default(&mut self) -> Result<()> {
        ensure!(
            self.dir.is_dir(),
            "Scenario {} must be committed before it can be made the default",
            self.dir.display()
        );
        let (Some(model_dir), Some(name)) = (self.dir.parent(), self.dir.file_name()) else {
            bail!("Invalid scenario directory: {}", self.dir.display());
        };
        fs::write(
            model_dir.join(DEFAULT_FILE_NAME),
            name.to_string_lossy().as_bytes(),
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::ParameterSet;
    use crate::store::write_parameter_set;
    use rstest::{fixture, rstest};
    use tempfile::tempdir;

    fn key(year: u32) -> ParameterKey {
        ParameterKey::technology(&"R11_AFR".into(), &"desal_membrane".into())
            .with_years(year, year)
            .with_mode_time(&"M1".into(), &"year".into())
            .with_commodity(&"saline_supply".into(), &"water_supply".into())
    }

    #[fixture]
    fn parameters() -> ParameterSet {
        let mut parameters = ParameterSet::new(6);
        parameters
            .add_value(ParameterName::Input, key(2020), 1.25, "-")
            .unwrap();
        parameters
            .add_value(ParameterName::Input, key(2030), 1.2, "-")
            .unwrap();
        parameters
            .add_value(
                ParameterName::InvCost,
                ParameterKey::technology(&"R11_AFR".into(), &"desal_membrane".into())
                    .with_vintage(2030),
                1500.0,
                "MUSD/km3/yr",
            )
            .unwrap();
        parameters
    }

    #[rstest]
    fn round_trip(parameters: ParameterSet) {
        let dir = tempdir().unwrap();
        let scenario_dir = dir.path().join("water").join("baseline");
        let mut store = CsvScenarioStore::open(&scenario_dir).unwrap();
        write_parameter_set(&mut store, &parameters, "initial", 0).unwrap();

        let store = CsvScenarioStore::open(&scenario_dir).unwrap();
        let records = ParameterName::iter()
            .flat_map(|name| store.par(name, &ParameterFilter::default()))
            .collect::<Vec<_>>();
        assert_eq!(records, parameters.iter().collect::<Vec<_>>());
        assert_eq!(store.set("technology"), vec!["desal_membrane"]);
        assert!(scenario_dir.join("input.csv").is_file());

        let commits = store.commits().unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].message, "initial");
    }

    #[rstest]
    fn rewrite_removes_stale_records(parameters: ParameterSet) {
        let dir = tempdir().unwrap();
        let mut store = CsvScenarioStore::open(dir.path().join("baseline")).unwrap();
        write_parameter_set(&mut store, &parameters, "first", 0).unwrap();

        let mut smaller = ParameterSet::new(6);
        smaller
            .add_value(ParameterName::Input, key(2020), 1.25, "-")
            .unwrap();
        write_parameter_set(&mut store, &smaller, "second", 0).unwrap();

        assert_eq!(
            store
                .par(ParameterName::Input, &ParameterFilter::default())
                .len(),
            1
        );
        assert!(!store.path().join("inv_cost.csv").exists());
        assert_eq!(store.commits().unwrap().len(), 2);
    }

    #[rstest]
    fn rewrite_removes_stale_set_elements(parameters: ParameterSet) {
        let dir = tempdir().unwrap();
        let mut store = CsvScenarioStore::open(dir.path().join("baseline")).unwrap();
        write_parameter_set(&mut store, &parameters, "first", 0).unwrap();

        let mut other = ParameterSet::new(6);
        let key = ParameterKey::technology(&"R11_WEU".into(), &"urban_recycle".into())
            .with_years(2020, 2020)
            .with_mode_time(&"M1".into(), &"year".into());
        other
            .add_value(ParameterName::CapacityFactor, key, 0.9, "-")
            .unwrap();
        write_parameter_set(&mut store, &other, "second", 0).unwrap();

        let store = CsvScenarioStore::open(dir.path().join("baseline")).unwrap();
        assert_eq!(store.set("technology"), vec!["urban_recycle"]);
        assert_eq!(store.set("node"), vec!["R11_WEU"]);
        assert_eq!(store.set("year"), vec!["2020"]);
        assert!(store.set("commodity").is_empty());
    }

    #[rstest]
    fn failed_write_can_be_retried(parameters: ParameterSet) {
        let dir = tempdir().unwrap();

        // A file where the model directory should be makes every commit fail
        let model_dir = dir.path().join("water");
        fs::write(&model_dir, "").unwrap();
        let mut store = CsvScenarioStore::open(model_dir.join("baseline")).unwrap();
        let err = write_parameter_set(&mut store, &parameters, "blocked", 1).unwrap_err();
        assert_eq!(err.to_string(), "Failed to commit parameter set");
        assert!(store.is_empty());

        fs::remove_file(&model_dir).unwrap();
        write_parameter_set(&mut store, &parameters, "unblocked", 0).unwrap();

        let store = CsvScenarioStore::open(model_dir.join("baseline")).unwrap();
        assert_eq!(
            store
                .par(ParameterName::Input, &ParameterFilter::default())
                .len(),
            2
        );
        let commits = store.commits().unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].message, "unblocked");
    }

    #[test]
    fn discard_restores_committed_contents() {
        let dir = tempdir().unwrap();
        let mut store = CsvScenarioStore::open(dir.path().join("baseline")).unwrap();
        assert!(store.discard().is_err());

        store.check_out().unwrap();
        store.add_set("node", "R11_AFR").unwrap();
        store.commit("add node").unwrap();

        store.check_out().unwrap();
        store.remove_set("node", "R11_AFR").unwrap();
        store.add_set("node", "R11_WEU").unwrap();
        store.discard().unwrap();
        assert_eq!(store.set("node"), vec!["R11_AFR"]);

        // Discarding ends the transaction
        assert!(store.add_set("node", "R11_WEU").is_err());
        store.check_out().unwrap();
    }

    #[test]
    fn write_requires_check_out() {
        let dir = tempdir().unwrap();
        let mut store = CsvScenarioStore::open(dir.path().join("baseline")).unwrap();
        assert!(store.add_set("node", "R11_AFR").is_err());
        assert!(
            store
                .add_par(ParameterName::Input, &key(2020), 1.0, "-")
                .is_err()
        );
        assert!(store.commit("nothing").is_err());

        store.check_out().unwrap();
        assert!(store.check_out().is_err());
        store.add_set("node", "R11_AFR").unwrap();
        store.commit("add node").unwrap();

        // Committing ends the transaction
        assert!(store.add_set("node", "R11_WEU").is_err());
    }

    #[rstest]
    fn clone_and_set_default(parameters: ParameterSet) {
        let dir = tempdir().unwrap();
        let mut store = CsvScenarioStore::open(dir.path().join("baseline")).unwrap();
        write_parameter_set(&mut store, &parameters, "initial", 0).unwrap();

        let mut clone = store.clone_scenario("policy").unwrap();
        assert_eq!(clone.path(), dir.path().join("policy"));
        let filter = ParameterFilter {
            year_act: Some(2030),
            ..ParameterFilter::default()
        };
        assert_eq!(clone.par(ParameterName::Input, &filter).len(), 1);
        assert!(store.clone_scenario("policy").is_err());

        clone.set_as_default().unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join(DEFAULT_FILE_NAME)).unwrap(),
            "policy"
        );
    }
}
