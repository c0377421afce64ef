//! Common routines for handling input data.
use crate::cooling::EfficiencyOverrides;
use crate::model::{Model, ModelParameters};
use crate::technology::{TechnologyFamily, TechnologyID, TechnologyMap};
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use std::collections::HashMap;
use std::fs;
use std::hash::Hash;
use std::path::Path;

mod cooling;
use cooling::{read_base_efficiency, read_cooling_coefficients, read_cooling_shares};
mod demand;
use demand::read_raw_demand;
mod historical;
use historical::{read_desalination_data, read_historical_power, read_locked_in};
mod rate;
use rate::read_rate_inputs;
mod technology;
use technology::{read_technologies, read_technology_data};

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    let vec = read_csv_internal(file_path)?;
    if vec.is_empty() {
        bail!("CSV file {} cannot be empty", file_path.display());
    }
    Ok(vec.into_iter())
}

/// Read a series of type `T`s from a CSV file.
///
/// If the file does not exist, an empty iterator is returned.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv_optional<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    if !file_path.exists() {
        return Ok(Vec::new().into_iter());
    }

    let vec = read_csv_internal(file_path)?;
    Ok(vec.into_iter())
}

fn read_csv_internal<'a, T: DeserializeOwned + 'a>(file_path: &'a Path) -> Result<Vec<T>> {
    let vec = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())
        .with_context(|| input_err_msg(file_path))?;

    Ok(vec)
}

/// A row of a "wide" table: some key columns followed by one numeric column per region or year
#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    /// Values of the key columns, in order
    pub keys: Vec<String>,
    /// Remaining columns, keyed by header. Blank cells are `None`.
    pub values: IndexMap<String, Option<f64>>,
}

/// Read a table with fixed key columns followed by any number of numeric columns.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
/// * `key_columns` - Names of the leading key columns
pub fn read_wide_csv(file_path: &Path, key_columns: &[&str]) -> Result<Vec<WideRow>> {
    read_wide_csv_internal(file_path, key_columns).with_context(|| input_err_msg(file_path))
}

fn read_wide_csv_internal(file_path: &Path, key_columns: &[&str]) -> Result<Vec<WideRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)?;
    let headers = reader.headers()?.clone();
    ensure!(
        headers.len() > key_columns.len()
            && headers.iter().zip(key_columns).all(|(a, b)| a == *b),
        "Expected columns {} followed by at least one value column",
        key_columns.join(", ")
    );
    let value_headers = headers.iter().skip(key_columns.len()).collect_vec();
    ensure!(
        value_headers.iter().all_unique(),
        "Duplicate column headers"
    );

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let keys = record
            .iter()
            .take(key_columns.len())
            .map(str::to_string)
            .collect_vec();
        let values = value_headers
            .iter()
            .zip(record.iter().skip(key_columns.len()))
            .map(|(&header, cell)| -> Result<_> {
                let value = if cell.is_empty() {
                    None
                } else {
                    Some(
                        cell.parse::<f64>()
                            .with_context(|| format!("Invalid number in column {header}: {cell}"))?,
                    )
                };
                Ok((header.to_string(), value))
            })
            .try_collect()?;
        rows.push(WideRow { keys, values });
    }
    ensure!(!rows.is_empty(), "CSV file cannot be empty");

    Ok(rows)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Read an f64, checking that it is between 0 and 1
pub fn deserialise_proportion<'de, D>(deserialiser: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserialiser)?;
    if !(0.0..=1.0).contains(&value) {
        Err(serde::de::Error::custom("Value must be between 0 and 1"))?;
    }

    Ok(value)
}

/// Read an f64, checking that it is between 0 and 1 and not zero
pub fn deserialise_proportion_nonzero<'de, D>(deserialiser: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = deserialise_proportion(deserialiser)?;
    if value == 0.0 {
        Err(serde::de::Error::custom("Value cannot be zero"))?;
    }

    Ok(value)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Indicates that the slice is sorted in ascending order and contains no duplicates
pub fn is_sorted_and_unique<T, I>(iter: I) -> bool
where
    T: PartialOrd + Clone,
    I: IntoIterator<Item = T>,
{
    iter.into_iter().tuple_windows().all(|(a, b)| a < b)
}

/// Insert a key-value pair into a map, raising an error if the key already exists
pub fn try_insert<K, V>(map: &mut HashMap<K, V>, key: &K, value: V) -> Result<()>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    let existing = map.insert(key.clone(), value).is_some();
    ensure!(!existing, "Key {key:?} already exists in the map");
    Ok(())
}

/// Check that a value read from a table is a finite, non-negative number
pub fn check_non_negative(what: &str, value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "{what} must be a finite, non-negative number (got {value})"
    );

    Ok(())
}

/// Read a model from the specified directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The static model data ([`Model`]) or an error.
pub fn load_model<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
    let model_dir = model_dir.as_ref();
    let parameters = ModelParameters::from_path(model_dir)?;
    let region_ids = parameters.region_ids();
    let time_slice_info = parameters.time_slice_info()?;

    let technologies = read_technologies(model_dir, &region_ids)?;
    check_configured_technologies(&parameters, &technologies)?;
    let technology_data = read_technology_data(model_dir, &technologies, &region_ids)?;
    let cooling_coefficients = read_cooling_coefficients(model_dir)?;
    let cooling_shares = read_cooling_shares(model_dir, &region_ids)?;
    let base_efficiency = read_base_efficiency(model_dir)?;
    let historical_power = read_historical_power(model_dir, &region_ids)?;
    let locked_in = read_locked_in(model_dir, &region_ids)?;
    let raw_demand = read_raw_demand(model_dir, &region_ids)?;
    let rate_inputs = read_rate_inputs(model_dir, &region_ids)?;
    let desalination = read_desalination_data(model_dir, &technologies, &region_ids)?;

    Ok(Model {
        model_path: model_dir.to_path_buf(),
        efficiency_overrides: EfficiencyOverrides::with_defaults(&parameters.efficiency_overrides),
        parameters,
        region_ids,
        time_slice_info,
        technologies,
        technology_data,
        cooling_coefficients,
        cooling_shares,
        base_efficiency,
        historical_power,
        locked_in,
        raw_demand,
        rate_inputs,
        desalination,
    })
}

/// Check that technologies named in `model.toml` are defined and of the right family
fn check_configured_technologies(
    parameters: &ModelParameters,
    technologies: &TechnologyMap,
) -> Result<()> {
    let check = |id: &TechnologyID, family: TechnologyFamily| -> Result<()> {
        let technology = technologies
            .get(id)
            .with_context(|| format!("Technology {id} in model.toml is not defined"))?;
        ensure!(
            technology.family == family,
            "Technology {id} in model.toml must be of family {family}"
        );
        Ok(())
    };

    for id in parameters.extraction_shares.keys() {
        check(id, TechnologyFamily::Extraction)?;
    }
    for id in &parameters.recycling_technologies {
        check(id, TechnologyFamily::Wastewater)?;
    }

    Ok(())
}
