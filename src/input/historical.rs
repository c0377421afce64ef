//! Code for reading historical capacity and activity, and desalination data.
use super::cooling::regional_shares;
use super::{
    WideRow, check_non_negative, input_err_msg, read_csv, read_csv_optional, read_wide_csv,
};
use crate::historical::{CapacityActivity, CapacityActivityMap};
use crate::id::IDCollection;
use crate::model::DesalinationData;
use crate::region::RegionID;
use crate::technology::{TechnologyFamily, TechnologyID, TechnologyMap};
use crate::units::mcm_per_year_to_km3;
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

const HISTORICAL_POWER_FILE_NAME: &str = "historical_power.csv";
const LOCKED_IN_FILE_NAME: &str = "locked_in.csv";
const DESAL_SHARES_FILE_NAME: &str = "desal_shares.csv";
const HISTORICAL_DESALINATION_FILE_NAME: &str = "historical_desalination.csv";
const DESAL_POTENTIAL_FILE_NAME: &str = "desal_potential.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct CapacityActivityRaw {
    technology: TechnologyID,
    region: String,
    year: u32,
    capacity: f64,
    activity: f64,
}

#[derive(Debug, Deserialize, PartialEq)]
struct RegionalValueRaw {
    region: String,
    year: u32,
    #[serde(alias = "capacity")]
    value: f64,
}

/// Read historical capacity (GW) and activity (GWa) of power-plant technologies
pub fn read_historical_power(
    model_dir: &Path,
    region_ids: &IndexSet<RegionID>,
) -> Result<CapacityActivityMap> {
    let file_path = model_dir.join(HISTORICAL_POWER_FILE_NAME);
    let iter = read_csv(&file_path)?;
    read_capacity_activity_from_iter(iter, region_ids).with_context(|| input_err_msg(&file_path))
}

/// Read locked-in capacity and activity of cooling variants.
///
/// The file is optional; a missing file means nothing is locked in.
pub fn read_locked_in(
    model_dir: &Path,
    region_ids: &IndexSet<RegionID>,
) -> Result<CapacityActivityMap> {
    let file_path = model_dir.join(LOCKED_IN_FILE_NAME);
    let iter = read_csv_optional(&file_path)?;
    read_capacity_activity_from_iter(iter, region_ids).with_context(|| input_err_msg(&file_path))
}

fn read_capacity_activity_from_iter<I>(
    iter: I,
    region_ids: &IndexSet<RegionID>,
) -> Result<CapacityActivityMap>
where
    I: Iterator<Item = CapacityActivityRaw>,
{
    let mut map = CapacityActivityMap::new();
    for raw in iter {
        let region = region_ids.get_id(&raw.region)?.clone();
        check_non_negative(&format!("Capacity of {}", raw.technology), raw.capacity)?;
        check_non_negative(&format!("Activity of {}", raw.technology), raw.activity)?;

        let value = CapacityActivity {
            capacity: raw.capacity,
            activity: raw.activity,
        };
        let existing = map
            .entry((raw.technology.clone(), region))
            .or_default()
            .insert(raw.year, value);
        ensure!(
            existing.is_none(),
            "Duplicate entry for {} in region {} and year {}",
            raw.technology,
            raw.region,
            raw.year
        );
    }

    Ok(map)
}

/// Read shares, historical capacity and potential of desalination technologies.
///
/// Capacities are converted from mcm/year to km3/year. Historical capacity and potential are
/// optional.
pub fn read_desalination_data(
    model_dir: &Path,
    technologies: &TechnologyMap,
    region_ids: &IndexSet<RegionID>,
) -> Result<DesalinationData> {
    let file_path = model_dir.join(DESAL_SHARES_FILE_NAME);
    let rows = read_wide_csv(&file_path, &["technology"])?;
    let shares = desal_shares_from_rows(rows, technologies, region_ids)
        .with_context(|| input_err_msg(&file_path))?;

    let historical_capacity =
        read_regional_values(&model_dir.join(HISTORICAL_DESALINATION_FILE_NAME), region_ids)?;
    let potential = read_regional_values(&model_dir.join(DESAL_POTENTIAL_FILE_NAME), region_ids)?;

    Ok(DesalinationData {
        shares,
        historical_capacity,
        potential,
    })
}

fn desal_shares_from_rows(
    rows: Vec<WideRow>,
    technologies: &TechnologyMap,
    region_ids: &IndexSet<RegionID>,
) -> Result<IndexMap<TechnologyID, IndexMap<RegionID, f64>>> {
    let mut shares = IndexMap::new();
    for row in rows {
        let id = row.keys[0].as_str();
        let technology = technologies
            .get(id)
            .with_context(|| format!("Undefined technology: {id}"))?;
        ensure!(
            technology.family == TechnologyFamily::Desalination,
            "{id} is not a desalination technology"
        );
        let regional = regional_shares(&row.values, region_ids)
            .with_context(|| format!("Invalid shares for {id}"))?;
        ensure!(
            shares.insert(technology.id.clone(), regional).is_none(),
            "Duplicate shares for {id}"
        );
    }

    Ok(shares)
}

/// Read an optional table of regional values in mcm/year, converting to km3/year
fn read_regional_values(
    file_path: &Path,
    region_ids: &IndexSet<RegionID>,
) -> Result<BTreeMap<RegionID, BTreeMap<u32, f64>>> {
    let iter = read_csv_optional(file_path)?;
    regional_values_from_iter(iter, region_ids).with_context(|| input_err_msg(file_path))
}

fn regional_values_from_iter<I>(
    iter: I,
    region_ids: &IndexSet<RegionID>,
) -> Result<BTreeMap<RegionID, BTreeMap<u32, f64>>>
where
    I: Iterator<Item = RegionalValueRaw>,
{
    let mut map: BTreeMap<RegionID, BTreeMap<u32, f64>> = BTreeMap::new();
    for raw in iter {
        let region = region_ids.get_id(&raw.region)?.clone();
        check_non_negative(&format!("Value for {region} in {}", raw.year), raw.value)?;
        let existing = map
            .entry(region.clone())
            .or_default()
            .insert(raw.year, mcm_per_year_to_km3(raw.value).value());
        ensure!(
            existing.is_none(),
            "Duplicate value for region {region} and year {}",
            raw.year
        );
    }

    Ok(map)
}
