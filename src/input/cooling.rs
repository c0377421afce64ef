//! Code for reading cooling coefficients, cooling shares and base-technology efficiencies.
use super::{WideRow, check_non_negative, input_err_msg, read_csv, read_wide_csv};
use crate::commodity::WaterSupplyType;
use crate::cooling::{CoolingCoefficientRow, LevelValues};
use crate::model::{CoolingCoefficientMap, CoolingShareMap, EfficiencyMap};
use crate::region::RegionID;
use crate::technology::{CoolingMode, CoolingVariant, TechnologyID};
use anyhow::{Context, Result, anyhow, ensure};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::path::Path;

const COOLING_COEFFICIENTS_FILE_NAME: &str = "cooling_coefficients.csv";
const COOLING_SHARES_FILE_NAME: &str = "cooling_shares.csv";
const BASE_EFFICIENCY_FILE_NAME: &str = "base_efficiency.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct CoolingCoefficientRaw {
    technology: TechnologyID,
    cooling: CoolingMode,
    water_supply_type: Option<WaterSupplyType>,
    emissions_heat_fraction: f64,
    withdrawal_low: Option<f64>,
    withdrawal_mid: Option<f64>,
    withdrawal_high: Option<f64>,
    consumption_low: Option<f64>,
    consumption_mid: Option<f64>,
    consumption_high: Option<f64>,
    parasitic_electricity_fraction: f64,
    thermal_pollution_fraction: f64,
    inv_cost_usd_per_kw: f64,
    technical_lifetime: u32,
}

#[derive(Debug, Deserialize, PartialEq)]
struct BaseEfficiencyRaw {
    technology: TechnologyID,
    vintage: u32,
    year_act: u32,
    value: f64,
}

/// Read the cooling coefficient table
pub fn read_cooling_coefficients(model_dir: &Path) -> Result<CoolingCoefficientMap> {
    let file_path = model_dir.join(COOLING_COEFFICIENTS_FILE_NAME);
    let coefficients_csv = read_csv(&file_path)?;
    read_cooling_coefficients_from_iter(coefficients_csv).with_context(|| input_err_msg(&file_path))
}

fn read_cooling_coefficients_from_iter<I>(iter: I) -> Result<CoolingCoefficientMap>
where
    I: Iterator<Item = CoolingCoefficientRaw>,
{
    let mut map = CoolingCoefficientMap::new();
    for raw in iter {
        let row = cooling_row_from_raw(raw)?;
        let key = (row.technology.clone(), row.cooling);
        ensure!(
            !map.contains_key(&key),
            "Duplicate coefficients for {} with {} cooling",
            key.0,
            key.1
        );
        map.insert(key, row);
    }

    Ok(map)
}

fn cooling_row_from_raw(raw: CoolingCoefficientRaw) -> Result<CoolingCoefficientRow> {
    let name = format!("{} with {} cooling", raw.technology, raw.cooling);
    let expected_supply = match raw.cooling {
        CoolingMode::OnceThroughSaline => Some(WaterSupplyType::Saline),
        CoolingMode::OnceThroughFresh | CoolingMode::ClosedLoopFresh => {
            Some(WaterSupplyType::Freshwater)
        }
        CoolingMode::Air | CoolingMode::None => None,
    };
    ensure!(
        raw.water_supply_type == expected_supply,
        "Water supply type for {name} does not match its cooling mode"
    );
    ensure!(
        (0.0..1.0).contains(&raw.emissions_heat_fraction),
        "emissions_heat_fraction for {name} must be in the range [0, 1)"
    );
    ensure!(
        raw.technical_lifetime > 0,
        "technical_lifetime for {name} must be greater than zero"
    );

    for value in [
        raw.withdrawal_low,
        raw.withdrawal_mid,
        raw.withdrawal_high,
        raw.consumption_low,
        raw.consumption_mid,
        raw.consumption_high,
    ]
    .into_iter()
    .flatten()
    {
        check_non_negative(&format!("Water intensity for {name}"), value)?;
    }
    check_non_negative(
        &format!("parasitic_electricity_fraction for {name}"),
        raw.parasitic_electricity_fraction,
    )?;
    check_non_negative(
        &format!("thermal_pollution_fraction for {name}"),
        raw.thermal_pollution_fraction,
    )?;
    check_non_negative(&format!("inv_cost_usd_per_kw for {name}"), raw.inv_cost_usd_per_kw)?;

    Ok(CoolingCoefficientRow {
        technology: raw.technology,
        cooling: raw.cooling,
        water_supply_type: raw.water_supply_type,
        emissions_heat_fraction: raw.emissions_heat_fraction,
        withdrawal: LevelValues {
            low: raw.withdrawal_low,
            mid: raw.withdrawal_mid,
            high: raw.withdrawal_high,
        },
        consumption: LevelValues {
            low: raw.consumption_low,
            mid: raw.consumption_mid,
            high: raw.consumption_high,
        },
        parasitic_electricity_fraction: raw.parasitic_electricity_fraction,
        thermal_pollution_fraction: raw.thermal_pollution_fraction,
        inv_cost_usd_per_kw: raw.inv_cost_usd_per_kw,
        technical_lifetime: raw.technical_lifetime,
    })
}

/// Read regional shares of cooling variants.
///
/// The table has `technology` and `cooling` columns followed by one column per region. Blank
/// cells mean the variant has no share in that region.
pub fn read_cooling_shares(
    model_dir: &Path,
    region_ids: &IndexSet<RegionID>,
) -> Result<CoolingShareMap> {
    let file_path = model_dir.join(COOLING_SHARES_FILE_NAME);
    let rows = read_wide_csv(&file_path, &["technology", "cooling"])?;
    cooling_shares_from_rows(rows, region_ids).with_context(|| input_err_msg(&file_path))
}

fn cooling_shares_from_rows(
    rows: Vec<WideRow>,
    region_ids: &IndexSet<RegionID>,
) -> Result<CoolingShareMap> {
    let mut map = CoolingShareMap::new();
    for row in rows {
        let base = TechnologyID::from(row.keys[0].as_str());
        let mode: CoolingMode = row.keys[1]
            .parse()
            .map_err(|err: String| anyhow!(err))
            .with_context(|| format!("Invalid cooling mode: {}", row.keys[1]))?;
        let variant = CoolingVariant::new(&base, mode);
        let shares = regional_shares(&row.values, region_ids)
            .with_context(|| format!("Invalid shares for {}", variant.id))?;
        ensure!(
            map.insert(variant.clone(), shares).is_none(),
            "Duplicate shares for {}",
            variant.id
        );
    }

    Ok(map)
}

/// Convert region columns of a wide table into shares, checking regions and values
pub fn regional_shares(
    values: &IndexMap<String, Option<f64>>,
    region_ids: &IndexSet<RegionID>,
) -> Result<IndexMap<RegionID, f64>> {
    let mut shares = IndexMap::new();
    for (region, value) in values {
        let region = region_ids
            .get(region.as_str())
            .with_context(|| format!("Invalid region: {region}"))?;
        if let Some(value) = *value {
            ensure!(
                (0.0..=1.0).contains(&value),
                "Share for {region} must be between 0 and 1"
            );
            shares.insert(region.clone(), value);
        }
    }

    Ok(shares)
}

/// Read efficiencies of base technologies per (vintage, activity year)
pub fn read_base_efficiency(model_dir: &Path) -> Result<EfficiencyMap> {
    let file_path = model_dir.join(BASE_EFFICIENCY_FILE_NAME);
    let efficiency_csv = read_csv(&file_path)?;
    read_base_efficiency_from_iter(efficiency_csv).with_context(|| input_err_msg(&file_path))
}

fn read_base_efficiency_from_iter<I>(iter: I) -> Result<EfficiencyMap>
where
    I: Iterator<Item = BaseEfficiencyRaw>,
{
    let mut map = EfficiencyMap::new();
    for raw in iter {
        ensure!(
            raw.value > 0.0 && raw.value <= 1.0,
            "Efficiency of {} must be in the range (0, 1]",
            raw.technology
        );
        ensure!(
            raw.year_act >= raw.vintage,
            "Activity year before vintage for {}",
            raw.technology
        );
        let existing = map
            .entry(raw.technology.clone())
            .or_default()
            .insert((raw.vintage, raw.year_act), raw.value);
        ensure!(
            existing.is_none(),
            "Duplicate efficiency for {} ({}, {})",
            raw.technology,
            raw.vintage,
            raw.year_act
        );
    }

    Ok(map)
}
