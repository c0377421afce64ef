//! Code for reading the inputs to the rate model.
use super::{WideRow, check_non_negative, input_err_msg, read_csv, read_csv_optional, read_wide_csv};
use crate::id::IDCollection;
use crate::rate::{BaseRate, Country, CountryID, RateInputs, RateKind, RateObservation};
use crate::region::RegionID;
use anyhow::{Context, Result, ensure};
use indexmap::IndexSet;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

const RATE_OBSERVATIONS_FILE_NAME: &str = "rate_observations.csv";
const BASE_RATES_FILE_NAME: &str = "base_rates.csv";
const COUNTRIES_FILE_NAME: &str = "countries.csv";
const INCOME_FILE_NAME: &str = "income.csv";
const RATE_SERIES_FILE_NAME: &str = "rate_series.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct CountryRaw {
    country: CountryID,
    region: String,
    population: f64,
}

#[derive(Debug, Deserialize, PartialEq)]
struct RateObservationRaw {
    country: CountryID,
    kind: RateKind,
    income: f64,
    rate: f64,
}

#[derive(Debug, Deserialize, PartialEq)]
struct BaseRateRaw {
    country: CountryID,
    kind: RateKind,
    rate: f64,
    #[serde(rename = "override")]
    rate_override: Option<f64>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct RateSeriesRaw {
    kind: RateKind,
    region: String,
    year: u32,
    value: f64,
}

/// Read everything needed to build rate trajectories
pub fn read_rate_inputs(model_dir: &Path, region_ids: &IndexSet<RegionID>) -> Result<RateInputs> {
    let file_path = model_dir.join(COUNTRIES_FILE_NAME);
    let countries = read_countries_from_iter(read_csv(&file_path)?, region_ids)
        .with_context(|| input_err_msg(&file_path))?;
    let country_ids: HashSet<_> = countries.iter().map(|country| country.id.clone()).collect();

    let file_path = model_dir.join(RATE_OBSERVATIONS_FILE_NAME);
    let observations = read_observations_from_iter(read_csv(&file_path)?)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(BASE_RATES_FILE_NAME);
    let base_rates = read_base_rates_from_iter(read_csv(&file_path)?, &country_ids)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(INCOME_FILE_NAME);
    let income = income_from_rows(read_wide_csv(&file_path, &["year"])?, region_ids)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(RATE_SERIES_FILE_NAME);
    let tabular = read_rate_series_from_iter(read_csv_optional(&file_path)?, region_ids)
        .with_context(|| input_err_msg(&file_path))?;

    Ok(RateInputs {
        observations,
        base_rates,
        countries,
        income,
        tabular,
    })
}

fn check_rate(what: &str, rate: f64) -> Result<()> {
    ensure!(
        (0.0..=1.0).contains(&rate),
        "{what} must be between 0 and 1 (got {rate})"
    );
    Ok(())
}

fn read_countries_from_iter<I>(iter: I, region_ids: &IndexSet<RegionID>) -> Result<Vec<Country>>
where
    I: Iterator<Item = CountryRaw>,
{
    let mut seen = HashSet::new();
    let mut countries = Vec::new();
    for raw in iter {
        ensure!(
            seen.insert(raw.country.clone()),
            "Duplicate country ID: {}",
            raw.country
        );
        check_non_negative(&format!("Population of {}", raw.country), raw.population)?;
        countries.push(Country {
            region: region_ids.get_id(&raw.region)?.clone(),
            id: raw.country,
            population: raw.population,
        });
    }

    Ok(countries)
}

fn read_observations_from_iter<I>(iter: I) -> Result<Vec<RateObservation>>
where
    I: Iterator<Item = RateObservationRaw>,
{
    iter.map(|raw| {
        ensure!(
            raw.kind.is_modelled(),
            "Observations for {} rates cannot be used to fit the rate model",
            raw.kind
        );
        ensure!(
            raw.income.is_finite() && raw.income > 0.0,
            "Income for {} must be positive",
            raw.country
        );
        check_rate(&format!("{} rate for {}", raw.kind, raw.country), raw.rate)?;
        Ok(RateObservation {
            country: raw.country,
            kind: raw.kind,
            income: raw.income,
            rate: raw.rate,
        })
    })
    .collect()
}

fn read_base_rates_from_iter<I>(iter: I, country_ids: &HashSet<CountryID>) -> Result<Vec<BaseRate>>
where
    I: Iterator<Item = BaseRateRaw>,
{
    let mut seen = HashSet::new();
    let mut base_rates = Vec::new();
    for raw in iter {
        ensure!(
            country_ids.contains(&raw.country),
            "Unknown country: {}",
            raw.country
        );
        ensure!(
            raw.kind.is_modelled(),
            "Base rates can only be given for modelled rates (got {})",
            raw.kind
        );
        ensure!(
            seen.insert((raw.country.clone(), raw.kind)),
            "Duplicate {} base rate for {}",
            raw.kind,
            raw.country
        );
        let what = format!("{} base rate for {}", raw.kind, raw.country);
        check_rate(&what, raw.rate)?;
        if let Some(rate_override) = raw.rate_override {
            check_rate(&what, rate_override)?;
        }
        base_rates.push(BaseRate {
            country: raw.country,
            kind: raw.kind,
            rate: raw.rate,
            rate_override: raw.rate_override,
        });
    }

    Ok(base_rates)
}

fn income_from_rows(
    rows: Vec<WideRow>,
    region_ids: &IndexSet<RegionID>,
) -> Result<BTreeMap<RegionID, BTreeMap<u32, f64>>> {
    let mut income: BTreeMap<RegionID, BTreeMap<u32, f64>> = BTreeMap::new();
    for row in rows {
        let year: u32 = row.keys[0]
            .parse()
            .with_context(|| format!("Invalid year: {}", row.keys[0]))?;
        for (region, value) in row.values {
            let region = region_ids.get_id(&region)?;
            let Some(value) = value else {
                continue;
            };
            ensure!(
                value.is_finite() && value > 0.0,
                "Income for {region} in {year} must be positive"
            );
            let existing = income.entry(region.clone()).or_default().insert(year, value);
            ensure!(existing.is_none(), "Duplicate year {year}");
        }
    }

    Ok(income)
}

fn read_rate_series_from_iter<I>(
    iter: I,
    region_ids: &IndexSet<RegionID>,
) -> Result<BTreeMap<(RegionID, RateKind), BTreeMap<u32, f64>>>
where
    I: Iterator<Item = RateSeriesRaw>,
{
    let mut map: BTreeMap<(RegionID, RateKind), BTreeMap<u32, f64>> = BTreeMap::new();
    for raw in iter {
        ensure!(
            !raw.kind.is_modelled(),
            "{} rates are projected by the rate model and cannot be given as a series",
            raw.kind
        );
        let region = region_ids.get_id(&raw.region)?.clone();
        check_rate(&format!("{} rate for {region}", raw.kind), raw.value)?;
        let existing = map
            .entry((region.clone(), raw.kind))
            .or_default()
            .insert(raw.year, raw.value);
        ensure!(
            existing.is_none(),
            "Duplicate {} rate for {region} in {}",
            raw.kind,
            raw.year
        );
    }

    Ok(map)
}
