//! Projection of regional rates from base-year observations towards the logistic curve.
use super::{LogisticParams, RateConfig, RateInputs, RateKind, RateSeries, fit_logistic};
use crate::error::PipelineError;
use crate::region::RegionID;
use crate::series::{SeriesBuilder, SeriesMode};
use crate::units::round_to;
use anyhow::{Context, Result};
use indexmap::IndexSet;
use log::{info, warn};
use std::collections::BTreeMap;

/// Project a rate for one step of the horizon.
///
/// The result is the logistic rate at `target_income` plus the base-year gap to the curve, which
/// decays exponentially so that by `total_steps` it has shrunk by `convergence_factor`. The
/// result is clamped to `[0, A]`. At step 0 the base rate is returned unchanged.
pub fn project(
    params: &LogisticParams,
    base_rate: f64,
    base_income: f64,
    target_income: f64,
    step: u32,
    total_steps: u32,
    convergence_factor: f64,
) -> f64 {
    if step == 0 || total_steps == 0 {
        return base_rate;
    }

    let decay = convergence_factor.ln() / f64::from(total_steps);
    let gap = base_rate - params.rate_at(base_income);
    let rate = params.rate_at(target_income) + gap * (-decay * f64::from(step)).exp();
    rate.clamp(0.0, params.asymptote)
}

/// The base-year rate for a country: the override if present, else the discounted observation
pub fn base_year_rate(observed: f64, rate_override: Option<f64>, discount: f64) -> f64 {
    rate_override.unwrap_or(observed * (1.0 - discount))
}

/// Population-weighted base-year rates per region for one kind of rate.
///
/// Regions without any observed country get the global population-weighted mean.
pub fn regional_base_rates(
    inputs: &RateInputs,
    kind: RateKind,
    regions: &IndexSet<RegionID>,
    discount: f64,
) -> Result<BTreeMap<RegionID, f64>, PipelineError> {
    // (weighted sum, total weight) per region
    let mut sums: BTreeMap<&RegionID, (f64, f64)> = BTreeMap::new();
    let mut global = (0.0, 0.0);
    for base in inputs.base_rates.iter().filter(|base| base.kind == kind) {
        let Some(country) = inputs.countries.iter().find(|c| c.id == base.country) else {
            continue;
        };

        let rate = base_year_rate(base.rate, base.rate_override, discount);
        let entry = sums.entry(&country.region).or_default();
        entry.0 += rate * country.population;
        entry.1 += country.population;
        global.0 += rate * country.population;
        global.1 += country.population;
    }

    if global.1 <= 0.0 {
        return Err(PipelineError::InsufficientData {
            what: format!("{kind} base rates"),
            observations: 0,
        });
    }
    let global_mean = global.0 / global.1;

    Ok(regions
        .iter()
        .map(|region| {
            let rate = match sums.get(region) {
                Some(&(sum, weight)) if weight > 0.0 => sum / weight,
                _ => global_mean,
            };
            (region.clone(), rate)
        })
        .collect())
}

/// Build complete rate trajectories for every region and kind of rate.
///
/// Connection and treatment rates are projected from their base-year values with the fitted
/// logistic model, or held constant if the fit diverges. Desalination and recycling rates are
/// completed from the tabular data.
pub fn build_rate_series(
    inputs: &RateInputs,
    regions: &IndexSet<RegionID>,
    years: &[u32],
    config: &RateConfig,
) -> Result<RateSeries> {
    let mut series = RateSeries::default();
    let income = complete_income(inputs, regions, years, config)?;

    for kind in [RateKind::Connection, RateKind::Treatment] {
        let observations: Vec<_> = inputs
            .observations
            .iter()
            .filter(|obs| obs.kind == kind)
            .map(|obs| (obs.income, obs.rate))
            .collect();
        let params = match fit_logistic(&format!("{kind} rate"), &observations, config.rate_ceiling)
        {
            Ok(params) => {
                info!(
                    "Fitted {kind} rate curve: steepness {:.4}, midpoint {:.4}",
                    params.scale, params.midpoint
                );
                Some(params)
            }
            Err(err) => {
                warn!("{err}. Holding base-year {kind} rates constant.");
                None
            }
        };

        let base_rates =
            regional_base_rates(inputs, kind, regions, config.base_year_rate_discount)?;
        for (region, base_rate) in base_rates {
            let values = project_region(
                params.as_ref(),
                base_rate,
                &income[&region],
                years,
                config,
            )?;
            series.insert(region, kind, values);
        }
    }

    let builder = SeriesBuilder::new(
        SeriesMode::Rate {
            ceiling: config.rate_ceiling,
        },
        config.rounding_digits,
    );
    for kind in [RateKind::Desalination, RateKind::Recycling] {
        for region in regions {
            let Some(observed) = inputs.tabular.get(&(region.clone(), kind)) else {
                continue;
            };

            let mut values =
                builder.complete(&format!("{kind} rate in {region}"), observed, years)?;
            if kind == RateKind::Recycling {
                for value in values.values_mut() {
                    *value = value.max(config.recycling_floor);
                }
            }
            series.insert(region.clone(), kind, values);
        }
    }

    if let Some(year) = config.full_access_year {
        series.apply_policy_floor(year, config.rate_ceiling);
    }

    Ok(series)
}

/// Income per region, completed for the base year and every model year
fn complete_income(
    inputs: &RateInputs,
    regions: &IndexSet<RegionID>,
    years: &[u32],
    config: &RateConfig,
) -> Result<BTreeMap<RegionID, BTreeMap<u32, f64>>> {
    let mut required: Vec<u32> = years.to_vec();
    if !required.contains(&config.base_year) {
        required.push(config.base_year);
        required.sort_unstable();
    }

    let builder = SeriesBuilder::new(SeriesMode::Withdrawal, config.rounding_digits);
    regions
        .iter()
        .map(|region| {
            let observed = inputs
                .income
                .get(region)
                .with_context(|| format!("No income data for region {region}"))?;
            let completed = builder.complete(&format!("income in {region}"), observed, &required)?;
            Ok((region.clone(), completed))
        })
        .collect()
}

/// Project one region's rate over the model years
fn project_region(
    params: Option<&LogisticParams>,
    base_rate: f64,
    income: &BTreeMap<u32, f64>,
    years: &[u32],
    config: &RateConfig,
) -> Result<BTreeMap<u32, f64>> {
    let base_income = income[&config.base_year];
    let future: Vec<u32> = years
        .iter()
        .copied()
        .filter(|&year| year > config.base_year)
        .collect();
    let total_steps = u32::try_from(future.len())?;

    let mut values = BTreeMap::new();
    for &year in years {
        let rate = match (params, future.iter().position(|&y| y == year)) {
            (Some(params), Some(idx)) => project(
                params,
                base_rate,
                base_income,
                income[&year],
                u32::try_from(idx + 1)?,
                total_steps,
                config.convergence_factor,
            ),
            _ => base_rate,
        };
        let rate = round_to(rate, config.rounding_digits).clamp(0.0, config.rate_ceiling);
        values.insert(year, rate);
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::{BaseRate, Country, RateObservation};
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};

    fn params() -> LogisticParams {
        LogisticParams {
            asymptote: 0.99,
            scale: 1.5,
            midpoint: 2000.0_f64.ln(),
        }
    }

    #[test]
    fn project_step_zero_is_base_rate() {
        assert_eq!(project(&params(), 0.42, 1000.0, 5000.0, 0, 10, 100.0), 0.42);
    }

    #[test]
    fn project_converges_to_curve() {
        let params = params();
        let base_rate = 0.2;
        let target = params.rate_at(8000.0);

        let at_end = project(&params, base_rate, 1000.0, 8000.0, 10, 10, 100.0);
        let gap = base_rate - params.rate_at(1000.0);
        assert_approx_eq!(f64, at_end, target + gap / 100.0, epsilon = 1e-12);

        // Closer to the curve the further along the horizon
        let early = project(&params, base_rate, 1000.0, 8000.0, 1, 10, 100.0);
        assert!((early - target).abs() > (at_end - target).abs());
    }

    #[test]
    fn project_is_clamped() {
        let rate = project(&params(), 0.99, 100.0, 1e7, 1, 10, 100.0);
        assert!(rate <= 0.99);
        let rate = project(&params(), 0.0, 1e6, 10.0, 1, 10, 100.0);
        assert!(rate >= 0.0);
    }

    #[rstest]
    #[case(0.8, None, 0.76)]
    #[case(0.8, Some(0.5), 0.5)]
    fn base_year_rate_works(#[case] observed: f64, #[case] ovr: Option<f64>, #[case] exp: f64) {
        assert_approx_eq!(f64, base_year_rate(observed, ovr, 0.05), exp);
    }

    #[fixture]
    fn inputs() -> RateInputs {
        let countries = vec![
            Country {
                id: "KEN".into(),
                region: "R11_AFR".into(),
                population: 3.0,
            },
            Country {
                id: "NGA".into(),
                region: "R11_AFR".into(),
                population: 1.0,
            },
            Country {
                id: "DEU".into(),
                region: "R11_WEU".into(),
                population: 4.0,
            },
        ];
        let base_rates = [("KEN", 0.4), ("NGA", 0.8), ("DEU", 1.0)]
            .into_iter()
            .map(|(country, rate)| BaseRate {
                country: country.into(),
                kind: RateKind::Connection,
                rate,
                rate_override: None,
            })
            .collect();
        let observations = [(300.0, 0.15), (1000.0, 0.35), (3000.0, 0.6), (20_000.0, 0.95)]
            .into_iter()
            .map(|(income, rate)| RateObservation {
                country: "XXX".into(),
                kind: RateKind::Connection,
                income,
                rate,
            })
            .collect();
        let income = [("R11_AFR", 1000.0, 2000.0), ("R11_WEU", 30_000.0, 40_000.0)]
            .into_iter()
            .map(|(region, a, b)| (RegionID::from(region), BTreeMap::from([(2010, a), (2030, b)])))
            .collect();
        let tabular = BTreeMap::from([(
            (RegionID::from("R11_WEU"), RateKind::Recycling),
            BTreeMap::from([(2010, 0.0), (2020, 0.0)]),
        )]);

        RateInputs {
            observations,
            base_rates,
            countries,
            income,
            tabular,
        }
    }

    fn regions(names: &[&str]) -> IndexSet<RegionID> {
        names.iter().map(|&name| name.into()).collect()
    }

    #[rstest]
    fn regional_base_rates_are_population_weighted(inputs: RateInputs) {
        let rates = regional_base_rates(
            &inputs,
            RateKind::Connection,
            &regions(&["R11_AFR", "R11_WEU", "R11_NAM"]),
            0.0,
        )
        .unwrap();

        assert_approx_eq!(f64, rates[&RegionID::from("R11_AFR")], 0.5);
        assert_approx_eq!(f64, rates[&RegionID::from("R11_WEU")], 1.0);

        // No countries: global mean
        assert_approx_eq!(f64, rates[&RegionID::from("R11_NAM")], 0.75);
    }

    #[rstest]
    fn regional_base_rates_without_data(inputs: RateInputs) {
        assert_eq!(
            regional_base_rates(&inputs, RateKind::Treatment, &regions(&["R11_AFR"]), 0.05),
            Err(PipelineError::InsufficientData {
                what: "treatment base rates".into(),
                observations: 0
            })
        );
    }

    #[rstest]
    fn build_rate_series_falls_back_when_fit_diverges(mut inputs: RateInputs) {
        inputs.observations.truncate(2);
        let config = RateConfig {
            base_year: 2010,
            ..RateConfig::default()
        };
        let years = [2010, 2020, 2030];
        let mut base = inputs.clone();
        base.base_rates.iter_mut().for_each(|b| b.kind = RateKind::Treatment);
        inputs.base_rates.extend(base.base_rates);

        let series =
            build_rate_series(&inputs, &regions(&["R11_AFR"]), &years, &config).unwrap();
        let afr: RegionID = "R11_AFR".into();
        for year in years {
            assert_approx_eq!(
                f64,
                series.get(&afr, RateKind::Connection, year).unwrap(),
                0.475
            );
        }
    }

    #[rstest]
    fn build_rate_series_projects_and_floors(mut inputs: RateInputs) {
        let treatment: Vec<_> = inputs
            .base_rates
            .iter()
            .map(|base| BaseRate {
                kind: RateKind::Treatment,
                ..base.clone()
            })
            .collect();
        inputs.base_rates.extend(treatment);
        let treatment: Vec<_> = inputs
            .observations
            .iter()
            .map(|obs| RateObservation {
                kind: RateKind::Treatment,
                ..obs.clone()
            })
            .collect();
        inputs.observations.extend(treatment);

        let config = RateConfig {
            base_year: 2010,
            full_access_year: Some(2030),
            ..RateConfig::default()
        };
        let years = [2010, 2020, 2030];
        let series = build_rate_series(
            &inputs,
            &regions(&["R11_AFR", "R11_WEU"]),
            &years,
            &config,
        )
        .unwrap();

        let afr: RegionID = "R11_AFR".into();
        let weu: RegionID = "R11_WEU".into();
        assert_approx_eq!(
            f64,
            series.get(&afr, RateKind::Connection, 2010).unwrap(),
            0.475
        );
        assert_eq!(series.get(&afr, RateKind::Connection, 2030), Some(0.99));
        assert_eq!(series.get(&afr, RateKind::Treatment, 2030), Some(0.99));
        for ((_, _), values) in series.iter() {
            assert!(values.values().all(|&v| (0.0..=0.99).contains(&v)));
        }

        // Recycling rates are floored
        assert_eq!(series.get(&weu, RateKind::Recycling, 2030), Some(0.001));
        assert_eq!(series.get(&afr, RateKind::Recycling, 2030), None);
    }
}
