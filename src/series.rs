//! Completion of sparse annual series onto the model's year list.
//!
//! Observed values are copied, gaps between observations are linearly interpolated and years
//! outside the observed range are extrapolated with an annualised growth rate fitted to the two
//! nearest observations (the earliest pair going backwards, the latest pair going forwards).
use crate::error::PipelineError;
use crate::units::round_to;
use itertools::Itertools;
use std::collections::BTreeMap;

/// The upper bound applied to rate series
pub const DEFAULT_RATE_CEILING: f64 = 0.99;

/// How a completed series is post-processed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeriesMode {
    /// Volumes (withdrawals, return flows, capacities): no clamping
    Withdrawal,
    /// Fractions: every value is clamped to `[0, ceiling]`
    Rate {
        /// The largest permitted value
        ceiling: f64,
    },
}

impl SeriesMode {
    /// Rate mode with the default ceiling
    pub fn rate() -> Self {
        Self::Rate {
            ceiling: DEFAULT_RATE_CEILING,
        }
    }
}

/// Builds complete series from sparse observations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesBuilder {
    mode: SeriesMode,
    digits: u32,
}

impl SeriesBuilder {
    /// Create a builder with the given mode and rounding precision
    pub fn new(mode: SeriesMode, digits: u32) -> Self {
        Self { mode, digits }
    }

    /// Produce a value for every required year.
    ///
    /// # Arguments
    ///
    /// * `what` - Description of the series, used in error messages
    /// * `observed` - Sparse observations, keyed by year
    /// * `required_years` - The years for which values are needed
    ///
    /// # Returns
    ///
    /// A complete series or [`PipelineError::InsufficientData`] if extrapolation is needed but
    /// fewer than two observations exist.
    pub fn complete(
        &self,
        what: &str,
        observed: &BTreeMap<u32, f64>,
        required_years: &[u32],
    ) -> Result<BTreeMap<u32, f64>, PipelineError> {
        required_years
            .iter()
            .map(|&year| {
                let value = value_for_year(observed, year).ok_or_else(|| {
                    PipelineError::InsufficientData {
                        what: what.to_string(),
                        observations: observed.len(),
                    }
                })?;

                Ok((year, self.finish(value)))
            })
            .collect()
    }

    /// Round and (in rate mode) clamp a value
    fn finish(&self, value: f64) -> f64 {
        let value = round_to(value, self.digits);
        match self.mode {
            SeriesMode::Withdrawal => value,
            SeriesMode::Rate { ceiling } => value.clamp(0.0, ceiling),
        }
    }
}

/// Annualised growth rate between two observations.
///
/// Degenerate inputs (non-positive start value or ratio, or a non-finite result) give a rate of
/// zero, i.e. the series is held constant.
pub fn growth_rate((year1, value1): (u32, f64), (year2, value2): (u32, f64)) -> f64 {
    if year2 <= year1 || value1 <= 0.0 {
        return 0.0;
    }

    let ratio = value2 / value1;
    if !ratio.is_finite() || ratio <= 0.0 {
        return 0.0;
    }

    let rate = ratio.powf(1.0 / f64::from(year2 - year1)) - 1.0;
    if rate.is_finite() { rate } else { 0.0 }
}

/// The unrounded value for one year, or `None` if it cannot be determined
fn value_for_year(observed: &BTreeMap<u32, f64>, year: u32) -> Option<f64> {
    if let Some(&value) = observed.get(&year) {
        return Some(value);
    }

    let (&first_year, &first_value) = observed.first_key_value()?;
    let (&last_year, &last_value) = observed.last_key_value()?;

    if year < first_year {
        let (y1, y2) = observed.iter().take(2).collect_tuple()?;
        let rate = growth_rate((*y1.0, *y1.1), (*y2.0, *y2.1));
        return Some(first_value * (1.0 + rate).powf(-f64::from(first_year - year)));
    }

    if year > last_year {
        let (y2, y1) = observed.iter().rev().take(2).collect_tuple()?;
        let rate = growth_rate((*y1.0, *y1.1), (*y2.0, *y2.1));
        return Some(last_value * (1.0 + rate).powf(f64::from(year - last_year)));
    }

    // Strictly between two observations
    let (&before_year, &before) = observed.range(..year).next_back()?;
    let (&after_year, &after) = observed.range(year..).next()?;
    let weight = f64::from(year - before_year) / f64::from(after_year - before_year);
    Some(before + (after - before) * weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn series(points: &[(u32, f64)]) -> BTreeMap<u32, f64> {
        points.iter().copied().collect()
    }

    #[test]
    fn forward_extrapolation() {
        let builder = SeriesBuilder::new(SeriesMode::Withdrawal, 6);
        let observed = series(&[(2010, 100.0), (2020, 120.0)]);
        let out = builder
            .complete("withdrawal", &observed, &[2010, 2020, 2030, 2040])
            .unwrap();

        assert_eq!(out.len(), 4);
        assert_approx_eq!(f64, out[&2010], 100.0);
        assert_approx_eq!(f64, out[&2020], 120.0);
        assert_approx_eq!(f64, out[&2030], 144.0, epsilon = 1e-9);
        assert_approx_eq!(f64, out[&2040], 172.8, epsilon = 1e-9);
    }

    #[test]
    fn backward_extrapolation_uses_earliest_pair() {
        let builder = SeriesBuilder::new(SeriesMode::Withdrawal, 6);
        let observed = series(&[(2010, 100.0), (2020, 200.0), (2030, 210.0)]);
        let out = builder.complete("withdrawal", &observed, &[2000]).unwrap();
        assert_approx_eq!(f64, out[&2000], 50.0, epsilon = 1e-9);
    }

    #[test]
    fn interpolation_between_observations() {
        let builder = SeriesBuilder::new(SeriesMode::Withdrawal, 6);
        let observed = series(&[(2010, 100.0), (2020, 200.0)]);
        let out = builder.complete("withdrawal", &observed, &[2015]).unwrap();
        assert_approx_eq!(f64, out[&2015], 150.0);
    }

    #[test]
    fn observed_values_are_rounded_copies() {
        let builder = SeriesBuilder::new(SeriesMode::Withdrawal, 2);
        let observed = series(&[(2010, 1.234_56), (2020, 2.345_67)]);
        let out = builder
            .complete("withdrawal", &observed, &[2010, 2020])
            .unwrap();
        assert_eq!(out[&2010], round_to(1.234_56, 2));
        assert_eq!(out[&2020], round_to(2.345_67, 2));
    }

    #[rstest]
    #[case(0.0, 10.0)] // zero denominator
    #[case(-5.0, 10.0)] // negative denominator
    #[case(10.0, 0.0)] // zero ratio
    fn degenerate_growth_is_flat(#[case] v1: f64, #[case] v2: f64) {
        assert_eq!(growth_rate((2010, v1), (2020, v2)), 0.0);
    }

    #[test]
    fn rate_mode_clamps() {
        let builder = SeriesBuilder::new(SeriesMode::rate(), 6);
        let observed = series(&[(2010, 0.8), (2020, 0.95)]);
        let out = builder
            .complete("connection", &observed, &[2000, 2010, 2020, 2050, 2100])
            .unwrap();
        assert!(out.values().all(|&v| (0.0..=0.99).contains(&v)));
        assert_eq!(out[&2100], 0.99);
    }

    #[test]
    fn rate_mode_clamps_negative() {
        let builder = SeriesBuilder::new(SeriesMode::rate(), 6);
        let observed = series(&[(2010, -0.2), (2020, 0.5)]);
        let out = builder.complete("treatment", &observed, &[2010]).unwrap();
        assert_eq!(out[&2010], 0.0);
    }

    #[test]
    fn insufficient_data() {
        let builder = SeriesBuilder::new(SeriesMode::Withdrawal, 6);

        // One point is enough only for that year
        let observed = series(&[(2010, 100.0)]);
        assert!(builder.complete("x", &observed, &[2010]).is_ok());
        assert_eq!(
            builder.complete("x", &observed, &[2010, 2020]),
            Err(PipelineError::InsufficientData {
                what: "x".into(),
                observations: 1
            })
        );

        // No points at all
        assert!(builder.complete("x", &BTreeMap::new(), &[2010]).is_err());
        assert!(builder.complete("x", &BTreeMap::new(), &[]).unwrap().is_empty());
    }

    #[test]
    fn completion_is_total() {
        let builder = SeriesBuilder::new(SeriesMode::Withdrawal, 4);
        let observed = series(&[(2005, 3.0), (2013, 4.5), (2021, 4.0)]);
        let years: Vec<u32> = (1990..=2100).step_by(5).collect();
        let out = builder.complete("x", &observed, &years).unwrap();
        assert_eq!(out.keys().copied().collect::<Vec<_>>(), years);
    }
}
