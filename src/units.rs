//! Units used in the model and conversions from the units found in raw input data.
//!
//! Raw data arrive in a mix of units (million m3 per year, m3 per day, kWh per m3, USD per m3
//! etc.). Internally, water flows are in km3/year, electricity in GWa and costs in MUSD. All
//! conversions live here so the constants are defined exactly once.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds in a (non-leap) year
pub const SECONDS_PER_YEAR: f64 = 60.0 * 60.0 * 24.0 * 365.0;

/// Hours in a (non-leap) year
pub const HOURS_PER_YEAR: f64 = 24.0 * 365.0;

/// Days in a (non-leap) year
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Factor converting m3 into km3
const M3_TO_KM3: f64 = 1e-9;

/// The default number of decimal places values are rounded to
pub const DEFAULT_ROUNDING_DIGITS: u32 = 6;

/// Define a unit type wrapping an `f64`
macro_rules! unit_struct {
    ($name:ident, $label:expr) => {
        #[doc = concat!("A value in ", $label)]
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            Default,
            Serialize,
            Deserialize,
            derive_more::Add,
            derive_more::Sub,
            derive_more::AddAssign,
            derive_more::SubAssign,
            derive_more::Neg,
            derive_more::Sum,
        )]
        pub struct $name(pub f64);

        impl $name {
            /// The underlying value
            pub fn value(&self) -> f64 {
                self.0
            }

            /// The absolute value
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            /// The unit label used in output tables
            pub const fn unit() -> &'static str {
                $label
            }
        }

        impl std::ops::Mul<Dimensionless> for $name {
            type Output = $name;

            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl float_cmp::ApproxEq for $name {
            type Margin = float_cmp::F64Margin;

            fn approx_eq<T: Into<Self::Margin>>(self, other: Self, margin: T) -> bool {
                self.0.approx_eq(other.0, margin)
            }
        }
    };
}

/// A dimensionless value (fraction, share or ratio)
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    PartialOrd,
    Default,
    Serialize,
    Deserialize,
    derive_more::Add,
    derive_more::Sub,
    derive_more::Sum,
)]
pub struct Dimensionless(pub f64);

impl fmt::Display for Dimensionless {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

unit_struct!(Km3PerYear, "km3/yr");

/// Round a value to `digits` decimal places (halves are rounded away from zero).
///
/// This is the single rounding policy for values written to the parameter set.
pub fn round_to(value: f64, digits: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }

    let scale = 10f64.powi(i32::try_from(digits).unwrap_or(i32::MAX).min(15));
    let rounded = (value * scale).round() / scale;

    // Avoid writing "-0"
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Convert million m3 per year into km3 per year
pub fn mcm_per_year_to_km3(value: f64) -> Km3PerYear {
    Km3PerYear(value / 1000.0)
}

/// Convert m3 per day into km3 per year
pub fn m3_per_day_to_km3_per_year(value: f64) -> Km3PerYear {
    Km3PerYear(value * DAYS_PER_YEAR * M3_TO_KM3)
}

/// Convert an electricity intensity in kWh/m3 into GWa per km3
pub fn kwh_per_m3_to_gwa_per_km3(value: f64) -> f64 {
    // 1 kWh/m3 is 1e3 GWh/km3
    value * 1e9 / 1e6 / HOURS_PER_YEAR
}

/// Convert a cost in USD per m3 into million USD per km3
pub fn usd_per_m3_to_musd_per_km3(value: f64) -> f64 {
    value * 1e9 / 1e6
}

/// Convert a capacity cost in USD per m3/day into million USD per km3/year
pub fn usd_per_m3_per_day_to_musd_per_km3_per_year(value: f64) -> f64 {
    value * (1.0 / (DAYS_PER_YEAR * M3_TO_KM3)) / 1e6
}

/// Convert a water intensity in m3 per GJ of output into km3 per GWa of output.
///
/// One GWa is `SECONDS_PER_YEAR` GJ.
pub fn m3_per_gj_to_km3_per_gwa(value: f64) -> f64 {
    value * SECONDS_PER_YEAR * M3_TO_KM3
}

/// Convert a capacity cost in USD per kW into million USD per GW (numerically equal)
pub fn usd_per_kw_to_musd_per_gw(value: f64) -> f64 {
    // 1 USD/kW is 1e6 USD/GW
    value
}
