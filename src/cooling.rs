//! Derivation of cooling-technology coefficients from raw per-technology data.
//!
//! Water withdrawal of a cooling variant scales with the share of the base technology's energy
//! input which has to be rejected as heat. As base-technology efficiency improves across
//! vintages, the cooling fraction (and so the water withdrawal) changes with it.
use crate::commodity::WaterSupplyType;
use crate::error::PipelineError;
use crate::technology::{CoolingMode, TechnologyID};
use crate::units::m3_per_gj_to_km3_per_gwa;
use indexmap::IndexMap;
use log::warn;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::collections::BTreeMap;

/// Efficiency of base technologies which have no fuel input (e.g. nuclear, geothermal)
const DEFAULT_EFFICIENCY_OVERRIDES: [(&str, f64); 7] = [
    ("nuc_lc", 0.33),
    ("nuc_hc", 0.33),
    ("nuc_fbr", 0.33),
    ("geo_ppl", 0.15),
    ("solar_th_ppl", 0.35),
    ("csp_sm1_ppl", 0.35),
    ("csp_sm3_ppl", 0.35),
];

/// Which of the raw intensity estimates to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, DeserializeLabeledStringEnum)]
pub enum CoefficientLevel {
    /// Low estimate
    #[string = "low"]
    Low,
    /// Central estimate
    #[default]
    #[string = "mid"]
    Mid,
    /// High estimate
    #[string = "high"]
    High,
}

/// Low, mid and high estimates of an intensity, any of which may be missing
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LevelValues {
    /// Low estimate
    pub low: Option<f64>,
    /// Central estimate
    pub mid: Option<f64>,
    /// High estimate
    pub high: Option<f64>,
}

impl LevelValues {
    /// The estimate at the given level
    pub fn get(&self, level: CoefficientLevel) -> Option<f64> {
        match level {
            CoefficientLevel::Low => self.low,
            CoefficientLevel::Mid => self.mid,
            CoefficientLevel::High => self.high,
        }
    }
}

/// A row of the cooling coefficient table for one (base technology, cooling mode)
#[derive(Debug, Clone, PartialEq)]
pub struct CoolingCoefficientRow {
    /// The base (cooled) technology
    pub technology: TechnologyID,
    /// The cooling mode
    pub cooling: CoolingMode,
    /// Where cooling water is withdrawn from (`None` for air cooling)
    pub water_supply_type: Option<WaterSupplyType>,
    /// Fraction of input energy emitted as heat through the stack
    pub emissions_heat_fraction: f64,
    /// Withdrawal intensity (m3/GJ of output)
    pub withdrawal: LevelValues,
    /// Consumption intensity (m3/GJ of output)
    pub consumption: LevelValues,
    /// Electricity used by the cooling system per unit of output
    pub parasitic_electricity_fraction: f64,
    /// Heat released into the water body per unit of output
    pub thermal_pollution_fraction: f64,
    /// Investment cost (USD/kW)
    pub inv_cost_usd_per_kw: f64,
    /// Technical lifetime (years)
    pub technical_lifetime: u32,
}

/// Where the efficiency of a base technology comes from
#[derive(Debug, Clone, PartialEq)]
pub enum CoefficientSource {
    /// A fixed efficiency, for technologies without a fuel input
    ManualOverride(f64),
    /// Efficiency per (vintage, activity year)
    Table(BTreeMap<(u32, u32), f64>),
}

impl CoefficientSource {
    /// Look up the efficiency source for a base technology.
    ///
    /// Overrides are consulted first, then the efficiency table.
    pub fn lookup(
        technology: &TechnologyID,
        overrides: &EfficiencyOverrides,
        table: &IndexMap<TechnologyID, BTreeMap<(u32, u32), f64>>,
    ) -> Result<Self, PipelineError> {
        if let Some(efficiency) = overrides.get(technology) {
            return Ok(Self::ManualOverride(efficiency));
        }

        match table.get(technology) {
            Some(series) if !series.is_empty() => Ok(Self::Table(series.clone())),
            _ => Err(PipelineError::missing_coefficient(
                technology,
                "no efficiency override or efficiency data",
            )),
        }
    }

    /// Efficiency for each of the given (vintage, activity year) pairs.
    ///
    /// Pairs missing from a table take the value of the nearest vintage in the table (the
    /// earliest activity year of that vintage), preferring earlier vintages on ties.
    pub fn efficiency_series(&self, pairs: &[(u32, u32)]) -> BTreeMap<(u32, u32), f64> {
        pairs
            .iter()
            .filter_map(|&pair| {
                let value = match self {
                    Self::ManualOverride(value) => Some(*value),
                    Self::Table(table) => table.get(&pair).copied().or_else(|| {
                        table
                            .iter()
                            .min_by_key(|((vintage, _), _)| vintage.abs_diff(pair.0))
                            .map(|(_, value)| *value)
                    }),
                };
                value.map(|value| (pair, value))
            })
            .collect()
    }
}

/// Efficiencies to use for base technologies in place of the efficiency table
#[derive(Debug, Clone, PartialEq)]
pub struct EfficiencyOverrides(IndexMap<TechnologyID, f64>);

impl EfficiencyOverrides {
    /// The built-in overrides, extended (or replaced) by `extra`
    pub fn with_defaults(extra: &IndexMap<TechnologyID, f64>) -> Self {
        let mut map: IndexMap<_, _> = DEFAULT_EFFICIENCY_OVERRIDES
            .iter()
            .map(|&(id, value)| (id.into(), value))
            .collect();
        map.extend(extra.iter().map(|(id, &value)| (id.clone(), value)));
        Self(map)
    }

    /// The override for a technology, if any
    pub fn get(&self, technology: &TechnologyID) -> Option<f64> {
        self.0.get(technology).copied()
    }
}

impl Default for EfficiencyOverrides {
    fn default() -> Self {
        Self::with_defaults(&IndexMap::new())
    }
}

/// Coefficients of one cooling variant
#[derive(Debug, Clone, PartialEq)]
pub struct VariantCoefficients {
    /// Water withdrawal (km3/GWa) per (vintage, activity year)
    pub withdrawal: BTreeMap<(u32, u32), f64>,
    /// Return flow (km3/GWa) per (vintage, activity year)
    pub return_flow: BTreeMap<(u32, u32), f64>,
    /// Electricity used per unit of base-technology output
    pub parasitic_electricity: f64,
    /// Thermal pollution per unit of base-technology output
    pub thermal_pollution: f64,
    /// Whether a thermal pollution emission factor applies (once-through cooling only)
    pub emits_thermal_pollution: bool,
}

/// Derive the coefficients of a cooling variant.
///
/// # Arguments
///
/// * `efficiency` - Base-technology efficiency per (vintage, activity year)
/// * `row` - The raw coefficients for the variant
/// * `level` - Which intensity estimate to use
pub fn derive(
    efficiency: &BTreeMap<(u32, u32), f64>,
    row: &CoolingCoefficientRow,
    level: CoefficientLevel,
) -> Result<VariantCoefficients, PipelineError> {
    let mut coefficients = VariantCoefficients {
        withdrawal: BTreeMap::new(),
        return_flow: BTreeMap::new(),
        parasitic_electricity: row.parasitic_electricity_fraction,
        thermal_pollution: row.thermal_pollution_fraction,
        emits_thermal_pollution: row.cooling.is_once_through(),
    };
    if !row.cooling.uses_water() {
        return Ok(coefficients);
    }

    let missing = |what: &str| {
        PipelineError::missing_coefficient(
            &row.technology,
            format!("no {what} intensity for {} cooling at {level:?} level", row.cooling),
        )
    };
    let withdrawal = row.withdrawal.get(level).ok_or_else(|| missing("withdrawal"))?;
    let consumption = row.consumption.get(level).ok_or_else(|| missing("consumption"))?;
    if efficiency.is_empty() {
        return Err(PipelineError::missing_coefficient(
            &row.technology,
            "empty efficiency series",
        ));
    }

    let fractions = cooling_fractions(efficiency, row.emissions_heat_fraction);
    let ratios = cooling_fraction_ratios(&row.technology, &fractions);
    let return_share = if withdrawal > 0.0 {
        1.0 - consumption / withdrawal
    } else {
        0.0
    };

    for (&pair, &ratio) in &ratios {
        let value = m3_per_gj_to_km3_per_gwa(ratio * withdrawal);
        coefficients.withdrawal.insert(pair, value);
        coefficients.return_flow.insert(pair, value * return_share);
    }

    Ok(coefficients)
}

/// The cooling fraction `cf = eff * (1 - h / max(eff)) - 1` per (vintage, activity year)
pub fn cooling_fractions(
    efficiency: &BTreeMap<(u32, u32), f64>,
    emissions_heat_fraction: f64,
) -> BTreeMap<(u32, u32), f64> {
    let max_efficiency = efficiency.values().copied().fold(f64::NEG_INFINITY, f64::max);
    efficiency
        .iter()
        .map(|(&pair, &eff)| {
            (
                pair,
                eff * (1.0 - emissions_heat_fraction / max_efficiency) - 1.0,
            )
        })
        .collect()
}

/// `cf / max(cf)`, or 1 everywhere if the cooling fractions are zero or of mixed sign
fn cooling_fraction_ratios(
    technology: &TechnologyID,
    fractions: &BTreeMap<(u32, u32), f64>,
) -> BTreeMap<(u32, u32), f64> {
    let max_fraction = fractions.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let all_positive = fractions.values().all(|&cf| cf > 0.0);
    let all_negative = fractions.values().all(|&cf| cf < 0.0);
    if !(all_positive || all_negative) || !max_fraction.is_finite() {
        warn!(
            "Cooling fractions for {technology} are zero or of mixed sign; \
             withdrawal will not be scaled by vintage"
        );
        return fractions.keys().map(|&pair| (pair, 1.0)).collect();
    }

    fractions
        .iter()
        .map(|(&pair, &cf)| (pair, cf / max_fraction))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::SECONDS_PER_YEAR;
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn row() -> CoolingCoefficientRow {
        CoolingCoefficientRow {
            technology: "coal_ppl".into(),
            cooling: CoolingMode::OnceThroughFresh,
            water_supply_type: Some(WaterSupplyType::Freshwater),
            emissions_heat_fraction: 0.1,
            withdrawal: LevelValues {
                low: Some(20.0),
                mid: Some(40.0),
                high: None,
            },
            consumption: LevelValues {
                low: Some(0.5),
                mid: Some(1.0),
                high: Some(1.5),
            },
            parasitic_electricity_fraction: 0.02,
            thermal_pollution_fraction: 1.2,
            inv_cost_usd_per_kw: 25.0,
            technical_lifetime: 30,
        }
    }

    fn efficiency(values: &[(u32, f64)]) -> BTreeMap<(u32, u32), f64> {
        values
            .iter()
            .map(|&(vintage, eff)| ((vintage, vintage), eff))
            .collect()
    }

    #[rstest]
    fn withdrawal_decreases_with_efficiency(row: CoolingCoefficientRow) {
        let eff = efficiency(&[(2020, 0.35), (2030, 0.40), (2040, 0.45)]);
        let coefficients = derive(&eff, &row, CoefficientLevel::Mid).unwrap();

        let withdrawal: Vec<_> = coefficients.withdrawal.values().copied().collect();
        assert_eq!(withdrawal.len(), 3);
        assert!(withdrawal[0] > withdrawal[1]);
        assert!(withdrawal[1] > withdrawal[2]);

        // The most efficient vintage is unscaled
        assert_approx_eq!(
            f64,
            withdrawal[2],
            40.0 * SECONDS_PER_YEAR * 1e-9,
            epsilon = 1e-12
        );
    }

    #[rstest]
    fn return_flow_is_withdrawal_less_consumption(row: CoolingCoefficientRow) {
        let eff = efficiency(&[(2020, 0.4)]);
        let coefficients = derive(&eff, &row, CoefficientLevel::Mid).unwrap();
        let withdrawal = coefficients.withdrawal[&(2020, 2020)];
        assert_approx_eq!(
            f64,
            coefficients.return_flow[&(2020, 2020)],
            withdrawal * (1.0 - 1.0 / 40.0)
        );
        assert!(coefficients.emits_thermal_pollution);
        assert_eq!(coefficients.parasitic_electricity, 0.02);
    }

    #[rstest]
    fn missing_level_value(row: CoolingCoefficientRow) {
        let eff = efficiency(&[(2020, 0.4)]);
        assert!(matches!(
            derive(&eff, &row, CoefficientLevel::High),
            Err(PipelineError::MissingCoefficient { .. })
        ));
    }

    #[rstest]
    fn air_cooling_has_no_water_flows(mut row: CoolingCoefficientRow) {
        row.cooling = CoolingMode::Air;
        row.water_supply_type = None;
        let coefficients = derive(&BTreeMap::new(), &row, CoefficientLevel::High).unwrap();
        assert!(coefficients.withdrawal.is_empty());
        assert!(coefficients.return_flow.is_empty());
        assert!(!coefficients.emits_thermal_pollution);
    }

    #[rstest]
    fn closed_loop_has_no_thermal_pollution(mut row: CoolingCoefficientRow) {
        row.cooling = CoolingMode::ClosedLoopFresh;
        let coefficients =
            derive(&efficiency(&[(2020, 0.4)]), &row, CoefficientLevel::Low).unwrap();
        assert!(!coefficients.emits_thermal_pollution);
        assert_eq!(coefficients.withdrawal.len(), 1);
    }

    #[test]
    fn mixed_sign_fractions_are_not_scaled() {
        let fractions: BTreeMap<_, _> = [((2020, 2020), -0.5), ((2030, 2030), 0.5)].into();
        let ratios = cooling_fraction_ratios(&"coal_ppl".into(), &fractions);
        assert!(ratios.values().all(|&r| r == 1.0));
    }

    #[test]
    fn coefficient_source_prefers_override() {
        let overrides = EfficiencyOverrides::default();
        let table = [("nuc_lc".into(), efficiency(&[(2020, 0.5)]))].into_iter().collect();
        assert_eq!(
            CoefficientSource::lookup(&"nuc_lc".into(), &overrides, &table).unwrap(),
            CoefficientSource::ManualOverride(0.33)
        );
    }

    #[test]
    fn coefficient_source_missing() {
        let overrides = EfficiencyOverrides::default();
        let table = IndexMap::new();
        assert!(matches!(
            CoefficientSource::lookup(&"coal_ppl".into(), &overrides, &table),
            Err(PipelineError::MissingCoefficient { .. })
        ));
    }

    #[test]
    fn efficiency_series_uses_nearest_vintage() {
        let source = CoefficientSource::Table(efficiency(&[(2020, 0.35), (2040, 0.45)]));
        let series = source.efficiency_series(&[(2020, 2030), (2025, 2025), (2050, 2050)]);
        assert_eq!(series[&(2020, 2030)], 0.35);
        assert_eq!(series[&(2025, 2025)], 0.35);
        assert_eq!(series[&(2050, 2050)], 0.45);
    }
}
