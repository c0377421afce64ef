//! Parameter records and the parameter set written to the scenario store.
//!
//! A record is identified by its parameter name and key. Records are held in ordered maps so that
//! a parameter set is always iterated (and serialised) in the same order.
use crate::commodity::{CommodityID, EmissionID, LevelID};
use crate::region::RegionID;
use crate::technology::{ModeID, TechnologyID};
use crate::time_slice::TimeSliceID;
use crate::units::round_to;
use anyhow::{Result, anyhow, ensure};
use serde::{Deserialize, Serialize};
use serde_string_enum::DeserializeLabeledStringEnum;
use std::collections::{BTreeMap, BTreeSet};

/// The name of a model parameter
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    DeserializeLabeledStringEnum,
    strum::Display,
    strum::EnumIter,
)]
pub enum ParameterName {
    /// Investment cost
    #[string = "inv_cost"]
    #[strum(serialize = "inv_cost")]
    InvCost,
    /// Fixed operation and maintenance cost
    #[string = "fix_cost"]
    #[strum(serialize = "fix_cost")]
    FixCost,
    /// Variable operation and maintenance cost
    #[string = "var_cost"]
    #[strum(serialize = "var_cost")]
    VarCost,
    /// Capacity factor
    #[string = "capacity_factor"]
    #[strum(serialize = "capacity_factor")]
    CapacityFactor,
    /// Technical lifetime
    #[string = "technical_lifetime"]
    #[strum(serialize = "technical_lifetime")]
    TechnicalLifetime,
    /// Construction time
    #[string = "construction_time"]
    #[strum(serialize = "construction_time")]
    ConstructionTime,
    /// Input per unit of activity
    #[string = "input"]
    #[strum(serialize = "input")]
    Input,
    /// Output per unit of activity
    #[string = "output"]
    #[strum(serialize = "output")]
    Output,
    /// Emission per unit of activity
    #[string = "emission_factor"]
    #[strum(serialize = "emission_factor")]
    EmissionFactor,
    /// Exogenous demand
    #[string = "demand"]
    #[strum(serialize = "demand")]
    Demand,
    /// Capacity built before the first model year
    #[string = "historical_new_capacity"]
    #[strum(serialize = "historical_new_capacity")]
    HistoricalNewCapacity,
    /// Activity before the first model year
    #[string = "historical_activity"]
    #[strum(serialize = "historical_activity")]
    HistoricalActivity,
    /// Lower bound on activity
    #[string = "bound_activity_lo"]
    #[strum(serialize = "bound_activity_lo")]
    BoundActivityLo,
    /// Upper bound on activity
    #[string = "bound_activity_up"]
    #[strum(serialize = "bound_activity_up")]
    BoundActivityUp,
}

impl ParameterName {
    /// Whether values of this parameter may be negative (return flows are negative demands)
    pub fn allows_negative(self) -> bool {
        self == Self::Demand
    }

    /// Whether this is a cost or lifetime parameter
    pub fn is_cost_or_lifetime(self) -> bool {
        matches!(
            self,
            Self::InvCost | Self::FixCost | Self::VarCost | Self::TechnicalLifetime
        )
    }

    /// Whether this is an input or output parameter
    pub fn is_flow(self) -> bool {
        matches!(self, Self::Input | Self::Output)
    }
}

/// The index of a parameter record.
///
/// Which fields are set depends on the parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ParameterKey {
    /// Region
    pub node: Option<RegionID>,
    /// Technology
    pub technology: Option<TechnologyID>,
    /// Commodity
    pub commodity: Option<CommodityID>,
    /// Level of the commodity
    pub level: Option<LevelID>,
    /// Emission
    pub emission: Option<EmissionID>,
    /// Vintage year
    pub year_vtg: Option<u32>,
    /// Activity year (or the year of a demand)
    pub year_act: Option<u32>,
    /// Mode of operation
    pub mode: Option<ModeID>,
    /// Time slice
    pub time: Option<TimeSliceID>,
}

impl ParameterKey {
    /// A key for a technology in a region
    pub fn technology(node: &RegionID, technology: &TechnologyID) -> Self {
        Self {
            node: Some(node.clone()),
            technology: Some(technology.clone()),
            ..Self::default()
        }
    }

    /// A key for a demand
    pub fn demand(
        node: &RegionID,
        commodity: &CommodityID,
        level: &LevelID,
        year: u32,
        time: &TimeSliceID,
    ) -> Self {
        Self {
            node: Some(node.clone()),
            commodity: Some(commodity.clone()),
            level: Some(level.clone()),
            year_act: Some(year),
            time: Some(time.clone()),
            ..Self::default()
        }
    }

    /// Set the vintage year
    pub fn with_vintage(mut self, year: u32) -> Self {
        self.year_vtg = Some(year);
        self
    }

    /// Set the activity year
    pub fn with_activity_year(mut self, year: u32) -> Self {
        self.year_act = Some(year);
        self
    }

    /// Set the vintage and activity years
    pub fn with_years(self, year_vtg: u32, year_act: u32) -> Self {
        self.with_vintage(year_vtg).with_activity_year(year_act)
    }

    /// Set the commodity and level
    pub fn with_commodity(mut self, commodity: &CommodityID, level: &LevelID) -> Self {
        self.commodity = Some(commodity.clone());
        self.level = Some(level.clone());
        self
    }

    /// Set the emission
    pub fn with_emission(mut self, emission: &EmissionID) -> Self {
        self.emission = Some(emission.clone());
        self
    }

    /// Set the mode and time slice
    pub fn with_mode_time(mut self, mode: &ModeID, time: &TimeSliceID) -> Self {
        self.mode = Some(mode.clone());
        self.time = Some(time.clone());
        self
    }

    /// Set the mode only
    pub fn with_mode(mut self, mode: &ModeID) -> Self {
        self.mode = Some(mode.clone());
        self
    }

    /// Set the time slice only
    pub fn with_time(mut self, time: &TimeSliceID) -> Self {
        self.time = Some(time.clone());
        self
    }

    /// The (node, technology) pair, if both are set
    pub fn node_technology(&self) -> Option<(&RegionID, &TechnologyID)> {
        Some((self.node.as_ref()?, self.technology.as_ref()?))
    }
}

/// A single parameter value
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRecord {
    /// The parameter
    pub name: ParameterName,
    /// Its index
    pub key: ParameterKey,
    /// The value
    pub value: f64,
    /// The unit of the value
    pub unit: String,
}

impl ParameterRecord {
    /// Create a new record
    pub fn new(name: ParameterName, key: ParameterKey, value: f64, unit: &str) -> Self {
        Self {
            name,
            key,
            value,
            unit: unit.to_string(),
        }
    }
}

/// A flat representation of a record, as written to CSV files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRow {
    /// The parameter name
    pub parameter: String,
    /// Region
    pub node: Option<String>,
    /// Technology
    pub technology: Option<String>,
    /// Commodity
    pub commodity: Option<String>,
    /// Level
    pub level: Option<String>,
    /// Emission
    pub emission: Option<String>,
    /// Vintage year
    pub year_vtg: Option<u32>,
    /// Activity year
    pub year_act: Option<u32>,
    /// Mode
    pub mode: Option<String>,
    /// Time slice
    pub time: Option<String>,
    /// The value
    pub value: f64,
    /// The unit
    pub unit: String,
}

impl From<&ParameterRecord> for ParameterRow {
    fn from(record: &ParameterRecord) -> Self {
        let key = &record.key;
        let text = |id: Option<&str>| id.map(str::to_string);
        Self {
            parameter: record.name.to_string(),
            node: text(key.node.as_ref().map(RegionID::as_str)),
            technology: text(key.technology.as_ref().map(TechnologyID::as_str)),
            commodity: text(key.commodity.as_ref().map(CommodityID::as_str)),
            level: text(key.level.as_ref().map(LevelID::as_str)),
            emission: text(key.emission.as_ref().map(EmissionID::as_str)),
            year_vtg: key.year_vtg,
            year_act: key.year_act,
            mode: text(key.mode.as_ref().map(ModeID::as_str)),
            time: text(key.time.as_ref().map(TimeSliceID::as_str)),
            value: record.value,
            unit: record.unit.clone(),
        }
    }
}

impl TryFrom<ParameterRow> for ParameterRecord {
    type Error = anyhow::Error;

    fn try_from(row: ParameterRow) -> Result<Self> {
        let name: ParameterName = row.parameter.parse().map_err(|err: String| anyhow!(err))?;
        let key = ParameterKey {
            node: row.node.map(Into::into),
            technology: row.technology.map(Into::into),
            commodity: row.commodity.map(Into::into),
            level: row.level.map(Into::into),
            emission: row.emission.map(Into::into),
            year_vtg: row.year_vtg,
            year_act: row.year_act,
            mode: row.mode.map(Into::into),
            time: row.time.map(Into::into),
        };
        Ok(Self {
            name,
            key,
            value: row.value,
            unit: row.unit,
        })
    }
}

/// The sets a parameter set declares to the scenario store
pub const SET_NAMES: [&str; 8] = [
    "node",
    "technology",
    "commodity",
    "level",
    "emission",
    "mode",
    "time",
    "year",
];

/// A collection of parameter records and the set elements they use
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    records: BTreeMap<(ParameterName, ParameterKey), (f64, String)>,
    sets: BTreeMap<&'static str, BTreeSet<String>>,
    digits: u32,
}

impl ParameterSet {
    /// Create an empty parameter set which rounds values to `digits` decimal places
    pub fn new(digits: u32) -> Self {
        Self {
            records: BTreeMap::new(),
            sets: BTreeMap::new(),
            digits,
        }
    }

    /// Add a record.
    ///
    /// The value is rounded first. It must then be finite and (except for demands) non-negative,
    /// and no record with the same name and key may already exist.
    pub fn add(&mut self, mut record: ParameterRecord) -> Result<()> {
        // Adding zero turns -0.0 into 0.0
        record.value = round_to(record.value, self.digits) + 0.0;
        self.check(&record)?;
        self.insert(record);
        Ok(())
    }

    /// Add a record built from its parts
    pub fn add_value(
        &mut self,
        name: ParameterName,
        key: ParameterKey,
        value: f64,
        unit: &str,
    ) -> Result<()> {
        self.add(ParameterRecord::new(name, key, value, unit))
    }

    /// Merge all records of another set into this one.
    ///
    /// Either all records are merged or (if any is invalid or a duplicate) none are.
    pub fn merge(&mut self, other: ParameterSet) -> Result<()> {
        for record in other.iter() {
            self.check(&record)?;
        }
        for (set, values) in other.sets {
            self.sets.entry(set).or_default().extend(values);
        }
        for ((name, key), (value, unit)) in other.records {
            self.records.insert((name, key), (value, unit));
        }

        Ok(())
    }

    /// The value of a record
    pub fn get(&self, name: ParameterName, key: &ParameterKey) -> Option<f64> {
        self.records.get(&(name, key.clone())).map(|(value, _)| *value)
    }

    /// Iterate over the records of one parameter
    pub fn records(&self, name: ParameterName) -> impl Iterator<Item = ParameterRecord> + '_ {
        self.iter().filter(move |record| record.name == name)
    }

    /// Iterate over all records, ordered by name then key
    pub fn iter(&self) -> impl Iterator<Item = ParameterRecord> + '_ {
        self.records
            .iter()
            .map(|((name, key), (value, unit))| ParameterRecord {
                name: *name,
                key: key.clone(),
                value: *value,
                unit: unit.clone(),
            })
    }

    /// The elements of each set used by the records
    pub fn sets(&self) -> &BTreeMap<&'static str, BTreeSet<String>> {
        &self.sets
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The rounding precision of the set
    pub fn digits(&self) -> u32 {
        self.digits
    }

    fn check(&self, record: &ParameterRecord) -> Result<()> {
        ensure!(
            record.value.is_finite(),
            "Non-finite value for {} ({:?})",
            record.name,
            record.key
        );
        ensure!(
            record.name.allows_negative() || record.value >= 0.0,
            "Negative value ({}) for {} ({:?})",
            record.value,
            record.name,
            record.key
        );
        ensure!(
            !self
                .records
                .contains_key(&(record.name, record.key.clone())),
            "Duplicate {} record ({:?})",
            record.name,
            record.key
        );

        Ok(())
    }

    fn insert(&mut self, record: ParameterRecord) {
        let key = &record.key;
        let mut declare = |set: &'static str, value: Option<String>| {
            if let Some(value) = value {
                self.sets.entry(set).or_default().insert(value);
            }
        };
        declare("node", key.node.as_ref().map(ToString::to_string));
        declare("technology", key.technology.as_ref().map(ToString::to_string));
        declare("commodity", key.commodity.as_ref().map(ToString::to_string));
        declare("level", key.level.as_ref().map(ToString::to_string));
        declare("emission", key.emission.as_ref().map(ToString::to_string));
        declare("mode", key.mode.as_ref().map(ToString::to_string));
        declare("time", key.time.as_ref().map(ToString::to_string));
        for year in [key.year_vtg, key.year_act].into_iter().flatten() {
            declare("year", Some(year.to_string()));
        }

        self.records
            .insert((record.name, record.key), (record.value, record.unit));
    }
}
