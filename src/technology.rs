//! Technologies convert, move or treat water (and use electricity to do so).
//!
//! Every technology belongs to exactly one family. Cooling technologies are additionally tied to
//! the power-plant technology they cool and to a cooling mode.
use crate::commodity::{CommodityID, LevelID};
use crate::id::define_id_type;
use crate::region::RegionID;
use indexmap::{IndexMap, IndexSet};
use serde_string_enum::DeserializeLabeledStringEnum;
use std::rc::Rc;

define_id_type! {TechnologyID}
define_id_type! {ModeID}

/// The mode of operation used when a model defines no others
pub const DEFAULT_MODE: &str = "M1";

/// A map of [`Technology`]s, keyed by technology ID
pub type TechnologyMap = IndexMap<TechnologyID, Rc<Technology>>;

/// Separator between a base technology and its cooling mode in a variant name
const VARIANT_SEPARATOR: &str = "__";

/// The family a technology belongs to.
///
/// The order of the variants is the order in which families are assembled.
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
pub enum TechnologyFamily {
    /// Surface, ground and saline water extraction
    #[string = "extraction"]
    #[strum(serialize = "extraction")]
    Extraction,
    /// Power-plant cooling
    #[string = "cooling"]
    #[strum(serialize = "cooling")]
    Cooling,
    /// Desalination plants
    #[string = "desalination"]
    #[strum(serialize = "desalination")]
    Desalination,
    /// Wastewater collection, treatment and recycling
    #[string = "wastewater"]
    #[strum(serialize = "wastewater")]
    Wastewater,
    /// Conveyance and distribution of treated water
    #[string = "distribution"]
    #[strum(serialize = "distribution")]
    Distribution,
    /// Demand-side water efficiency measures
    #[string = "efficiency"]
    #[strum(serialize = "efficiency")]
    Efficiency,
    /// Reservoir storage
    #[string = "storage"]
    #[strum(serialize = "storage")]
    Storage,
}

impl TechnologyFamily {
    /// Whether a missing technology of this family makes the whole run fail.
    ///
    /// Historical activity accounting depends on extraction technologies being present.
    pub fn is_required(self) -> bool {
        self == Self::Extraction
    }
}

/// How a power plant rejects its waste heat
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
)]
pub enum CoolingMode {
    /// Once-through cooling using fresh water
    #[string = "ot_fresh"]
    #[strum(serialize = "ot_fresh")]
    OnceThroughFresh,
    /// Once-through cooling using saline water
    #[string = "ot_saline"]
    #[strum(serialize = "ot_saline")]
    OnceThroughSaline,
    /// Closed-loop (recirculating) cooling using fresh water
    #[string = "cl_fresh"]
    #[strum(serialize = "cl_fresh")]
    ClosedLoopFresh,
    /// Dry (air) cooling
    #[string = "air"]
    #[strum(serialize = "air")]
    Air,
    /// No cooling needed
    #[string = "none"]
    #[strum(serialize = "none")]
    None,
}

impl CoolingMode {
    /// Whether the mode withdraws water at all
    pub fn uses_water(self) -> bool {
        !matches!(self, Self::Air | Self::None)
    }

    /// Whether heated water is discharged directly back into a water body
    pub fn is_once_through(self) -> bool {
        matches!(self, Self::OnceThroughFresh | Self::OnceThroughSaline)
    }
}

/// A technology in the model
#[derive(Debug, Clone, PartialEq)]
pub struct Technology {
    /// Unique identifier (e.g. `extract_surfacewater`)
    pub id: TechnologyID,
    /// The family the technology belongs to
    pub family: TechnologyFamily,
    /// The regions for which parameters are requested
    pub regions: IndexSet<RegionID>,
}

/// A cooling technology serving a base (cooled) technology
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoolingVariant {
    /// Name of the variant (`<base>__<mode>`)
    pub id: TechnologyID,
    /// The power-plant technology being cooled
    pub base: TechnologyID,
    /// The cooling mode
    pub mode: CoolingMode,
}

impl CoolingVariant {
    /// Create the variant of `base` using `mode`
    pub fn new(base: &TechnologyID, mode: CoolingMode) -> Self {
        Self {
            id: format!("{base}{VARIANT_SEPARATOR}{mode}").into(),
            base: base.clone(),
            mode,
        }
    }
}

/// A commodity flow into or out of a technology
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSpec {
    /// The commodity
    pub commodity: CommodityID,
    /// The level of the commodity
    pub level: LevelID,
    /// The amount per unit of activity, if given
    pub value: Option<f64>,
}

/// Raw techno-economic data for a table-driven technology
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TechnologyData {
    /// Main input
    pub input: Option<FlowSpec>,
    /// Main output
    pub output: Option<FlowSpec>,
    /// Electricity use (kWh/m3)
    pub electricity_kwh_per_m3: Option<f64>,
    /// Investment cost (USD per m3/day of capacity)
    pub inv_cost_usd_per_m3_per_day: Option<f64>,
    /// Fixed cost (USD per m3/day of capacity per year)
    pub fix_cost_usd_per_m3_per_day: Option<f64>,
    /// Variable cost (USD/m3)
    pub var_cost_usd_per_m3: Option<f64>,
    /// Technical lifetime (years)
    pub technical_lifetime: Option<u32>,
    /// Construction time (years)
    pub construction_time: Option<u32>,
    /// Capacity factor
    pub capacity_factor: Option<f64>,
}

/// Technology data, either for all regions or for a specific one
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TechnologyDataMap(IndexMap<(TechnologyID, Option<RegionID>), TechnologyData>);

impl TechnologyDataMap {
    /// Add data for a technology (in all regions if `region` is `None`).
    ///
    /// Returns the previous data if there was any.
    pub fn insert(
        &mut self,
        technology: TechnologyID,
        region: Option<RegionID>,
        data: TechnologyData,
    ) -> Option<TechnologyData> {
        self.0.insert((technology, region), data)
    }

    /// The data for a technology in a region, preferring region-specific data
    pub fn lookup(&self, technology: &TechnologyID, region: &RegionID) -> Option<&TechnologyData> {
        self.0
            .get(&(technology.clone(), Some(region.clone())))
            .or_else(|| self.0.get(&(technology.clone(), None)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn cooling_variant_name() {
        let variant = CoolingVariant::new(&"coal_ppl".into(), CoolingMode::OnceThroughFresh);
        assert_eq!(variant.id, TechnologyID::from("coal_ppl__ot_fresh"));
        assert_eq!(variant.base, TechnologyID::from("coal_ppl"));
    }

    #[test]
    fn cooling_mode_properties() {
        assert!(CoolingMode::OnceThroughSaline.is_once_through());
        assert!(!CoolingMode::ClosedLoopFresh.is_once_through());
        assert!(CoolingMode::ClosedLoopFresh.uses_water());
        assert!(!CoolingMode::Air.uses_water());
    }

    #[test]
    fn family_order_and_requirement() {
        let families: Vec<_> = TechnologyFamily::iter().collect();
        assert_eq!(families.first(), Some(&TechnologyFamily::Extraction));
        assert!(TechnologyFamily::Extraction.is_required());
        assert!(!TechnologyFamily::Storage.is_required());
        assert_eq!(TechnologyFamily::Desalination.to_string(), "desalination");
    }

    #[test]
    fn technology_data_lookup_prefers_region() {
        let tech: TechnologyID = "desal_membrane".into();
        let mut map = TechnologyDataMap::default();
        map.insert(
            tech.clone(),
            None,
            TechnologyData {
                technical_lifetime: Some(20),
                ..TechnologyData::default()
            },
        );
        map.insert(
            tech.clone(),
            Some("R11_WEU".into()),
            TechnologyData {
                technical_lifetime: Some(30),
                ..TechnologyData::default()
            },
        );

        let lifetime = |region: &str| {
            map.lookup(&tech, &region.into())
                .and_then(|data| data.technical_lifetime)
        };
        assert_eq!(lifetime("R11_WEU"), Some(30));
        assert_eq!(lifetime("R11_AFR"), Some(20));
        assert!(map.lookup(&"other".into(), &"R11_AFR".into()).is_none());
    }
}
