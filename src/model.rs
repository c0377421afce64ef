//! The model represents the static input data provided by the user.
use crate::cooling::{CoolingCoefficientRow, EfficiencyOverrides};
use crate::demand::RawDemandMap;
use crate::historical::CapacityActivityMap;
use crate::rate::RateInputs;
use crate::region::RegionID;
use crate::technology::{
    CoolingMode, CoolingVariant, Technology, TechnologyDataMap, TechnologyFamily, TechnologyID,
    TechnologyMap,
};
use crate::time_slice::TimeSliceInfo;
use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

pub mod parameters;
pub use parameters::ModelParameters;

/// Raw cooling coefficients, keyed by base technology and cooling mode
pub type CoolingCoefficientMap = IndexMap<(TechnologyID, CoolingMode), CoolingCoefficientRow>;

/// Regional shares of each cooling variant in its base technology's capacity
pub type CoolingShareMap = IndexMap<CoolingVariant, IndexMap<RegionID, f64>>;

/// Base-technology efficiency per (vintage, activity year)
pub type EfficiencyMap = IndexMap<TechnologyID, BTreeMap<(u32, u32), f64>>;

/// Data for desalination technologies
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesalinationData {
    /// Share of each desalination technology in each region
    pub shares: IndexMap<TechnologyID, IndexMap<RegionID, f64>>,
    /// Historical desalination capacity (km3/year) per region and year
    pub historical_capacity: BTreeMap<RegionID, BTreeMap<u32, f64>>,
    /// Potential desalination capacity (km3/year) per region and year
    pub potential: BTreeMap<RegionID, BTreeMap<u32, f64>>,
}

/// Model definition
#[derive(Debug)]
pub struct Model {
    /// Path to model folder
    pub model_path: PathBuf,
    /// Parameters from the model TOML file
    pub parameters: ModelParameters,
    /// The model regions
    pub region_ids: IndexSet<RegionID>,
    /// Information about time slices
    pub time_slice_info: TimeSliceInfo,
    /// Technologies for which parameters are requested
    pub technologies: TechnologyMap,
    /// Raw data for table-driven technologies
    pub technology_data: TechnologyDataMap,
    /// Raw coefficients for cooling variants
    pub cooling_coefficients: CoolingCoefficientMap,
    /// Regional shares of cooling variants
    pub cooling_shares: CoolingShareMap,
    /// Efficiency of base technologies
    pub base_efficiency: EfficiencyMap,
    /// Efficiencies used in place of the efficiency table
    pub efficiency_overrides: EfficiencyOverrides,
    /// Historical capacity (GW) and activity (GWa) of base technologies
    pub historical_power: CapacityActivityMap,
    /// Locked-in capacity and activity of cooling variants for gap years
    pub locked_in: CapacityActivityMap,
    /// Raw sectoral demands
    pub raw_demand: RawDemandMap,
    /// Inputs to the rate model
    pub rate_inputs: RateInputs,
    /// Desalination shares, history and potential
    pub desalination: DesalinationData,
}

impl Model {
    /// Iterate over the model's regions
    pub fn iter_regions(&self) -> indexmap::set::Iter<'_, RegionID> {
        self.region_ids.iter()
    }

    /// Iterate over technologies of one family, in input order
    pub fn iter_family(&self, family: TechnologyFamily) -> impl Iterator<Item = &Rc<Technology>> {
        self.technologies
            .values()
            .filter(move |technology| technology.family == family)
    }

    /// The base technologies with cooling variants, in order of first appearance
    pub fn cooled_technologies(&self) -> IndexSet<TechnologyID> {
        self.cooling_shares
            .keys()
            .map(|variant| variant.base.clone())
            .collect()
    }

    /// The cooling variants of a base technology
    pub fn cooling_variants<'a>(
        &'a self,
        base: &'a TechnologyID,
    ) -> impl Iterator<Item = &'a CoolingVariant> {
        self.cooling_shares
            .keys()
            .filter(move |variant| &variant.base == base)
    }
}
