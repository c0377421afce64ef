//! Commodities are the named flows (water, wastewater, electricity) linking technologies and
//! demands. The vocabulary is fixed per technology family.
use crate::id::define_id_type;
use serde_string_enum::DeserializeLabeledStringEnum;

define_id_type! {CommodityID}
define_id_type! {LevelID}
define_id_type! {EmissionID}

/// Electricity, consumed by pumping, treatment and cooling
pub const ELECTRICITY: &str = "electr";
/// Fresh water available for withdrawal
pub const FRESHWATER_SUPPLY: &str = "freshwater_supply";
/// Saline water available for withdrawal
pub const SALINE_SUPPLY: &str = "saline_supply";
/// Fresh water returned to the environment after use
pub const FRESH_RETURN: &str = "fresh_return";
/// Saline water returned to the environment after use
pub const SALINE_RETURN: &str = "saline_return";

/// Level for water available at source
pub const LEVEL_WATER_SUPPLY: &str = "water_supply";
/// Level for electricity drawn from the grid
pub const LEVEL_SECONDARY: &str = "secondary";
/// Level for final demands
pub const LEVEL_FINAL: &str = "final";
/// Level for the share commodity linking a cooled technology to its cooling variants
pub const LEVEL_SHARE: &str = "share";

/// The commodity linking a cooled (base) technology to its cooling variants
pub fn cooling_link_commodity(base_technology: &str) -> CommodityID {
    format!("cooling__{base_technology}").into()
}

/// The type of water a technology withdraws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeserializeLabeledStringEnum)]
pub enum WaterSupplyType {
    /// Fresh surface or ground water
    #[string = "freshwater_supply"]
    Freshwater,
    /// Sea water or brackish water
    #[string = "saline_supply"]
    Saline,
}

impl WaterSupplyType {
    /// The commodity withdrawn
    pub fn supply_commodity(self) -> CommodityID {
        match self {
            Self::Freshwater => FRESHWATER_SUPPLY.into(),
            Self::Saline => SALINE_SUPPLY.into(),
        }
    }

    /// The commodity receiving return flows
    pub fn return_commodity(self) -> CommodityID {
        match self {
            Self::Freshwater => FRESH_RETURN.into(),
            Self::Saline => SALINE_RETURN.into(),
        }
    }

    /// The emission used to track heat released into the water body
    pub fn thermal_pollution_emission(self) -> EmissionID {
        match self {
            Self::Freshwater => "fresh_thermal_pollution".into(),
            Self::Saline => "saline_thermal_pollution".into(),
        }
    }

    /// The emission used to track consumptive water use (withdrawal minus return flow)
    pub fn consumption_emission(self) -> EmissionID {
        match self {
            Self::Freshwater => "fresh_consumption".into(),
            Self::Saline => "saline_consumption".into(),
        }
    }

    /// Find the supply type withdrawing the given commodity, if any
    pub fn from_supply_commodity(commodity: &str) -> Option<Self> {
        match commodity {
            FRESHWATER_SUPPLY => Some(Self::Freshwater),
            SALINE_SUPPLY => Some(Self::Saline),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supply_type_commodities() {
        let fresh = WaterSupplyType::Freshwater;
        assert_eq!(fresh.supply_commodity(), FRESHWATER_SUPPLY.into());
        assert_eq!(fresh.return_commodity(), FRESH_RETURN.into());
        assert_eq!(
            WaterSupplyType::from_supply_commodity(SALINE_SUPPLY),
            Some(WaterSupplyType::Saline)
        );
        assert_eq!(WaterSupplyType::from_supply_commodity(ELECTRICITY), None);
    }

    #[test]
    fn cooling_link_commodity_name() {
        assert_eq!(
            cooling_link_commodity("coal_ppl"),
            CommodityID::from("cooling__coal_ppl")
        );
    }
}
