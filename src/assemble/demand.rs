//! Demand records: sectoral withdrawals and return flows split by access rates.
use super::{Assembly, AssemblyContext};
use crate::commodity::{CommodityID, LEVEL_FINAL, LevelID};
use crate::demand::{DemandPoint, DemandSector};
use crate::parameter::{ParameterKey, ParameterName, ParameterSet};
use crate::rate::RateKind;
use crate::region::RegionID;
use crate::units::{Dimensionless, Km3PerYear};
use anyhow::{Context, Result};
use log::info;

/// Unit of demand records
const DEMAND_UNIT: &str = Km3PerYear::unit();

/// A demand value for one commodity, before it is split across time slices
#[derive(Debug, Clone, PartialEq)]
pub struct SectorDemand {
    /// The demanded commodity (e.g. `urban_mw`)
    pub commodity: CommodityID,
    /// Annual value; negative for return flows
    pub value: f64,
}

/// Split a sector's withdrawal and return flow into demand commodities.
///
/// Withdrawals are split into connected (`_mw`) and disconnected (`_dis`) parts by the connection
/// rate, and return flows into collected and uncollected wastewater by the treatment rate. Sectors
/// without access rates demand all of their withdrawal as `_mw` and return all of their flow as
/// uncollected wastewater.
pub fn split_sector_demand(
    sector: DemandSector,
    point: DemandPoint,
    connection: Dimensionless,
    treatment: Dimensionless,
) -> Vec<SectorDemand> {
    let commodity = |suffix: &str| CommodityID::from(format!("{sector}_{suffix}"));
    let DemandPoint {
        withdrawal,
        return_flow,
    } = point;

    if !sector.has_access_rates() {
        return vec![
            SectorDemand {
                commodity: commodity("mw"),
                value: withdrawal.value(),
            },
            SectorDemand {
                commodity: commodity("uncollected_wst"),
                value: return_flow.value(),
            },
        ];
    }

    let all = Dimensionless(1.0);
    vec![
        SectorDemand {
            commodity: commodity("mw"),
            value: (withdrawal * connection).value(),
        },
        SectorDemand {
            commodity: commodity("dis"),
            value: (withdrawal * (all - connection)).value(),
        },
        SectorDemand {
            commodity: commodity("collected_wst"),
            value: (return_flow * treatment).value(),
        },
        SectorDemand {
            commodity: commodity("uncollected_wst"),
            value: (return_flow * (all - treatment)).value(),
        },
    ]
}

/// Add demand records for all regions, sectors and years
pub fn add_demand(context: &AssemblyContext, assembly: &mut Assembly) -> Result<()> {
    let mut buffer = context.buffer();
    for ((region, sector, year), point) in context.demand.iter() {
        let (connection, treatment) = if sector.has_access_rates() {
            (
                rate(context, region, RateKind::Connection, *year)?,
                rate(context, region, RateKind::Treatment, *year)?,
            )
        } else {
            (Dimensionless(1.0), Dimensionless(1.0))
        };

        for demand in split_sector_demand(*sector, *point, connection, treatment) {
            add_sector_demand(context, &mut buffer, region, *year, &demand)?;
        }
    }

    info!("[demand] {} records", buffer.len());
    assembly.parameters.merge(buffer)
}

fn rate(
    context: &AssemblyContext,
    region: &RegionID,
    kind: RateKind,
    year: u32,
) -> Result<Dimensionless> {
    context
        .rates
        .get(region, kind, year)
        .map(Dimensionless)
        .with_context(|| format!("No {kind} rate for {region} in {year}"))
}

fn add_sector_demand(
    context: &AssemblyContext,
    buffer: &mut ParameterSet,
    region: &RegionID,
    year: u32,
    demand: &SectorDemand,
) -> Result<()> {
    let level = LevelID::from(LEVEL_FINAL);
    for (time, duration) in context.time_slices() {
        buffer.add_value(
            ParameterName::Demand,
            ParameterKey::demand(region, &demand.commodity, &level, year, time),
            demand.value * duration,
            DEMAND_UNIT,
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn point() -> DemandPoint {
        DemandPoint {
            withdrawal: Km3PerYear(10.0),
            return_flow: Km3PerYear(-8.0),
        }
    }

    #[test]
    fn split_urban_demand() {
        let demands = split_sector_demand(
            DemandSector::Urban,
            point(),
            Dimensionless(0.75),
            Dimensionless(0.5),
        );
        let commodities = demands
            .iter()
            .map(|demand| demand.commodity.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            commodities,
            [
                "urban_mw",
                "urban_dis",
                "urban_collected_wst",
                "urban_uncollected_wst"
            ]
        );
        assert_approx_eq!(f64, demands[0].value, 7.5);
        assert_approx_eq!(f64, demands[1].value, 2.5);
        assert_approx_eq!(f64, demands[2].value, -4.0);
        assert_approx_eq!(f64, demands[3].value, -4.0);

        // The parts add up to the whole
        let total_withdrawal = demands[0].value + demands[1].value;
        assert_approx_eq!(f64, total_withdrawal, 10.0);
    }

    #[test]
    fn split_industry_demand() {
        let demands = split_sector_demand(
            DemandSector::Industry,
            point(),
            Dimensionless(0.1),
            Dimensionless(0.1),
        );
        assert_eq!(demands.len(), 2);
        assert_eq!(demands[0].commodity, "industry_mw".into());
        assert_approx_eq!(f64, demands[0].value, 10.0);
        assert_eq!(demands[1].commodity, "industry_uncollected_wst".into());
        assert_approx_eq!(f64, demands[1].value, -8.0);
    }
}
