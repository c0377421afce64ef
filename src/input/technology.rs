//! Code for reading technologies and their techno-economic data.
use super::{check_non_negative, input_err_msg, read_csv};
use crate::commodity::{CommodityID, ELECTRICITY, LevelID};
use crate::region::{RegionID, parse_region_str};
use crate::technology::{
    FlowSpec, Technology, TechnologyData, TechnologyDataMap, TechnologyFamily, TechnologyID,
    TechnologyMap,
};
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexSet;
use serde::Deserialize;
use std::path::Path;
use std::rc::Rc;

const TECHNOLOGIES_FILE_NAME: &str = "technologies.csv";
const TECHNOLOGY_DATA_FILE_NAME: &str = "technology_data.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct TechnologyRaw {
    technology: TechnologyID,
    family: TechnologyFamily,
    regions: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct TechnologyDataRaw {
    technology: TechnologyID,
    #[serde(default)]
    region: Option<String>,
    input_commodity: Option<String>,
    input_level: Option<String>,
    input_value: Option<f64>,
    output_commodity: Option<String>,
    output_level: Option<String>,
    output_value: Option<f64>,
    electricity_kwh_per_m3: Option<f64>,
    inv_cost_usd_per_m3_per_day: Option<f64>,
    fix_cost_usd_per_m3_per_day: Option<f64>,
    var_cost_usd_per_m3: Option<f64>,
    technical_lifetime: Option<u32>,
    construction_time: Option<u32>,
    capacity_factor: Option<f64>,
}

/// Read the technologies for which parameters are requested.
///
/// Cooling technologies are not listed here: they are derived from the cooling share table.
pub fn read_technologies(
    model_dir: &Path,
    region_ids: &IndexSet<RegionID>,
) -> Result<TechnologyMap> {
    let file_path = model_dir.join(TECHNOLOGIES_FILE_NAME);
    let technologies_csv = read_csv(&file_path)?;
    read_technologies_from_iter(technologies_csv, region_ids)
        .with_context(|| input_err_msg(&file_path))
}

fn read_technologies_from_iter<I>(iter: I, region_ids: &IndexSet<RegionID>) -> Result<TechnologyMap>
where
    I: Iterator<Item = TechnologyRaw>,
{
    let mut technologies = TechnologyMap::new();
    for raw in iter {
        ensure!(
            raw.family != TechnologyFamily::Cooling,
            "Technology {}: cooling technologies are defined by the cooling share table",
            raw.technology
        );
        let regions = parse_region_str(&raw.regions, region_ids)
            .with_context(|| format!("Invalid regions for technology {}", raw.technology))?;

        let technology = Technology {
            id: raw.technology.clone(),
            family: raw.family,
            regions,
        };
        ensure!(
            technologies
                .insert(raw.technology.clone(), Rc::new(technology))
                .is_none(),
            "Duplicate technology ID: {}",
            raw.technology
        );
    }

    Ok(technologies)
}

/// Read raw data for table-driven technologies.
///
/// Rows for technologies which are not requested are ignored. A blank region applies to all
/// regions.
pub fn read_technology_data(
    model_dir: &Path,
    technologies: &TechnologyMap,
    region_ids: &IndexSet<RegionID>,
) -> Result<TechnologyDataMap> {
    let file_path = model_dir.join(TECHNOLOGY_DATA_FILE_NAME);
    let data_csv = read_csv(&file_path)?;
    read_technology_data_from_iter(data_csv, technologies, region_ids)
        .with_context(|| input_err_msg(&file_path))
}

fn read_technology_data_from_iter<I>(
    iter: I,
    technologies: &TechnologyMap,
    region_ids: &IndexSet<RegionID>,
) -> Result<TechnologyDataMap>
where
    I: Iterator<Item = TechnologyDataRaw>,
{
    let mut map = TechnologyDataMap::default();
    for raw in iter {
        if !technologies.contains_key(&raw.technology) {
            continue;
        }

        let region = match raw.region.as_deref().filter(|r| !r.is_empty()) {
            None => None,
            Some(region) => Some(
                region_ids
                    .get(region)
                    .cloned()
                    .with_context(|| format!("Invalid region: {region}"))?,
            ),
        };
        let technology = raw.technology.clone();
        let data = technology_data_from_raw(raw)
            .with_context(|| format!("Invalid data for technology {technology}"))?;
        ensure!(
            map.insert(technology.clone(), region, data).is_none(),
            "Duplicate data for technology {technology}"
        );
    }

    Ok(map)
}

fn technology_data_from_raw(raw: TechnologyDataRaw) -> Result<TechnologyData> {
    let input = flow_spec(raw.input_commodity, raw.input_level, raw.input_value, "input")?;
    let output = flow_spec(raw.output_commodity, raw.output_level, raw.output_value, "output")?;
    if let Some(input) = &input {
        ensure!(
            input.commodity.as_str() != ELECTRICITY || raw.electricity_kwh_per_m3.is_none(),
            "Electricity must be given either as the input commodity or as electricity use"
        );
    }

    for (what, value) in [
        ("electricity_kwh_per_m3", raw.electricity_kwh_per_m3),
        ("inv_cost_usd_per_m3_per_day", raw.inv_cost_usd_per_m3_per_day),
        ("fix_cost_usd_per_m3_per_day", raw.fix_cost_usd_per_m3_per_day),
        ("var_cost_usd_per_m3", raw.var_cost_usd_per_m3),
    ] {
        if let Some(value) = value {
            check_non_negative(what, value)?;
        }
    }
    if let Some(capacity_factor) = raw.capacity_factor {
        ensure!(
            capacity_factor > 0.0 && capacity_factor <= 1.0,
            "capacity_factor must be in the range (0, 1]"
        );
    }
    if let Some(lifetime) = raw.technical_lifetime {
        ensure!(lifetime > 0, "technical_lifetime must be greater than zero");
    }

    Ok(TechnologyData {
        input,
        output,
        electricity_kwh_per_m3: raw.electricity_kwh_per_m3,
        inv_cost_usd_per_m3_per_day: raw.inv_cost_usd_per_m3_per_day,
        fix_cost_usd_per_m3_per_day: raw.fix_cost_usd_per_m3_per_day,
        var_cost_usd_per_m3: raw.var_cost_usd_per_m3,
        technical_lifetime: raw.technical_lifetime,
        construction_time: raw.construction_time,
        capacity_factor: raw.capacity_factor,
    })
}

fn flow_spec(
    commodity: Option<String>,
    level: Option<String>,
    value: Option<f64>,
    what: &str,
) -> Result<Option<FlowSpec>> {
    let commodity = commodity.filter(|c| !c.is_empty());
    let level = level.filter(|l| !l.is_empty());
    match (commodity, level) {
        (None, None) => {
            ensure!(value.is_none(), "{what}_value given without {what}_commodity");
            Ok(None)
        }
        (Some(commodity), Some(level)) => {
            if let Some(value) = value {
                check_non_negative(&format!("{what}_value"), value)?;
            }
            Ok(Some(FlowSpec {
                commodity: CommodityID::from(commodity),
                level: LevelID::from(level),
                value,
            }))
        }
        _ => bail!("{what}_commodity and {what}_level must be given together"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, region_ids};
    use rstest::rstest;

    fn data_raw(id: &str) -> TechnologyDataRaw {
        TechnologyDataRaw {
            technology: id.into(),
            region: None,
            input_commodity: None,
            input_level: None,
            input_value: None,
            output_commodity: None,
            output_level: None,
            output_value: None,
            electricity_kwh_per_m3: None,
            inv_cost_usd_per_m3_per_day: None,
            fix_cost_usd_per_m3_per_day: None,
            var_cost_usd_per_m3: None,
            technical_lifetime: None,
            construction_time: None,
            capacity_factor: None,
        }
    }

    fn technology_raw(id: &str, family: TechnologyFamily, regions: &str) -> TechnologyRaw {
        TechnologyRaw {
            technology: id.into(),
            family,
            regions: regions.into(),
        }
    }

    #[rstest]
    fn read_technologies_from_iter_works(region_ids: IndexSet<RegionID>) {
        let technologies = read_technologies_from_iter(
            [
                technology_raw("extract_surfacewater", TechnologyFamily::Extraction, "all"),
                technology_raw("desal_membrane", TechnologyFamily::Desalination, "R11_WEU"),
            ]
            .into_iter(),
            &region_ids,
        )
        .unwrap();

        assert_eq!(technologies.len(), 2);
        assert_eq!(technologies["extract_surfacewater"].regions, region_ids);
        assert_eq!(technologies["desal_membrane"].regions.len(), 1);
    }

    #[rstest]
    #[case(
        vec![technology_raw("cool", TechnologyFamily::Cooling, "all")],
        "Technology cool: cooling technologies are defined by the cooling share table"
    )]
    #[case(
        vec![
            technology_raw("a", TechnologyFamily::Storage, "all"),
            technology_raw("a", TechnologyFamily::Storage, "all"),
        ],
        "Duplicate technology ID: a"
    )]
    #[case(
        vec![technology_raw("a", TechnologyFamily::Storage, "R11_NAM")],
        "Invalid regions for technology a"
    )]
    fn read_technologies_from_iter_invalid(
        region_ids: IndexSet<RegionID>,
        #[case] raw: Vec<TechnologyRaw>,
        #[case] msg: &str,
    ) {
        assert_error!(
            read_technologies_from_iter(raw.into_iter(), &region_ids),
            msg
        );
    }

    #[rstest]
    fn read_technology_data_from_iter_works(region_ids: IndexSet<RegionID>) {
        let technologies = read_technologies_from_iter(
            [technology_raw("desal_membrane", TechnologyFamily::Desalination, "all")].into_iter(),
            &region_ids,
        )
        .unwrap();
        let raw = [
            TechnologyDataRaw {
                output_commodity: Some("desalinated_water".into()),
                output_level: Some("water_supply".into()),
                technical_lifetime: Some(20),
                ..data_raw("desal_membrane")
            },
            data_raw("unrequested"),
        ];

        let map =
            read_technology_data_from_iter(raw.into_iter(), &technologies, &region_ids).unwrap();
        let data = map
            .lookup(&"desal_membrane".into(), &"R11_AFR".into())
            .unwrap();
        assert_eq!(data.output.as_ref().unwrap().commodity.as_str(), "desalinated_water");
        assert!(data.input.is_none());
    }

    #[rstest]
    #[case(Some("x"), None, None, "input_commodity and input_level must be given together")]
    #[case(None, None, Some(1.0), "input_value given without input_commodity")]
    #[case(
        Some("x"),
        Some("y"),
        Some(-1.0),
        "input_value must be a finite, non-negative number (got -1)"
    )]
    fn flow_spec_invalid(
        #[case] commodity: Option<&str>,
        #[case] level: Option<&str>,
        #[case] value: Option<f64>,
        #[case] msg: &str,
    ) {
        assert_error!(
            flow_spec(
                commodity.map(str::to_string),
                level.map(str::to_string),
                value,
                "input"
            ),
            msg
        );
    }
}
