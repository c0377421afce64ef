//! Code for reading raw sectoral demand tables.
use super::{WideRow, input_err_msg, read_csv, read_wide_csv};
use crate::demand::{DemandKind, DemandSector, RawDemandMap};
use crate::id::IDCollection;
use crate::region::RegionID;
use anyhow::{Context, Result, ensure};
use indexmap::IndexSet;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const DEMANDS_FILE_NAME: &str = "demands.csv";

/// An entry in the demand index, pointing at the file holding one sector's data
#[derive(Debug, Deserialize, PartialEq)]
struct DemandFileRaw {
    sector: DemandSector,
    kind: DemandKind,
    file: PathBuf,
}

/// Read the raw demand tables listed in `demands.csv`.
///
/// Each listed file has a `year` column followed by one column per region, with values in
/// mcm/year. Blank cells are treated as missing observations.
pub fn read_raw_demand(
    model_dir: &Path,
    region_ids: &IndexSet<RegionID>,
) -> Result<RawDemandMap> {
    let file_path = model_dir.join(DEMANDS_FILE_NAME);
    let mut seen = HashSet::new();
    let mut map = RawDemandMap::new();
    for entry in read_csv::<DemandFileRaw>(&file_path)? {
        ensure!(
            seen.insert((entry.sector, entry.kind)),
            "{}: more than one file given for {} {:?}",
            input_err_msg(&file_path),
            entry.sector,
            entry.kind
        );

        let data_path = model_dir.join(&entry.file);
        let rows = read_wide_csv(&data_path, &["year"])?;
        add_demand_rows(&mut map, entry.sector, entry.kind, rows, region_ids)
            .with_context(|| input_err_msg(&data_path))?;
    }

    Ok(map)
}

fn add_demand_rows(
    map: &mut RawDemandMap,
    sector: DemandSector,
    kind: DemandKind,
    rows: Vec<WideRow>,
    region_ids: &IndexSet<RegionID>,
) -> Result<()> {
    for row in rows {
        let year: u32 = row.keys[0]
            .parse()
            .with_context(|| format!("Invalid year: {}", row.keys[0]))?;
        for (region, value) in row.values {
            let region = region_ids.get_id(&region)?;
            let Some(value) = value else {
                continue;
            };
            ensure!(value.is_finite(), "Non-finite demand for {region} in {year}");
            let existing = map
                .entry((region.clone(), sector, kind))
                .or_default()
                .insert(year, value);
            ensure!(existing.is_none(), "Duplicate year {year}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, region_ids};
    use indexmap::IndexMap;
    use rstest::rstest;
    use std::fs;
    use tempfile::tempdir;

    fn row(year: &str, afr: Option<f64>) -> WideRow {
        WideRow {
            keys: vec![year.into()],
            values: IndexMap::from([("R11_AFR".to_string(), afr)]),
        }
    }

    #[rstest]
    fn add_demand_rows_works(region_ids: IndexSet<RegionID>) {
        let mut map = RawDemandMap::new();
        let rows = vec![row("2010", Some(100.0)), row("2020", None)];
        add_demand_rows(
            &mut map,
            DemandSector::Urban,
            DemandKind::Withdrawal,
            rows,
            &region_ids,
        )
        .unwrap();
        let series = &map[&("R11_AFR".into(), DemandSector::Urban, DemandKind::Withdrawal)];
        assert_eq!(series.len(), 1);
        assert_eq!(series[&2010], 100.0);
    }

    #[rstest]
    fn add_demand_rows_invalid(region_ids: IndexSet<RegionID>) {
        let mut map = RawDemandMap::new();
        let rows = vec![row("twenty", Some(1.0))];
        assert_error!(
            add_demand_rows(
                &mut map,
                DemandSector::Rural,
                DemandKind::ReturnFlow,
                rows,
                &region_ids
            ),
            "Invalid year: twenty"
        );

        let rows = vec![row("2010", Some(1.0)), row("2010", Some(2.0))];
        assert_error!(
            add_demand_rows(
                &mut map,
                DemandSector::Rural,
                DemandKind::ReturnFlow,
                rows,
                &region_ids
            ),
            "Duplicate year 2010"
        );
    }

    #[rstest]
    fn read_raw_demand_works(region_ids: IndexSet<RegionID>) {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(DEMANDS_FILE_NAME),
            "sector,kind,file\nindustry,withdrawal,industry_withdrawal.csv\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("industry_withdrawal.csv"),
            "year,R11_AFR,R11_WEU\n2010,50,80\n2020,60,\n",
        )
        .unwrap();

        let map = read_raw_demand(dir.path(), &region_ids).unwrap();
        assert_eq!(map.len(), 2);
        let weu = &map[&("R11_WEU".into(), DemandSector::Industry, DemandKind::Withdrawal)];
        assert_eq!(weu.len(), 1);
    }
}
