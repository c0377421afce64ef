//! Regions are the spatial units for which demand and technology parameters are defined.
use crate::id::define_id_type;
use anyhow::{Context, Result, ensure};
use indexmap::IndexSet;
use itertools::Itertools;

define_id_type! {RegionID}

/// Parse a string of regions separated by semicolons into a set of region IDs.
///
/// The string can be either "all" (case-insensitive), a single region, or a semicolon-separated
/// list of regions (e.g. "R11_AFR;R11_CPA" or "R11_AFR; R11_CPA").
///
/// # Arguments
///
/// - `s` - Input string to parse
/// - `region_ids` - All possible region IDs
///
/// # Returns
///
/// An [`IndexSet`] of region IDs or an error.
pub fn parse_region_str(s: &str, region_ids: &IndexSet<RegionID>) -> Result<IndexSet<RegionID>> {
    let s = s.trim();
    ensure!(!s.is_empty(), "No regions provided");

    if s.eq_ignore_ascii_case("all") {
        return Ok(region_ids.clone());
    }

    let regions: Vec<RegionID> = s
        .split(';')
        .map(|r| {
            region_ids
                .get(r.trim())
                .cloned()
                .with_context(|| format!("Invalid region: {r}"))
        })
        .try_collect()?;

    let count = regions.len();
    let regions: IndexSet<_> = regions.into_iter().collect();
    ensure!(regions.len() == count, "Duplicate regions in {s}");

    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, region_ids};
    use rstest::rstest;

    #[rstest]
    fn parse_region_str_all(region_ids: IndexSet<RegionID>) {
        assert_eq!(parse_region_str("ALL", &region_ids).unwrap(), region_ids);
        assert_eq!(parse_region_str(" all ", &region_ids).unwrap(), region_ids);
    }

    #[rstest]
    fn parse_region_str_list(region_ids: IndexSet<RegionID>) {
        let regions = parse_region_str("R11_WEU; R11_AFR", &region_ids).unwrap();
        assert_eq!(
            regions.into_iter().collect_vec(),
            vec![RegionID::from("R11_WEU"), RegionID::from("R11_AFR")]
        );
    }

    #[rstest]
    #[case("", "No regions provided")]
    #[case("R11_NAM", "Invalid region: R11_NAM")]
    #[case("R11_AFR;R11_AFR", "Duplicate regions in R11_AFR;R11_AFR")]
    fn parse_region_str_invalid(
        region_ids: IndexSet<RegionID>,
        #[case] input: &str,
        #[case] msg: &str,
    ) {
        assert_error!(parse_region_str(input, &region_ids), msg);
    }
}
