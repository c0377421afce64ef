//! The registry of (technology, region) strata skipped for lack of data.
use crate::region::RegionID;
use crate::technology::TechnologyID;
use indexmap::IndexMap;
use serde::Serialize;

/// A skipped stratum and the reason it was skipped
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkipEntry {
    /// The technology
    pub technology: TechnologyID,
    /// The region
    pub region: RegionID,
    /// Why no records were produced
    pub reason: String,
}

/// Skipped strata, in the order in which they were encountered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkipRegistry(IndexMap<(TechnologyID, RegionID), String>);

impl SkipRegistry {
    /// Record a skipped stratum. Only the first reason given for a stratum is kept.
    pub fn record(&mut self, technology: &TechnologyID, region: &RegionID, reason: &str) {
        self.0
            .entry((technology.clone(), region.clone()))
            .or_insert_with(|| reason.to_string());
    }

    /// Iterate over the skipped strata
    pub fn iter(&self) -> impl Iterator<Item = SkipEntry> + '_ {
        self.0
            .iter()
            .map(|((technology, region), reason)| SkipEntry {
                technology: technology.clone(),
                region: region.clone(),
                reason: reason.clone(),
            })
    }

    /// Number of skipped strata
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was skipped
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_first_reason() {
        let mut registry = SkipRegistry::default();
        let technology = "desal_membrane".into();
        let region = "R11_AFR".into();
        registry.record(&technology, &region, "no data");
        registry.record(&technology, &region, "something else");

        assert_eq!(
            registry.iter().collect::<Vec<_>>(),
            vec![SkipEntry {
                technology,
                region,
                reason: "no data".into(),
            }]
        );
    }
}
