//! Common string identifiers for regions, technologies, commodities and so on.
use anyhow::{Context, Result};
use indexmap::IndexSet;

/// Define a new ID type wrapping an `Rc<str>`.
///
/// IDs are cheap to clone and compare by value.
macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(
            Clone, std::hash::Hash, PartialEq, Eq, PartialOrd, Ord, Debug, serde::Serialize,
        )]
        /// An ID type (e.g. `RegionID`, `TechnologyID`, etc.)
        pub struct $name(pub std::rc::Rc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                use serde::de::Error;

                let id: String = serde::Deserialize::deserialize(deserializer)?;
                let id = id.trim();
                if id.is_empty() {
                    return Err(D::Error::custom("IDs cannot be empty"));
                }

                Ok(id.into())
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                $name(std::rc::Rc::from(id))
            }

            /// The ID as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}
pub(crate) use define_id_type;

/// A collection of IDs against which user-supplied strings can be checked
pub trait IDCollection<T> {
    /// Get the ID from the collection matching the given string.
    ///
    /// # Returns
    ///
    /// A copy of the stored ID or an error if it is not in the collection.
    fn get_id(&self, id: &str) -> Result<&T>;
}

impl<T> IDCollection<T> for IndexSet<T>
where
    T: std::borrow::Borrow<str> + std::hash::Hash + Eq,
{
    fn get_id(&self, id: &str) -> Result<&T> {
        self.get(id.trim())
            .with_context(|| format!("Unknown ID {id} found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionID;

    #[test]
    fn id_deserialise_trims() {
        #[derive(serde::Deserialize)]
        struct Record {
            id: RegionID,
        }

        let data = "id\n R11_AFR \n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let record: Record = reader.deserialize().next().unwrap().unwrap();
        assert_eq!(record.id, "R11_AFR".into());
    }

    #[test]
    fn id_deserialise_empty() {
        #[derive(serde::Deserialize)]
        struct Record {
            #[allow(dead_code)]
            id: RegionID,
        }

        let data = "id\n\"\"\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let record: Result<Record, _> = reader.deserialize().next().unwrap();
        assert!(record.is_err());
    }

    #[test]
    fn id_collection_get_id() {
        let ids: IndexSet<RegionID> = ["R11_AFR".into(), "R11_WEU".into()].into_iter().collect();
        assert_eq!(ids.get_id("R11_WEU").unwrap(), &RegionID::from("R11_WEU"));
        assert!(ids.get_id("R11_NAM").is_err());
    }
}
