//! Fixtures for tests
use crate::assemble::{AssembleOutcome, assemble};
use crate::input::load_model;
use crate::model::Model;
use crate::patch::{ModelPatch, PatchedModel, TablePatch};
use crate::region::RegionID;
use indexmap::IndexSet;
use rstest::fixture;

/// Path to the simple demo model
pub const DEMO_MODEL_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/simple");

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        )
    };
}
pub(crate) use assert_error;

/// Build a patched copy of the simple demo model in a temporary directory.
///
/// Panics if the patches cannot be applied.
pub(crate) fn build_patched_demo(tables: Vec<TablePatch>, toml: Option<&str>) -> PatchedModel {
    let mut patch = ModelPatch::from_demo("simple").with_tables(tables);
    if let Some(toml) = toml {
        patch = patch.with_toml(toml).unwrap();
    }

    patch.build_to_tempdir().unwrap()
}

/// Load the simple demo model after applying table patches
macro_rules! patch_and_load_demo {
    ($tables:expr) => {{
        let model = crate::fixture::build_patched_demo($tables, None);
        crate::input::load_model(model.path())
    }};
}
pub(crate) use patch_and_load_demo;

/// Check that loading the patched demo model fails with the given (innermost context) message
macro_rules! assert_load_fails_with_demo {
    ($tables:expr, $expected_msg:expr) => {
        let result = crate::fixture::patch_and_load_demo!($tables);
        let msg = result.unwrap_err().chain().nth(1).unwrap().to_string();
        assert_eq!(msg, $expected_msg);
    };
}
pub(crate) use assert_load_fails_with_demo;

/// Load and assemble the patched demo model
pub(crate) fn assemble_patched_demo(
    tables: Vec<TablePatch>,
    toml: Option<&str>,
) -> AssembleOutcome {
    let model = build_patched_demo(tables, toml);
    assemble(&load_model(model.path()).unwrap()).unwrap()
}

#[fixture]
pub fn region_ids() -> IndexSet<RegionID> {
    ["R11_AFR".into(), "R11_WEU".into()].into_iter().collect()
}

#[fixture]
pub fn demo_model() -> Model {
    load_model(DEMO_MODEL_DIR).unwrap()
}

#[fixture]
pub fn demo_outcome(demo_model: Model) -> AssembleOutcome {
    assemble(&demo_model).unwrap()
}
