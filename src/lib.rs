//! Water-sector parameterisation for integrated-assessment energy-system scenarios.
//!
//! Raw demand, access-rate and techno-economic tables are harmonised into complete trajectories
//! and technology coefficients, which are assembled into a single parameter set and written to a
//! scenario store.
#![warn(missing_docs)]
use std::env;
use std::path::PathBuf;

pub mod assemble;
pub mod cli;
pub mod commodity;
pub mod cooling;
pub mod demand;
pub mod demo;
pub mod error;
pub mod historical;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod output;
pub mod parameter;
pub mod patch;
pub mod rate;
pub mod region;
pub mod series;
pub mod settings;
pub mod store;
pub mod technology;
pub mod time_slice;
pub mod units;
pub mod year;

#[cfg(test)]
mod fixture;

/// Get the directory in which program settings are stored.
///
/// Falls back to the current directory if the platform has no config directory.
pub fn get_nexus_water_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        return PathBuf::from(".");
    };
    config_dir.push("nexus-water");

    config_dir
}

/// Whether the user has asked for default settings to be used instead of the settings file
pub fn use_default_settings() -> bool {
    env::var("NEXUS_WATER_USE_DEFAULT_SETTINGS").is_ok_and(|value| !value.is_empty())
}
