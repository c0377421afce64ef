//! Program settings, read from `settings.toml` in the user's config directory.
use crate::input::read_toml;
use crate::log::DEFAULT_LOG_LEVEL;
use crate::{get_nexus_water_config_dir, use_default_settings};
use anyhow::{Context, Result};
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

const DEFAULT_SETTINGS_FILE_HEADER: &str = concat!(
    "# Program settings for nexus-water v",
    env!("CARGO_PKG_VERSION"),
    ".
#
# Every option is shown below with its default value, commented out. Uncomment an option to
# change it.
#
# To print these defaults again, run:
# \tnexus-water settings show-default
"
);

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> PathBuf {
    get_nexus_water_config_dir().join(SETTINGS_FILE_NAME)
}

/// Program settings from config file
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// The default program log level
    pub log_level: String,
    /// Whether to overwrite output folders and scenarios by default
    pub overwrite: bool,
    /// Folder in which run reports are saved, one subfolder per model
    pub results_root: PathBuf,
    /// Root folder of the scenario store
    pub store_root: PathBuf,
    /// How many times to retry committing to the scenario store after a failure
    pub store_retries: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            overwrite: false,
            results_root: PathBuf::from("nexus_water_results"),
            store_root: PathBuf::from("nexus_water_scenarios"),
            store_retries: 2,
        }
    }
}

impl Settings {
    /// Load settings from the settings file.
    ///
    /// Defaults are used if the file does not exist or `NEXUS_WATER_USE_DEFAULT_SETTINGS` is set.
    pub fn load() -> Result<Settings> {
        if use_default_settings() {
            return Ok(Settings::default());
        }

        Self::load_from_path(&get_settings_file_path())
    }

    fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        read_toml(file_path)
    }

    /// The contents of the default settings file, with every option commented out
    pub fn default_file_contents() -> Result<String> {
        let settings_raw =
            toml::to_string(&Settings::default()).context("Could not convert settings to TOML")?;

        let mut out = DEFAULT_SETTINGS_FILE_HEADER.to_string();
        for line in settings_raw.lines() {
            let Some((field, _)) = line.split_once('=') else {
                continue;
            };
            let docs = Settings::get_field_docs(field.trim())
                .with_context(|| format!("Missing doc comment for setting {}", field.trim()))?;
            for doc_line in docs.lines() {
                write!(&mut out, "\n# # {}\n", doc_line.trim())?;
            }
            writeln!(&mut out, "# {}", line.trim())?;
        }

        Ok(out)
    }
}
