//! The `metadata.toml` file recording how and where a parameter set was built.
use anyhow::{Context, Result};
use chrono::Local;
use platform_info::{PlatformInfo, PlatformInfoAPI, UNameAPI};
use serde::Serialize;
use std::fs;
use std::path::Path;

const METADATA_FILE_NAME: &str = "metadata.toml";

/// Constants generated by the build script
#[allow(clippy::doc_markdown)]
#[allow(clippy::needless_raw_strings)]
mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

#[derive(Serialize)]
struct Metadata<'a> {
    run: RunMetadata<'a>,
    program: ProgramMetadata,
    platform: PlatformMetadata,
}

/// The model and the time at which it was assembled
#[derive(Serialize)]
struct RunMetadata<'a> {
    model_path: &'a Path,
    started: String,
}

/// The build of the program which produced the output
#[derive(Serialize)]
struct ProgramMetadata {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    is_debug: bool,
    rustc_version: &'static str,
    build_time_utc: &'static str,
    /// Short commit hash with a `-dirty` suffix for uncommitted changes, or `unknown`
    git_commit_hash: String,
}

impl ProgramMetadata {
    fn from_build() -> Self {
        let git_commit_hash = match built_info::GIT_COMMIT_HASH_SHORT {
            Some(hash) if built_info::GIT_DIRTY == Some(true) => format!("{hash}-dirty"),
            Some(hash) => hash.to_string(),
            None => "unknown".to_string(),
        };

        Self {
            name: built_info::PKG_NAME,
            version: built_info::PKG_VERSION,
            target: built_info::TARGET,
            is_debug: built_info::DEBUG,
            rustc_version: built_info::RUSTC_VERSION,
            build_time_utc: built_info::BUILT_TIME_UTC,
            git_commit_hash,
        }
    }
}

/// The host, as reported by `uname`
#[derive(Serialize)]
struct PlatformMetadata {
    sysname: String,
    release: String,
    version: String,
    machine: String,
    osname: String,
}

impl PlatformMetadata {
    fn from_host() -> Result<Self> {
        let info = PlatformInfo::new()
            .map_err(|err| anyhow::anyhow!("{err}"))
            .context("Unable to determine platform info")?;

        Ok(Self {
            sysname: info.sysname().to_string_lossy().into(),
            release: info.release().to_string_lossy().into(),
            version: info.version().to_string_lossy().into(),
            machine: info.machine().to_string_lossy().into(),
            osname: info.osname().to_string_lossy().into(),
        })
    }
}

/// Write `metadata.toml` to the output directory
pub fn write_metadata(output_path: &Path, model_path: &Path) -> Result<()> {
    let metadata = Metadata {
        run: RunMetadata {
            model_path,
            started: Local::now().to_rfc2822(),
        },
        program: ProgramMetadata::from_build(),
        platform: PlatformMetadata::from_host()?,
    };
    fs::write(
        output_path.join(METADATA_FILE_NAME),
        toml::to_string(&metadata)?,
    )?;

    Ok(())
}
