//! The CLI commands for the bundled demo models.
use super::{BuildOpts, handle_build_command};
use crate::demo::{Demo, get_demo_names};
use crate::settings::Settings;
use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The available subcommands for managing demo models.
#[derive(Subcommand)]
pub enum DemoSubcommands {
    /// List available demos.
    List,
    /// Provide information about the specified demo.
    Info {
        /// The name of the demo.
        name: String,
    },
    /// Extract a demo model to a new directory.
    Extract {
        /// The name of the demo to extract.
        name: String,
        /// The destination folder for the demo.
        new_path: Option<PathBuf>,
    },
    /// Build the parameter set for a demo.
    Build {
        /// The name of the demo to build.
        name: String,
        /// Other build options
        #[command(flatten)]
        opts: BuildOpts,
    },
}

impl DemoSubcommands {
    /// Execute the supplied demo subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::List => {
                for name in get_demo_names() {
                    println!("{name}");
                }
                Ok(())
            }
            Self::Info { name } => {
                print!("{}", Demo::from_name(&name)?.get_readme()?);
                Ok(())
            }
            Self::Extract { name, new_path } => {
                let dest = new_path.unwrap_or_else(|| PathBuf::from(&name));
                Demo::from_name(&name)?.extract(&dest)
            }
            Self::Build { name, opts } => handle_demo_build_command(&name, &opts, None),
        }
    }
}

/// Handle the `demo build` command.
///
/// The demo is extracted to a temporary directory named after it, so the default output folder
/// and scenario are named after the demo too.
pub fn handle_demo_build_command(
    name: &str,
    opts: &BuildOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let demo = Demo::from_name(name)?;
    let temp_dir = TempDir::new().context("Failed to create temporary directory")?;
    let model_path: &Path = &temp_dir.path().join(name);
    demo.extract(model_path)?;
    handle_build_command(model_path, opts, settings)
}
