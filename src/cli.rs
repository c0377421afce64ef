//! The command line interface.
use crate::assemble::{AssembleOutcome, assemble};
use crate::input::load_model;
use crate::log;
use crate::output::{create_output_directory, get_output_dir, write_report};
use crate::settings::Settings;
use crate::store::{CsvScenarioStore, ScenarioUrl, write_parameter_set};
use ::log::{info, warn};
use anyhow::{Context, Result, ensure};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod demo;
use demo::DemoSubcommands;

pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for the `build` command
#[derive(Args)]
pub struct BuildOpts {
    /// The scenario to write to, as `<model>/<scenario>` or `file://<path>`
    #[arg(short, long)]
    pub scenario: Option<ScenarioUrl>,
    /// Directory for the run report
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory and scenario if they already exist
    #[arg(long)]
    pub overwrite: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Build the parameter set for a model and write it to the scenario store.
    Build {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Other build options
        #[command(flatten)]
        opts: BuildOpts,
    },
    /// Load and assemble a model without writing anything.
    Validate {
        /// The path to the model directory.
        model_dir: PathBuf,
    },
    /// Manage demo models.
    Demo {
        /// The available subcommands for managing demo models.
        #[command(subcommand)]
        subcommand: DemoSubcommands,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Build { model_dir, opts } => handle_build_command(&model_dir, &opts, None),
            Self::Validate { model_dir } => handle_validate_command(&model_dir, None),
            Self::Demo { subcommand } => subcommand.execute(),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and run the requested command
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ nexus-water --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    if let Some(command) = cli.command {
        command.execute()?;
    } else {
        Cli::command().print_long_help()?;
    }

    Ok(())
}

fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

/// Handle the `build` command.
pub fn handle_build_command(
    model_path: &Path,
    opts: &BuildOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let mut settings = load_settings(settings)?;
    if opts.overwrite {
        settings.overwrite = true;
    }

    let pathbuf: PathBuf;
    let output_path = if let Some(p) = opts.output_dir.as_deref() {
        p
    } else {
        pathbuf = get_output_dir(model_path, settings.results_root.clone())?;
        &pathbuf
    };
    let overwrite =
        create_output_directory(output_path, settings.overwrite).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    log::init(&settings.log_level, Some(output_path)).context("Failed to initialise logging.")?;
    info!("Starting nexus-water v{}", env!("CARGO_PKG_VERSION"));
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    let outcome = load_and_assemble(model_path)?;
    write_report(output_path, model_path, &outcome).context("Failed to write run report.")?;
    info!("Run report saved to: {}", output_path.display());
    ensure!(
        outcome.is_success(),
        "Assembly failed with {} fatal error(s); nothing was written to the scenario store",
        outcome.errors.len()
    );

    let url = match &opts.scenario {
        Some(url) => url.clone(),
        None => ScenarioUrl::for_model_dir(model_path)?,
    };
    let mut store = CsvScenarioStore::open(url.resolve(&settings.store_root))
        .with_context(|| format!("Failed to open scenario {url}"))?;
    ensure!(
        store.is_empty() || settings.overwrite,
        "Scenario {url} already exists. Use the --overwrite option to replace it."
    );
    let message = format!(
        "Built by nexus-water v{} from {}",
        env!("CARGO_PKG_VERSION"),
        model_path.display()
    );
    write_parameter_set(
        &mut store,
        &outcome.parameters,
        &message,
        settings.store_retries,
    )
    .with_context(|| format!("Failed to write to scenario {url}"))?;

    info!("Build complete: {} written to {url}", outcome.summary);

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(model_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;

    // No log files are written for this command
    log::init(&settings.log_level, None).context("Failed to initialise logging.")?;

    let outcome = load_and_assemble(model_path)?;
    ensure!(
        outcome.is_success(),
        "Validation failed with {} fatal error(s)",
        outcome.errors.len()
    );
    info!("Model validation successful!");

    Ok(())
}

/// Load a model, assemble its parameter set and list what was skipped
fn load_and_assemble(model_path: &Path) -> Result<AssembleOutcome> {
    let model = load_model(model_path).context("Failed to load model.")?;
    info!("Loaded model from {}", model_path.display());

    let outcome = assemble(&model).context("Failed to assemble parameter set.")?;
    for entry in outcome.skipped.iter() {
        info!(
            "Skipped {} in {}: {}",
            entry.technology, entry.region, entry.reason
        );
    }
    info!("Summary: {}", outcome.summary);

    Ok(outcome)
}
