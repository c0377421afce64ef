//! The module responsible for writing the run report to file.
use crate::assemble::{AssembleOutcome, AssembleSummary};
use crate::parameter::ParameterRow;
use anyhow::{Context, Result, ensure};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub mod metadata;
use metadata::write_metadata;

/// The output file name for parameter records
pub const PARAMETERS_FILE_NAME: &str = "parameters.csv";

/// The output file name for skipped (technology, region) pairs
const SKIPPED_FILE_NAME: &str = "skipped.csv";

/// The output file name for data-quality warnings
const WARNINGS_FILE_NAME: &str = "warnings.csv";

/// The output file name for the run summary
const SUMMARY_FILE_NAME: &str = "summary.toml";

/// The summary file contents
#[derive(Serialize)]
struct SummaryFile<'a> {
    /// Whether the run finished without fatal errors
    success: bool,
    #[serde(flatten)]
    summary: &'a AssembleSummary,
    /// Fatal errors
    errors: &'a [String],
}

/// Get the default output directory for the model
pub fn get_output_dir(model_dir: &Path, results_root: PathBuf) -> Result<PathBuf> {
    // Canonicalise in case the user has specified "."
    let model_dir = model_dir
        .canonicalize()
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    Ok([results_root, model_name.into()].iter().collect())
}

/// Create a new output directory for the model, optionally overwriting existing data.
///
/// # Returns
///
/// True if the output directory already existed and its contents were deleted.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if output_dir.is_dir() {
        if output_dir.read_dir()?.next().is_none() {
            // Folder exists and is empty: nothing to do
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Please delete it or use the \
             --overwrite option."
        );
        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Write the parameter set, skipped strata, warnings and summary of a run.
///
/// # Arguments
///
/// * `output_path` - The output directory (must exist)
/// * `model_path` - Path to the model, recorded in the metadata
/// * `outcome` - The result of the assembly run
pub fn write_report(
    output_path: &Path,
    model_path: &Path,
    outcome: &AssembleOutcome,
) -> Result<()> {
    write_metadata(output_path, model_path).context("Failed to save metadata")?;

    let file_path = output_path.join(PARAMETERS_FILE_NAME);
    write_rows(
        &file_path,
        outcome.parameters.iter().map(|record| ParameterRow::from(&record)),
    )?;

    let file_path = output_path.join(SKIPPED_FILE_NAME);
    write_rows(&file_path, outcome.skipped.iter())?;

    let file_path = output_path.join(WARNINGS_FILE_NAME);
    write_rows(&file_path, outcome.warnings.iter())?;

    let summary = SummaryFile {
        success: outcome.is_success(),
        summary: &outcome.summary,
        errors: &outcome.errors,
    };
    let file_path = output_path.join(SUMMARY_FILE_NAME);
    fs::write(&file_path, toml::to_string(&summary)?)
        .with_context(|| format!("Failed to write {}", file_path.display()))?;

    Ok(())
}

/// Write rows to a CSV file.
///
/// The file is created even if there are no rows.
fn write_rows<T, I>(file_path: &Path, rows: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv::Writer::from_path(file_path)
        .with_context(|| format!("Failed to create {}", file_path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::Assembly;
    use crate::parameter::{ParameterKey, ParameterName};
    use itertools::Itertools;
    use std::fs::File;
    use tempfile::tempdir;

    fn outcome() -> AssembleOutcome {
        let mut assembly = Assembly::new(6);
        assembly
            .parameters
            .add_value(
                ParameterName::TechnicalLifetime,
                ParameterKey::technology(&"R11_AFR".into(), &"desal_membrane".into())
                    .with_vintage(2030),
                20.0,
                "y",
            )
            .unwrap();
        assembly
            .skipped
            .record(&"urban_recycle".into(), &"R11_AFR".into(), "no technology data");
        assembly.warn(None, Some(&"R11_AFR".into()), "No desalination rate".into());
        assembly.finish()
    }

    #[test]
    fn write_report_files() {
        let dir = tempdir().unwrap();
        write_report(dir.path(), Path::new("model"), &outcome()).unwrap();

        let parameters = fs::read_to_string(dir.path().join(PARAMETERS_FILE_NAME)).unwrap();
        let lines = parameters.lines().collect_vec();
        assert_eq!(
            lines,
            [
                "parameter,node,technology,commodity,level,emission,year_vtg,year_act,mode,time,\
                 value,unit",
                "technical_lifetime,R11_AFR,desal_membrane,,,,2030,,,,20.0,y"
            ]
        );

        let skipped = fs::read_to_string(dir.path().join(SKIPPED_FILE_NAME)).unwrap();
        assert!(skipped.contains("urban_recycle,R11_AFR,no technology data"));

        let summary = fs::read_to_string(dir.path().join(SUMMARY_FILE_NAME)).unwrap();
        assert!(summary.contains("success = true"));
        assert!(summary.contains("skipped = 1"));
        assert!(dir.path().join("metadata.toml").is_file());
    }

    #[test]
    fn create_output_directory_new() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("results");
        assert!(!create_output_directory(&output_dir, false).unwrap());
        assert!(output_dir.is_dir());
    }

    #[test]
    fn create_output_directory_existing() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("parameters.csv")).unwrap();

        assert!(create_output_directory(dir.path(), false).is_err());
        assert!(create_output_directory(dir.path(), true).unwrap());
        assert!(dir.path().read_dir().unwrap().next().is_none());
    }
}
