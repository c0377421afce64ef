//! Derive modified copies of a model directory by editing its tables and `model.toml`.
//!
//! Tests use this to build broken or adjusted variants of the bundled demo models without keeping
//! a copy of every variant on disk.
use crate::demo::Demo;
use anyhow::{Context, Result, ensure};
use csv::{ReaderBuilder, Trim, Writer};
use indexmap::IndexSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const MODEL_FILE_NAME: &str = "model.toml";

/// A row of a CSV table, with fields trimmed
type Row = Vec<String>;

/// Where the unpatched model comes from
#[derive(Debug, Clone)]
enum PatchBase {
    Directory(PathBuf),
    Demo(String),
}

/// A set of edits to apply to a base model
#[derive(Debug)]
pub struct ModelPatch {
    base: PatchBase,
    tables: Vec<TablePatch>,
    toml_patch: Option<toml::Table>,
}

/// A patched model in a temporary directory, deleted when dropped
pub struct PatchedModel {
    _dir: TempDir,
    path: PathBuf,
}

impl PatchedModel {
    /// The model directory
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModelPatch {
    /// Patch the model in `base_dir`
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base: PatchBase::Directory(base_dir.into()),
            tables: Vec::new(),
            toml_patch: None,
        }
    }

    /// Patch one of the bundled demo models
    pub fn from_demo(name: &str) -> Self {
        Self {
            base: PatchBase::Demo(name.to_string()),
            tables: Vec::new(),
            toml_patch: None,
        }
    }

    /// Add an edit to one of the model's tables
    pub fn with_table(mut self, patch: TablePatch) -> Self {
        self.tables.push(patch);
        self
    }

    /// Add edits to several tables
    pub fn with_tables<I>(mut self, patches: I) -> Self
    where
        I: IntoIterator<Item = TablePatch>,
    {
        self.tables.extend(patches);
        self
    }

    /// Replace entries of `model.toml`.
    ///
    /// Tables in the patch are merged into the base model's tables key by key; any other value
    /// replaces the base value.
    pub fn with_toml(mut self, patch: &str) -> Result<Self> {
        ensure!(
            self.toml_patch.is_none(),
            "A TOML patch has already been given"
        );
        let patch: toml::Table = toml::from_str(patch).context("Invalid TOML patch")?;
        self.toml_patch = Some(patch);
        Ok(self)
    }

    /// Write the patched model to `out_dir`, which must not exist yet
    pub fn build(&self, out_dir: &Path) -> Result<()> {
        match &self.base {
            PatchBase::Demo(name) => Demo::from_name(name)?.extract(out_dir)?,
            PatchBase::Directory(base_dir) => copy_model_files(base_dir, out_dir)?,
        }

        if let Some(patch) = &self.toml_patch {
            let file_path = out_dir.join(MODEL_FILE_NAME);
            let contents = fs::read_to_string(&file_path)
                .with_context(|| format!("Could not read {}", file_path.display()))?;
            fs::write(&file_path, patch_toml(&contents, patch)?)?;
        }

        for table in &self.tables {
            let file_path = out_dir.join(&table.file_name);
            ensure!(
                file_path.is_file(),
                "Table to patch does not exist: {}",
                table.file_name
            );
            let contents = fs::read_to_string(&file_path)?;
            let patched = table
                .apply(&contents)
                .with_context(|| format!("Could not patch {}", table.file_name))?;
            fs::write(&file_path, patched)?;
        }

        Ok(())
    }

    /// Write the patched model to a new temporary directory
    pub fn build_to_tempdir(&self) -> Result<PatchedModel> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("model");
        self.build(&path)?;

        Ok(PatchedModel { _dir: dir, path })
    }
}

/// Copy the top-level `model.toml` and CSV files of a model
fn copy_model_files(base_dir: &Path, out_dir: &Path) -> Result<()> {
    fs::create_dir(out_dir)
        .with_context(|| format!("Could not create directory {}", out_dir.display()))?;
    for entry in fs::read_dir(base_dir)? {
        let src = entry?.path();
        let is_model_file = src.file_name().is_some_and(|name| name == MODEL_FILE_NAME)
            || src
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if src.is_file() && is_model_file {
            let file_name = src.file_name().context("Model file has no name")?;
            fs::copy(&src, out_dir.join(file_name))?;
        }
    }

    Ok(())
}

/// Apply a TOML patch to the contents of `model.toml`
fn patch_toml(base: &str, patch: &toml::Table) -> Result<String> {
    let mut table: toml::Table = toml::from_str(base).context("Invalid base model TOML")?;
    merge_tables(&mut table, patch);
    Ok(toml::to_string_pretty(&table)?)
}

fn merge_tables(base: &mut toml::Table, patch: &toml::Table) {
    for (key, value) in patch {
        match (base.get_mut(key), value) {
            (Some(toml::Value::Table(base)), toml::Value::Table(patch)) => {
                merge_tables(base, patch);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

fn split_row(row: &str) -> Row {
    row.split(',').map(|field| field.trim().to_string()).collect()
}

/// Rows to remove from and append to one CSV table
#[derive(Debug)]
pub struct TablePatch {
    file_name: String,
    header: Option<Row>,
    remove: IndexSet<Row>,
    append: IndexSet<Row>,
}

impl TablePatch {
    /// An empty patch for the named file (e.g. `technologies.csv`)
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            header: None,
            remove: IndexSet::new(),
            append: IndexSet::new(),
        }
    }

    /// Require the table to have this (comma-separated) header
    pub fn expect_header(mut self, header: &str) -> Self {
        self.header = Some(split_row(header));
        self
    }

    /// Append a (comma-separated) row
    pub fn append_row(mut self, row: &str) -> Self {
        self.append.insert(split_row(row));
        self
    }

    /// Remove a (comma-separated) row, which must be present
    pub fn remove_row(mut self, row: &str) -> Self {
        self.remove.insert(split_row(row));
        self
    }

    /// Apply the patch to the contents of a CSV file.
    ///
    /// Remaining rows keep their order and appended rows go at the end.
    pub fn apply(&self, base: &str) -> Result<String> {
        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .from_reader(base.as_bytes());
        let header: Row = reader.headers()?.iter().map(ToString::to_string).collect();
        if let Some(expected) = &self.header {
            ensure!(
                header == *expected,
                "Expected header [{}], found [{}]",
                expected.join(", "),
                header.join(", ")
            );
        }

        let mut rows = IndexSet::new();
        for record in reader.records() {
            let row: Row = record?.iter().map(ToString::to_string).collect();
            ensure!(rows.insert(row.clone()), "Duplicate row: {row:?}");
        }

        for row in &self.remove {
            ensure!(!self.append.contains(row), "Row both removed and appended: {row:?}");
            ensure!(rows.shift_remove(row), "Row to remove not found: {row:?}");
        }
        for row in &self.append {
            ensure!(rows.insert(row.clone()), "Row to append already present: {row:?}");
        }

        let mut writer = Writer::from_writer(Vec::new());
        writer.write_record(&header)?;
        for row in &rows {
            writer.write_record(row)?;
        }

        Ok(String::from_utf8(writer.into_inner()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;

    const TABLE: &str = "technology,family,regions\na,extraction,all\nb,storage,R11_AFR\n";

    #[test]
    fn table_patch_removes_and_appends() {
        let patch = TablePatch::new("technologies.csv")
            .expect_header("technology, family, regions")
            .remove_row("a,extraction,all")
            .append_row("c, wastewater, all");

        assert_eq!(
            patch.apply(TABLE).unwrap(),
            "technology,family,regions\nb,storage,R11_AFR\nc,wastewater,all\n"
        );
    }

    #[test]
    fn table_patch_wrong_header() {
        let patch = TablePatch::new("technologies.csv").expect_header("technology,regions");
        assert_error!(
            patch.apply(TABLE),
            "Expected header [technology, regions], found [technology, family, regions]"
        );
    }

    #[test]
    fn table_patch_missing_row() {
        let patch = TablePatch::new("technologies.csv").remove_row("z,storage,all");
        assert_error!(
            patch.apply(TABLE),
            "Row to remove not found: [\"z\", \"storage\", \"all\"]"
        );
    }

    #[test]
    fn toml_tables_are_merged() {
        let base = "years = [2010, 2020]\n[time_slices]\nsummer = 0.5\nwinter = 0.5\n";
        let patch: toml::Table = toml::from_str("years = [2020]\n[time_slices]\nwinter = 0.4\n")
            .unwrap();
        let merged: toml::Table = toml::from_str(&patch_toml(base, &patch).unwrap()).unwrap();

        assert_eq!(merged["years"].as_array().unwrap().len(), 1);
        assert_eq!(merged["time_slices"]["summer"].as_float(), Some(0.5));
        assert_eq!(merged["time_slices"]["winter"].as_float(), Some(0.4));
    }

    #[test]
    fn second_toml_patch_is_rejected() {
        let patch = ModelPatch::from_demo("simple")
            .with_toml("rounding_digits = 4")
            .unwrap();
        assert_error!(
            patch.with_toml("rounding_digits = 5"),
            "A TOML patch has already been given"
        );
    }

    #[test]
    fn build_demo_patch() {
        let model = ModelPatch::from_demo("simple")
            .with_table(
                TablePatch::new("technologies.csv").remove_row("dam_storage,storage,R11_AFR"),
            )
            .build_to_tempdir()
            .unwrap();

        let technologies = fs::read_to_string(model.path().join("technologies.csv")).unwrap();
        assert!(!technologies.contains("dam_storage"));
        assert!(model.path().join("model.toml").is_file());
    }
}
