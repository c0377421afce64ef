//! Demo models bundled with the program.
use anyhow::{Context, Result, bail};
use include_dir::{Dir, DirEntry, include_dir};
use std::fs;
use std::path::Path;

/// The directory containing the demo models
static DEMOS_DIR: Dir<'_> = include_dir!("demos");

/// Get the names of all demos
pub fn get_demo_names() -> impl Iterator<Item = &'static str> {
    DEMOS_DIR
        .dirs()
        .filter_map(|dir| dir.path().file_name()?.to_str())
}

/// A bundled demo model
pub struct Demo(&'static Dir<'static>);

impl Demo {
    /// Get the demo with the specified name
    pub fn from_name(name: &str) -> Result<Self> {
        let dir = DEMOS_DIR
            .get_dir(name)
            .with_context(|| format!("Demo '{name}' not found"))?;

        Ok(Self(dir))
    }

    /// Get the contents of the readme file for this demo
    pub fn get_readme(&self) -> Result<&'static str> {
        self.0
            .get_file(self.0.path().join("README.txt"))
            .context("Missing README.txt")?
            .contents_utf8()
            .context("README.txt is not UTF-8 encoded")
    }

    /// Extract this demo into a new directory
    pub fn extract(&self, new_path: &Path) -> Result<()> {
        fs::create_dir(new_path)
            .with_context(|| format!("Could not create directory {}", new_path.display()))?;
        for entry in self.0.entries() {
            let DirEntry::File(file) = entry else {
                bail!("Subdirectories in demos are not supported");
            };
            let file_name = file
                .path()
                .file_name()
                .context("Demo file has no name")?;
            fs::write(new_path.join(file_name), file.contents())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn all_demos_have_readme() {
        for name in get_demo_names() {
            let readme = Demo::from_name(name).unwrap().get_readme().unwrap();
            assert!(!readme.trim().is_empty(), "Empty README.txt for {name}");
        }
    }

    #[test]
    fn extract_demo() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("simple");
        Demo::from_name("simple").unwrap().extract(&dest).unwrap();
        assert!(dest.join("model.toml").is_file());
    }

    #[test]
    fn unknown_demo() {
        assert!(Demo::from_name("missing").is_err());
    }
}
