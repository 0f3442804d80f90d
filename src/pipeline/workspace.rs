//! Temporary working directory for filtered captures and tool output.

use crate::scanner::CaptureFile;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

const FILTERED_DIR: &str = "filtered";
const DATA_DIR: &str = "data";

/// Working directory of one run, removed on drop unless kept.
pub struct Workspace {
    temp: TempDir,
    filtered: PathBuf,
    data: PathBuf,
}

impl Workspace {
    /// Create the directory tree, inside `parent` if given.
    ///
    /// Any failure here is fatal to the run.
    pub fn create(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("captally-");

        let temp = match parent {
            Some(parent) => builder.tempdir_in(parent).with_context(|| {
                format!("Failed to create working directory in {}", parent.display())
            })?,
            None => builder
                .tempdir()
                .context("Failed to create temporary working directory")?,
        };

        let filtered = temp.path().join(FILTERED_DIR);
        let data = temp.path().join(DATA_DIR);
        for dir in [&filtered, &data] {
            std::fs::create_dir(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        debug!("Working directory: {}", temp.path().display());
        Ok(Self {
            temp,
            filtered,
            data,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Where the filtered copy of `capture` is written.
    pub fn filtered_path(&self, capture: &CaptureFile) -> PathBuf {
        self.filtered.join(&capture.name)
    }

    /// Where the extraction tool writes its text for `capture`.
    pub fn data_path(&self, capture: &CaptureFile) -> PathBuf {
        self.data.join(format!("{}.txt", capture.name))
    }

    /// Remove the directory, or keep it and return its path.
    pub fn finish(self, keep: bool) -> Result<Option<PathBuf>> {
        if keep {
            let path = self.temp.keep();
            info!("Keeping working directory {}", path.display());
            Ok(Some(path))
        } else {
            let path = self.temp.path().to_path_buf();
            self.temp
                .close()
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            Ok(None)
        }
    }
}
