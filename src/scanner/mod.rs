//! Capture file discovery.
//!
//! Only the regular files directly inside the input folder are considered;
//! sub-folders are never entered.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Configuration for file scanning.
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// File extensions to include (e.g., ["pcap", "dump"]). Empty means all.
    pub extensions: Vec<String>,
    /// File names to skip.
    pub excludes: Vec<String>,
    /// Maximum number of files to return
    pub max_files: Option<usize>,
}

impl From<&crate::config::ScannerConfig> for ScanConfig {
    fn from(config: &crate::config::ScannerConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            excludes: config.excludes.clone(),
            max_files: config.max_files,
        }
    }
}

/// A capture file selected for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFile {
    /// File name inside the input folder
    pub name: String,
    /// Full path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// Finds capture files in a folder.
pub struct CaptureScanner {
    config: ScanConfig,
    root: PathBuf,
}

impl CaptureScanner {
    pub fn new(root: PathBuf, config: ScanConfig) -> Self {
        Self { config, root }
    }

    /// All matching files, sorted by name.
    pub fn scan(&self) -> Result<Vec<CaptureFile>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(e)
                        .with_context(|| format!("Failed to read folder {}", self.root.display()));
                }
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", self.root.display(), e);
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().to_string();

            if !entry.file_type().is_file() {
                debug!("Skipping non-file entry {}", name);
                continue;
            }
            if !self.matches(&name) {
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            files.push(CaptureFile {
                name,
                path: entry.into_path(),
                size,
            });

            if let Some(max) = self.config.max_files {
                if files.len() >= max {
                    break;
                }
            }
        }

        Ok(files)
    }

    /// The single named file, without applying any filter.
    pub fn single(&self, name: &str) -> Result<CaptureFile> {
        let path = self.root.join(name);
        let metadata = std::fs::metadata(&path)
            .with_context(|| format!("Failed to read capture file {}", path.display()))?;

        if !metadata.is_file() {
            anyhow::bail!("Not a regular file: {}", path.display());
        }

        Ok(CaptureFile {
            name: name.to_string(),
            path,
            size: metadata.len(),
        })
    }

    /// Check if a file name matches scan criteria.
    pub fn matches(&self, name: &str) -> bool {
        // Hidden files
        if name.starts_with('.') {
            return false;
        }

        if self.config.excludes.iter().any(|pattern| name == pattern) {
            return false;
        }

        if self.config.extensions.is_empty() {
            return true;
        }

        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        self.config
            .extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}
