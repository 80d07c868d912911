//! Finds an application's log files in its logs directory.

use anyhow::{Context, Result};
use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One candidate log file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
    pub size: u64,
}

impl LogFile {
    fn from_path(path: PathBuf) -> std::io::Result<Self> {
        let meta = fs::metadata(&path)?;
        Ok(Self {
            created: meta.created().ok(),
            modified: meta.modified().ok(),
            size: meta.len(),
            path,
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Creation time where the platform records it, else modification time
    pub fn timestamp(&self) -> Option<SystemTime> {
        self.created.or(self.modified)
    }
}

/// Glob matching `<app>_Logs_*.txt`; the app name is matched literally.
pub fn log_file_pattern(app_name: &str) -> Result<glob::Pattern> {
    let pattern = format!("{}_Logs_*.txt", glob::Pattern::escape(app_name));
    glob::Pattern::new(&pattern).with_context(|| format!("Invalid log file pattern: {}", pattern))
}

/// Log files for `app_name` in `dir`, newest first.
///
/// Subdirectories are not searched. Entries whose metadata cannot be read
/// are skipped with a warning.
pub fn find_log_files(dir: &Path, app_name: &str) -> Result<Vec<LogFile>> {
    let pattern = log_file_pattern(app_name)?;
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read logs directory: {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        let name = entry.file_name();
        if !pattern.matches(&name.to_string_lossy()) {
            continue;
        }
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        match LogFile::from_path(entry.path()) {
            Ok(file) => files.push(file),
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "Skipping log file");
            }
        }
    }

    sort_newest_first(&mut files);
    tracing::debug!(dir = %dir.display(), app = app_name, count = files.len(), "Found log files");
    Ok(files)
}

/// Newest timestamp first; ties (and missing timestamps) fall back to the
/// file name, descending, so dated names still sort sensibly.
pub fn sort_newest_first(files: &mut [LogFile]) {
    files.sort_by_key(|f| (Reverse(f.timestamp()), Reverse(f.file_name())));
}
