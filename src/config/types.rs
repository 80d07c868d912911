//! Config types for tailpage.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Page size when neither the config nor the command line sets one.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Quiet period before typed filter text is applied.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Field names accepted in a config file, for typo suggestions.
pub const KNOWN_FIELDS: &[&str] = &[
    "app_name",
    "logs_dir",
    "active_log",
    "page_size",
    "debounce_ms",
    "watch",
    "log_level",
];

/// Config file as written. Every field is optional so a project file can
/// override only part of the global one. Unknown fields are rejected.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub app_name: Option<String>,
    pub logs_dir: Option<PathBuf>,
    pub active_log: Option<PathBuf>,
    pub page_size: Option<usize>,
    pub debounce_ms: Option<u64>,
    pub watch: Option<bool>,
    pub log_level: Option<String>,
}

impl RawConfig {
    /// Fields set in `other` win.
    pub fn merge(self, other: RawConfig) -> RawConfig {
        RawConfig {
            app_name: other.app_name.or(self.app_name),
            logs_dir: other.logs_dir.or(self.logs_dir),
            active_log: other.active_log.or(self.active_log),
            page_size: other.page_size.or(self.page_size),
            debounce_ms: other.debounce_ms.or(self.debounce_ms),
            watch: other.watch.or(self.watch),
            log_level: other.log_level.or(self.log_level),
        }
    }
}

/// Resolved viewer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Prefix of the log file names, as in `<app>_Logs_*.txt`.
    pub app_name: Option<String>,
    /// Directory holding the log files (tilde expanded).
    pub logs_dir: Option<PathBuf>,
    /// File this process is currently appending to.
    pub active_log: Option<PathBuf>,
    pub page_size: usize,
    pub debounce: Duration,
    /// Refresh the active log when it changes on disk.
    pub watch: bool,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: Option<String>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            app_name: None,
            logs_dir: None,
            active_log: None,
            page_size: DEFAULT_PAGE_SIZE,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            watch: true,
            log_level: None,
        }
    }
}
