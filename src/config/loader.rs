//! Config loading for tailpage.
//!
//! Loads and validates YAML config files with path expansion.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::discovery::DiscoveryResult;
use crate::config::error::ConfigError;
use crate::config::types::{RawConfig, ViewerConfig};

/// Expand tilde in path to home directory.
///
/// - `~/foo` -> `/home/user/foo`
/// - `/absolute/path` -> unchanged
/// - `relative/path` -> unchanged
pub fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path_str == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }

    path.to_path_buf()
}

/// Read and parse one YAML config file.
pub fn load_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    // A file holding only comments is an empty config
    let blank = content
        .lines()
        .map(str::trim)
        .all(|l| l.is_empty() || l.starts_with('#'));
    if blank {
        return Ok(RawConfig::default());
    }

    serde_saphyr::from_str(&content).map_err(|e| ConfigError::parse(path.to_path_buf(), e.to_string()))
}

/// Turn a parsed file into settings, applying defaults and checking values.
///
/// `origin` is only used to label validation errors.
pub fn resolve(raw: RawConfig, origin: &Path) -> Result<ViewerConfig, ConfigError> {
    let defaults = ViewerConfig::default();

    let page_size = raw.page_size.unwrap_or(defaults.page_size);
    if page_size == 0 {
        return Err(ConfigError::Validation {
            path: origin.to_path_buf(),
            message: "page_size must be greater than 0".to_string(),
        });
    }

    if raw.app_name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(ConfigError::Validation {
            path: origin.to_path_buf(),
            message: "app_name must not be empty".to_string(),
        });
    }

    Ok(ViewerConfig {
        app_name: raw.app_name,
        logs_dir: raw.logs_dir.as_deref().map(expand_path),
        active_log: raw.active_log.as_deref().map(expand_path),
        page_size,
        debounce: raw
            .debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.debounce),
        watch: raw.watch.unwrap_or(defaults.watch),
        log_level: raw.log_level,
    })
}

/// Load a single explicitly named config file.
pub fn load_single_file(path: &Path) -> Result<ViewerConfig, ConfigError> {
    resolve(load_file(path)?, path)
}

/// Load discovered config files; the project file overrides the global one
/// field by field.
///
/// Returns defaults if no config files exist.
pub fn load(discovery: &DiscoveryResult) -> Result<ViewerConfig, ConfigError> {
    let mut raw = RawConfig::default();
    let mut origin = PathBuf::new();

    if let Some(global_path) = &discovery.global_config {
        raw = raw.merge(load_file(global_path)?);
        origin = global_path.clone();
    }
    if let Some(project_path) = &discovery.project_config {
        raw = raw.merge(load_file(project_path)?);
        origin = project_path.clone();
    }

    resolve(raw, &origin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path(Path::new("~/logs/app.log"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("logs/app.log"));
        } else {
            assert_eq!(expanded.to_string_lossy(), "~/logs/app.log");
        }
    }

    #[test]
    fn test_expand_path_absolute_and_relative() {
        assert_eq!(
            expand_path(Path::new("/var/log/app.log")),
            PathBuf::from("/var/log/app.log")
        );
        assert_eq!(
            expand_path(Path::new("logs/app.log")),
            PathBuf::from("logs/app.log")
        );
    }

    #[test]
    fn test_load_empty_discovery_gives_defaults() -> anyhow::Result<()> {
        let config = load(&DiscoveryResult::default())?;
        assert_eq!(config, ViewerConfig::default());
        Ok(())
    }

    #[test]
    fn test_load_full_config() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("tailpage.yaml");
        fs::write(
            &path,
            r#"
app_name: Inventory
logs_dir: /var/log/inventory
active_log: /var/log/inventory/Inventory_Logs_20240101.txt
page_size: 200
debounce_ms: 150
watch: false
log_level: debug
"#,
        )?;

        let config = load_single_file(&path)?;
        assert_eq!(config.app_name.as_deref(), Some("Inventory"));
        assert_eq!(config.logs_dir, Some(PathBuf::from("/var/log/inventory")));
        assert_eq!(config.page_size, 200);
        assert_eq!(config.debounce, Duration::from_millis(150));
        assert!(!config.watch);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        Ok(())
    }

    #[test]
    fn test_comment_only_file_is_empty_config() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("tailpage.yaml");
        fs::write(&path, "# nothing here yet\n\n")?;

        assert_eq!(load_single_file(&path)?, ViewerConfig::default());
        Ok(())
    }

    #[test]
    fn test_project_overrides_global() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let global = temp.path().join("global.yaml");
        let project = temp.path().join("tailpage.yaml");
        fs::write(&global, "app_name: Global\npage_size: 75\n")?;
        fs::write(&project, "app_name: Project\n")?;

        let config = load(&DiscoveryResult {
            project_config: Some(project),
            global_config: Some(global),
        })?;
        assert_eq!(config.app_name.as_deref(), Some("Project"));
        assert_eq!(config.page_size, 75);
        Ok(())
    }

    #[test]
    fn test_zero_page_size_rejected() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("tailpage.yaml");
        fs::write(&path, "page_size: 0\n")?;

        let err = load_single_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
        assert!(err.to_string().contains("page_size"));
        Ok(())
    }

    #[test]
    fn test_unknown_field_suggests_correction() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("tailpage.yaml");
        fs::write(&path, "app_name: X\npage_sise: 10\n")?;

        let err = load_single_file(&path).unwrap_err();
        match err {
            ConfigError::Parse { suggestion, .. } => {
                assert_eq!(suggestion.as_deref(), Some("page_size"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_single_file(Path::new("/definitely/not/here/tailpage.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
