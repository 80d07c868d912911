//! Config discovery for tailpage.
//!
//! Walks parent directories to find `tailpage.yaml` and checks for a global
//! config at `<config_dir>/tailpage/config.yaml`.

use std::path::{Path, PathBuf};

/// Project config filename to search for in parent directories.
pub const PROJECT_CONFIG_NAME: &str = "tailpage.yaml";

/// Global config filename within the tailpage config directory.
pub const GLOBAL_CONFIG_NAME: &str = "config.yaml";

/// Paths of the config files that exist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryResult {
    /// Closest `tailpage.yaml` at or above the start directory.
    pub project_config: Option<PathBuf>,
    /// `<config_dir>/tailpage/config.yaml`.
    pub global_config: Option<PathBuf>,
}

/// Discover config files starting from the current working directory.
pub fn discover() -> DiscoveryResult {
    let mut result = match std::env::current_dir() {
        Ok(dir) => discover_from(&dir.canonicalize().unwrap_or(dir)),
        Err(_) => DiscoveryResult::default(),
    };
    result.global_config = global_config_path().filter(|p| is_file(p));
    tracing::debug!(
        project = ?result.project_config,
        global = ?result.global_config,
        "Config discovery finished"
    );
    result
}

/// Walk `start` and its ancestors for a project config. Global config is
/// not checked.
pub fn discover_from(start: &Path) -> DiscoveryResult {
    let project_config = start
        .ancestors()
        .map(|dir| dir.join(PROJECT_CONFIG_NAME))
        .find(|candidate| is_file(candidate));

    DiscoveryResult {
        project_config,
        global_config: None,
    }
}

/// Where the global config lives on this platform.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tailpage").join(GLOBAL_CONFIG_NAME))
}

fn is_file(path: &Path) -> bool {
    path.try_exists().unwrap_or(false) && path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_finds_config_in_start_dir() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let config_path = temp.path().join(PROJECT_CONFIG_NAME);
        fs::write(&config_path, "page_size: 10\n")?;

        let result = discover_from(temp.path());
        assert_eq!(result.project_config, Some(config_path));
        Ok(())
    }

    #[test]
    fn test_finds_config_in_parent_dir() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested)?;
        let config_path = temp.path().join(PROJECT_CONFIG_NAME);
        fs::write(&config_path, "watch: false\n")?;

        let result = discover_from(&nested);
        assert_eq!(result.project_config, Some(config_path));
        Ok(())
    }

    #[test]
    fn test_closest_config_wins() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let nested = temp.path().join("sub");
        fs::create_dir(&nested)?;
        fs::write(temp.path().join(PROJECT_CONFIG_NAME), "page_size: 1\n")?;
        fs::write(nested.join(PROJECT_CONFIG_NAME), "page_size: 2\n")?;

        let result = discover_from(&nested);
        assert_eq!(result.project_config, Some(nested.join(PROJECT_CONFIG_NAME)));
        Ok(())
    }

    #[test]
    fn test_directory_named_like_config_is_ignored() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        fs::create_dir(temp.path().join(PROJECT_CONFIG_NAME))?;

        let result = discover_from(temp.path());
        assert_ne!(
            result.project_config,
            Some(temp.path().join(PROJECT_CONFIG_NAME))
        );
        Ok(())
    }

    #[test]
    fn test_global_config_path_shape() {
        if let Some(path) = global_config_path() {
            assert!(path.ends_with("tailpage/config.yaml"));
        }
    }
}
