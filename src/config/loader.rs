use crate::config::Config;
use crate::utils::{OverlayError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the default config file path: ~/.config/terminlay/config.yaml
pub fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| OverlayError::config("neither HOME nor USERPROFILE is set"))?;

    let mut path = PathBuf::from(home);
    path.push(".config");
    path.push("terminlay");
    path.push("config.yaml");

    Ok(path)
}

/// Load configuration from an explicit path, or from the default location.
///
/// A missing default file yields the defaults; a missing explicit file is an error.
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(OverlayError::config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            read_config(&path)
        }
        None => {
            let path = default_config_path()?;
            if path.exists() {
                read_config(&path)
            } else {
                log::info!("Config file not found at {}, using defaults", path.display());
                Ok(Config::default())
            }
        }
    }
}

fn read_config(path: &Path) -> Result<Config> {
    log::info!("Loading config from: {}", path.display());
    let content = fs::read_to_string(path)?;
    let config: Config = serde_yaml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(matches!(load_config(Some(missing)), Err(OverlayError::Config(_))));
    }

    #[test]
    fn test_explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "overlay:\n  retry_failed_markers: true\nlog:\n  level: debug\n").unwrap();

        let config = load_config(Some(path)).unwrap();
        assert!(config.overlay.retry_failed_markers);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.overlay.image_rows, 10);
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "overlay: [not, a, map]\n").unwrap();
        assert!(matches!(load_config(Some(path)), Err(OverlayError::Yaml(_))));
    }
}
