use composer_schema::DEFAULT_THEME_ID;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_CONFIG_NAME: &str = "composer.config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Engine configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Undo levels kept by the pipeline (0 = unlimited)
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Theme stamped on newly created boards
    #[serde(default = "default_theme")]
    pub default_theme: String,

    /// When false, reconciliation always recomputes
    #[serde(default = "default_memoize")]
    pub memoize_reconciliation: bool,
}

fn default_history_limit() -> usize {
    100
}

fn default_theme() -> String {
    DEFAULT_THEME_ID.to_string()
}

fn default_memoize() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            default_theme: default_theme(),
            memoize_reconciliation: default_memoize(),
        }
    }
}

impl EngineConfig {
    /// Load config from a directory, falling back to defaults when absent
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "historyLimit": 10,
            "defaultTheme": "midnight",
            "memoizeReconciliation": false
        }"#;

        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.default_theme, "midnight");
        assert!(!config.memoize_reconciliation);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{ "historyLimit": 3 }"#).unwrap();
        assert_eq!(config.history_limit, 3);
        assert_eq!(config.default_theme, "default");
        assert!(config.memoize_reconciliation);
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(dir.path()).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_NAME),
            r#"{ "defaultTheme": "midnight" }"#,
        )
        .unwrap();

        let config = EngineConfig::load(dir.path()).unwrap();
        assert_eq!(config.default_theme, "midnight");
        assert_eq!(config.history_limit, 100);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG_NAME), "{ nope").unwrap();

        assert!(matches!(
            EngineConfig::load(dir.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
