//! Client configuration (`~/.config/basket/config.toml`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sync::SessionConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasketConfig {
    /// Base URL of the basket server.
    pub server_url: String,

    /// Basket to join; a new one is generated when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basket_id: Option<String>,

    /// Delay between reconnect attempts.
    pub reconnect_delay_ms: u64,

    /// How long an outbound message may stay unacknowledged.
    pub ack_timeout_ms: u64,
}

impl Default for BasketConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            basket_id: None,
            reconnect_delay_ms: 1000,
            ack_timeout_ms: 5000,
        }
    }
}

impl BasketConfig {
    /// Get the config file path (`<config_dir>/basket/config.toml`).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("basket").join("config.toml"))
    }

    /// Load config from the default location, or defaults if there is none.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Save config to the default location.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Load config from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Write config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).map_err(io_err)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            ack_timeout: Duration::from_millis(self.ack_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BasketConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, BasketConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = BasketConfig {
            server_url: "https://shop.example.com".to_string(),
            basket_id: Some("family".to_string()),
            reconnect_delay_ms: 250,
            ack_timeout_ms: 2000,
        };

        config.save_to(&path).unwrap();
        assert_eq!(BasketConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "basket_id = \"weekend\"\n").unwrap();

        let config = BasketConfig::load_from(&path).unwrap();
        assert_eq!(config.basket_id.as_deref(), Some("weekend"));
        assert_eq!(config.server_url, "http://localhost:8080");
        assert_eq!(config.ack_timeout_ms, 5000);
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "server_url = [").unwrap();
        assert!(matches!(BasketConfig::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_session_config() {
        let config = BasketConfig::default();
        let session = config.session_config();
        assert_eq!(session, SessionConfig::default());
    }
}
