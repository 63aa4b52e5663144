//! Configuration and credential storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::{StoredToken, TokenStore};

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
/// Raw WebSocket transport of the SockJS endpoint `/t2r-websocket`.
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/t2r-websocket/websocket";
pub const DEFAULT_LOCATION_URL: &str =
    "https://servicodados.ibge.gov.br/api/v1/localidades/estados";
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;
pub const DEFAULT_NOTIFICATION_VOLUME: f32 = 0.1;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the REST backend
    pub api_url: String,
    /// STOMP-over-WebSocket endpoint for push notifications
    pub ws_url: String,
    /// Base URL of the state/municipality lookup service
    pub location_url: String,
    /// Fixed delay before the push channel reconnects
    pub reconnect_delay_secs: u64,
    /// Volume of the new-message chime (0.0 - 1.0)
    pub notification_volume: f32,
    /// Bearer token from the last sign-in
    pub auth_token: Option<StoredToken>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            location_url: DEFAULT_LOCATION_URL.to_string(),
            reconnect_delay_secs: DEFAULT_RECONNECT_DELAY_SECS,
            notification_volume: DEFAULT_NOTIFICATION_VOLUME,
            auth_token: None,
        }
    }
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "t2r", "t2r-cli")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk, then apply `T2R_API_URL` / `T2R_WS_URL`.
    pub fn load() -> Result<Self> {
        let config = Self::load_from(&Self::config_path()?)?;
        Ok(config.with_overrides(
            std::env::var("T2R_API_URL").ok(),
            std::env::var("T2R_WS_URL").ok(),
        ))
    }

    /// Load configuration from a specific file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        // The file holds the bearer token
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Replace endpoint URLs with non-empty overrides.
    pub fn with_overrides(mut self, api_url: Option<String>, ws_url: Option<String>) -> Self {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(url) = ws_url.filter(|u| !u.trim().is_empty()) {
            self.ws_url = url;
        }
        self
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    /// Notification volume clamped to the valid range.
    pub fn notification_volume(&self) -> f32 {
        self.notification_volume.clamp(0.0, 1.0)
    }

    /// The bearer token, if one is stored and still valid.
    pub fn valid_token(&self) -> Option<String> {
        self.auth_token
            .as_ref()
            .filter(|t| !t.is_expired())
            .map(|t| t.token.clone())
    }
}

impl TokenStore for Config {
    fn get_access_token(&self) -> Option<StoredToken> {
        self.auth_token.clone()
    }

    fn set_access_token(&mut self, token: String, expires_in: Option<u64>) {
        self.auth_token = Some(StoredToken::new(token, expires_in));
    }

    fn clear_tokens(&mut self) {
        self.auth_token = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.reconnect_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_save_and_reload_keeps_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.api_url = "https://t2r.example.org/api".to_string();
        config.set_access_token("tok".to_string(), Some(3600));
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.valid_token().as_deref(), Some("tok"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_url = \"http://10.0.0.2:8080\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_url, "http://10.0.0.2:8080");
        assert_eq!(config.ws_url, DEFAULT_WS_URL);
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_overrides_ignore_blank_values() {
        let config = Config::default().with_overrides(Some("  ".to_string()), Some("ws://x/ws".to_string()));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.ws_url, "ws://x/ws");
    }

    #[test]
    fn test_expired_token_is_not_valid() {
        let mut config = Config::default();
        config.set_access_token("old".to_string(), Some(0));
        assert!(config.valid_token().is_none());
        config.clear_tokens();
        assert!(config.get_access_token().is_none());
    }

    #[test]
    fn test_volume_is_clamped() {
        let config = Config {
            notification_volume: 3.0,
            ..Config::default()
        };
        assert_eq!(config.notification_volume(), 1.0);
    }
}
