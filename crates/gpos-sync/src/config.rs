//! # Sync Configuration
//!
//! Where the ERP lives, how to authenticate, and how submissions behave.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     GPOS_SERVER_URL=https://erp.example.com                            │
//! │     GPOS_API_KEY=... GPOS_API_SECRET=...                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/gpos/sync.toml (Linux)                                   │
//! │     ~/Library/Application Support/com.gpos.pos/sync.toml (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     no server (local ledger only), 600s submission lock               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Till 1"
//!
//! [server]
//! url = "https://erp.example.com"
//! api_key = "abc"
//! api_secret = "xyz"
//! request_timeout_secs = 30
//!
//! [submit]
//! lock_ttl_secs = 600
//! batch_size = 50
//!
//! [database]
//! path = "/var/lib/gpos/gpos.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for this till.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4), also the submission lock holder.
    pub id: String,

    /// Human-readable device name (e.g., "Till 1").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "POS Terminal".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Server Settings
// =============================================================================

/// ERP connection settings.
///
/// Without a `url` every service runs against the local SQLite store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub api_secret: Option<String>,

    /// Per-request timeout, the only timeout in the system.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            url: None,
            api_key: None,
            api_secret: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Submit Settings
// =============================================================================

/// Offline invoice submission settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitSettings {
    /// How long a submission lock survives a crashed holder (seconds).
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,

    /// Records per bulk reconciliation run.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_lock_ttl() -> u64 {
    600
}

fn default_batch_size() -> u32 {
    50
}

impl Default for SubmitSettings {
    fn default() -> Self {
        SubmitSettings {
            lock_ttl_secs: default_lock_ttl(),
            batch_size: default_batch_size(),
        }
    }
}

// =============================================================================
// Database Settings
// =============================================================================

/// Local store location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub submit: SubmitSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl SyncConfig {
    /// Creates a new config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.trim().is_empty() {
            return Err(SyncError::MissingDeviceId);
        }

        if let Some(url) = self.server_url()? {
            let has_key = self.server.api_key.as_deref().is_some_and(|k| !k.is_empty());
            let has_secret = self.server.api_secret.as_deref().is_some_and(|s| !s.is_empty());
            if !has_key || !has_secret {
                return Err(SyncError::MissingCredentials(url.to_string()));
            }
        }

        if self.server.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.submit.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("GPOS_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Ok(url) = std::env::var("GPOS_SERVER_URL") {
            debug!(url = %url, "Overriding server URL from environment");
            self.server.url = Some(url).filter(|u| !u.trim().is_empty());
        }

        if let Ok(key) = std::env::var("GPOS_API_KEY") {
            self.server.api_key = Some(key);
        }

        if let Ok(secret) = std::env::var("GPOS_API_SECRET") {
            self.server.api_secret = Some(secret);
        }

        if let Ok(timeout) = std::env::var("GPOS_REQUEST_TIMEOUT") {
            match timeout.parse::<u64>() {
                Ok(secs) => self.server.request_timeout_secs = secs,
                Err(_) => warn!(value = %timeout, "Ignoring non-numeric GPOS_REQUEST_TIMEOUT"),
            }
        }

        if let Ok(ttl) = std::env::var("GPOS_LOCK_TTL") {
            match ttl.parse::<u64>() {
                Ok(secs) => self.submit.lock_ttl_secs = secs,
                Err(_) => warn!(value = %ttl, "Ignoring non-numeric GPOS_LOCK_TTL"),
            }
        }

        if let Ok(path) = std::env::var("GPOS_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "gpos", "pos")
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    /// Parsed ERP base URL, if one is configured.
    pub fn server_url(&self) -> SyncResult<Option<Url>> {
        let Some(raw) = self.server.url.as_deref() else {
            return Ok(None);
        };
        let url = Url::parse(raw)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "Server URL must start with http:// or https://, got: {}",
                raw
            )));
        }
        Ok(Some(url))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.submit.lock_ttl_secs)
    }

    /// SQLite file to open: configured path, else the platform data dir.
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("gpos.db")))
            .unwrap_or_else(|| PathBuf::from("gpos.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_server(url: &str) -> SyncConfig {
        let mut config = SyncConfig::default();
        config.server.url = Some(url.to_string());
        config.server.api_key = Some("key".into());
        config.server.api_secret = Some("secret".into());
        config
    }

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(!config.device.id.is_empty());
        assert_eq!(config.server.url, None);
        assert_eq!(config.submit.lock_ttl_secs, 600);
        assert_eq!(config.lock_ttl(), Duration::from_secs(600));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();
        config.device.id = String::new();
        assert!(matches!(config.validate(), Err(SyncError::MissingDeviceId)));

        let config = with_server("ws://erp.local");
        assert!(config.validate().unwrap_err().is_config_error());

        let config = with_server("not a url");
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        let mut config = with_server("https://erp.example.com");
        assert!(config.validate().is_ok());

        config.server.api_secret = None;
        assert!(matches!(
            config.validate(),
            Err(SyncError::MissingCredentials(_))
        ));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = SyncConfig::default();
        config.submit.batch_size = 0;
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: SyncConfig = toml::from_str(
            r#"
            [device]
            id = "till-7"

            [server]
            url = "https://erp.example.com"
            api_key = "k"
            api_secret = "s"
            "#,
        )
        .unwrap();

        assert_eq!(config.device_id(), "till-7");
        assert_eq!(config.device.name, "POS Terminal");
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.submit.batch_size, 50);
        assert_eq!(
            config.server_url().unwrap().unwrap().as_str(),
            "https://erp.example.com/"
        );
    }

    #[test]
    fn test_toml_roundtrip_sections() {
        let config = with_server("https://erp.example.com");
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[device]"));
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[submit]"));
    }

    #[test]
    fn test_database_path_override() {
        let mut config = SyncConfig::default();
        config.database.path = Some(PathBuf::from("/tmp/gpos-test.db"));
        assert_eq!(config.database_path(), PathBuf::from("/tmp/gpos-test.db"));
    }
}
