//! TOML configuration for the client.
//!
//! ```toml
//! [client]
//! log_level = "info"
//! tick_interval_ms = 16
//! client_type = "Presentation"
//!
//! [connection]
//! manager_address = "127.0.0.1:7710"
//! platform_target = "Standard"
//! connect_timeout_ms = 5000
//!
//! [policy.resource_management]
//! suppressed = ["ClientDoesNotOwnResource"]
//!
//! [policy.button_panel]
//! suppressed = ["ClientDoesNotOwnResource", "DriverBusy"]
//! ```
//!
//! Every field has a default, so a missing file, a missing table, or a
//! missing key all fall back to the values above.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cablink_core::protocol::ClientType;
use cablink_core::PlatformTarget;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::application::client::ClientOptions;
use crate::category::ErrorPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid manager address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub connection: ConnectionSection,
    #[serde(default)]
    pub policy: PolicySection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSection {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Host tick period of the binary's update loop.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub client_type: ClientType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSection {
    #[serde(default = "default_manager_address")]
    pub manager_address: String,
    #[serde(default)]
    pub platform_target: PlatformTarget,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Fixed client token; a fresh one is generated per run when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_token: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicySection {
    #[serde(default = "ErrorPolicy::resource_management_default")]
    pub resource_management: ErrorPolicy,
    #[serde(default = "ErrorPolicy::button_panel_default")]
    pub button_panel: ErrorPolicy,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_tick_interval_ms() -> u64 {
    16
}
fn default_manager_address() -> String {
    "127.0.0.1:7710".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    5000
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            tick_interval_ms: default_tick_interval_ms(),
            client_type: ClientType::default(),
        }
    }
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            manager_address: default_manager_address(),
            platform_target: PlatformTarget::default(),
            connect_timeout_ms: default_connect_timeout_ms(),
            client_token: None,
        }
    }
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            resource_management: ErrorPolicy::resource_management_default(),
            button_panel: ErrorPolicy::button_panel_default(),
        }
    }
}

impl ClientConfig {
    /// Parses `connection.manager_address`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidAddress`] if it is not `ip:port`.
    pub fn manager_addr(&self) -> Result<SocketAddr, ConfigError> {
        let address = &self.connection.manager_address;
        address.parse().map_err(|e: std::net::AddrParseError| ConfigError::InvalidAddress {
            address: address.clone(),
            reason: e.to_string(),
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connection.connect_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.client.tick_interval_ms.max(1))
    }

    pub fn to_options(&self) -> ClientOptions {
        ClientOptions {
            client_token: self.connection.client_token.unwrap_or_else(Uuid::new_v4),
            client_type: self.client.client_type,
            platform_target: self.connection.platform_target,
            resource_policy: self.policy.resource_management.clone(),
            button_panel_policy: self.policy.button_panel.clone(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads the config at `path`, returning the defaults if it does not exist.
///
/// # Errors
///
/// [`ConfigError::Io`] for file-system errors other than "not found", and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use cablink_core::protocol::ResourceErrorCode;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("cablink-config-{}", Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_default_config_matches_documented_values() {
        // Arrange / Act
        let cfg = ClientConfig::default();

        // Assert
        assert_eq!(cfg.client.log_level, "info");
        assert_eq!(cfg.client.tick_interval_ms, 16);
        assert_eq!(cfg.manager_addr().expect("addr").port(), 7710);
        assert_eq!(cfg.connection.platform_target, PlatformTarget::Standard);
        assert!(cfg
            .policy
            .button_panel
            .suppresses(ResourceErrorCode::DriverBusy));
    }

    #[test]
    fn test_partial_toml_fills_in_defaults() {
        let cfg: ClientConfig = toml::from_str(
            r#"
            [connection]
            platform_target = "Legacy"

            [policy.resource_management]
            suppressed = []
            "#,
        )
        .expect("parse");

        assert_eq!(cfg.connection.platform_target, PlatformTarget::Legacy);
        assert_eq!(cfg.connection.connect_timeout_ms, 5000);
        assert!(cfg.policy.resource_management.suppressed.is_empty());
        assert_eq!(cfg.policy.button_panel, ErrorPolicy::button_panel_default());
    }

    #[test]
    fn test_invalid_manager_address_is_reported() {
        let mut cfg = ClientConfig::default();
        cfg.connection.manager_address = "cabinet-manager".to_string();

        assert!(matches!(
            cfg.manager_addr(),
            Err(ConfigError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let cfg = load_config(&scratch_path("absent.toml")).expect("defaults");
        assert_eq!(cfg, ClientConfig::default());
    }

    #[test]
    fn test_save_then_load_preserves_config() {
        // Arrange
        let path = scratch_path("nested/client.toml");
        let mut cfg = ClientConfig::default();
        cfg.client.client_type = ClientType::Diagnostics;
        cfg.connection.client_token = Some(Uuid::new_v4());

        // Act
        save_config(&path, &cfg).expect("save");
        let loaded = load_config(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.to_options().client_token, cfg.connection.client_token.unwrap());
        if let Some(dir) = path.parent().and_then(Path::parent) {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let path = scratch_path("bad.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[client\nlog_level = ").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
