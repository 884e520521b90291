use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ZapError;

/// Top-level Lexzap configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub lexzap: LexzapConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub connect: ConnectConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexzapConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LexzapConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Remote WhatsApp gateway settings.
///
/// `admin_token` is the tenant-wide credential used only for instance
/// creation; every other call authenticates with the per-instance token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub admin_token: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            admin_token: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Connection flow tuning.
///
/// These are observed provider defaults, not derived guarantees: the QR code
/// rotates on the provider's own schedule regardless of what we configure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConnectConfig {
    /// Status poll interval while waiting for a scan.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Lifetime of a displayed QR code before it is considered expired.
    #[serde(default = "default_qr_ttl")]
    pub qr_ttl_secs: u64,
    /// How long a started pairing may take before it is treated as failed.
    #[serde(default = "default_pairing_timeout")]
    pub pairing_timeout_secs: u64,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            qr_ttl_secs: default_qr_ttl(),
            pairing_timeout_secs: default_pairing_timeout(),
        }
    }
}

fn default_name() -> String {
    "lexzap".to_string()
}

fn default_data_dir() -> String {
    "~/.lexzap".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "https://gateway.lexzap.app".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_db_path() -> String {
    "~/.lexzap/lexzap.db".to_string()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_qr_ttl() -> u64 {
    120
}

fn default_pairing_timeout() -> u64 {
    30
}

/// Expand a leading `~/` to the user's home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load config from a TOML file, falling back to defaults if it is missing.
pub fn load(path: &str) -> Result<Config, ZapError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!("Config file not found at {}, using defaults", path.display());
        return Ok(Config {
            lexzap: LexzapConfig::default(),
            gateway: GatewayConfig::default(),
            storage: StorageConfig::default(),
            connect: ConnectConfig::default(),
        });
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ZapError::Config(format!("failed to read {}: {e}", path.display())))?;

    toml::from_str(&content)
        .map_err(|e| ZapError::Config(format!("failed to parse {}: {e}", path.display())))
}
