//! # Cart Configuration
//!
//! Configuration for the remote gateway and the engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CARTLINE_BASE_URL=https://api.example.com/v1/                      │
//! │     CARTLINE_OPERATION_TIMEOUT_SECS=15                                 │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/cartline/cart.toml (Linux)                               │
//! │     ~/Library/Application Support/com.cartline.cartline/cart.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # cart.toml
//! [gateway]
//! base_url = "https://api.example.com/v1/"
//! request_timeout_secs = 10
//! connect_timeout_secs = 5
//!
//! [engine]
//! operation_timeout_secs = 15
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Gateway Settings
// =============================================================================

/// Settings for the HTTP gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Base URL the REST paths (`cart`, `cart/items/..`) are joined onto.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whole-request timeout. Expiry is reported as `SyncError::Timeout`.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "http://localhost:8080/api/".to_string()
}
fn default_request_timeout() -> u64 {
    10
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_user_agent() -> String {
    format!("cartline/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for GatewaySettings {
    fn default() -> Self {
        GatewaySettings {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl GatewaySettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Parses the base URL, forcing a trailing slash so relative joins keep
    /// the last path segment (`/api` + `cart` must give `/api/cart`).
    pub fn parsed_base_url(&self) -> SyncResult<Url> {
        let mut url = Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::InvalidUrl(format!(
                "Gateway URL must use http:// or https://, got: {}",
                self.base_url
            )));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

// =============================================================================
// Engine Settings
// =============================================================================

/// Settings for the cart engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Upper bound for a single gateway call as seen by the engine.
    /// Expiry rolls the operation back with `SyncError::Timeout`.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
}

fn default_operation_timeout() -> u64 {
    15
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            operation_timeout_secs: default_operation_timeout(),
        }
    }
}

impl EngineSettings {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete cart configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartConfig {
    #[serde(default)]
    pub gateway: GatewaySettings,

    #[serde(default)]
    pub engine: EngineSettings,
}

impl CartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (cart.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading cart config from file");
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
            warn!("Failed to load cart config: {}. Using defaults.", e);
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

        info!(?path, "Cart config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        self.gateway.parsed_base_url()?;

        if self.gateway.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.gateway.connect_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "connect_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.engine.operation_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "operation_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CARTLINE_BASE_URL") {
            debug!(url = %url, "Overriding gateway URL from environment");
            self.gateway.base_url = url;
        }

        if let Some(secs) = env_secs("CARTLINE_REQUEST_TIMEOUT_SECS") {
            self.gateway.request_timeout_secs = secs;
        }

        if let Some(secs) = env_secs("CARTLINE_CONNECT_TIMEOUT_SECS") {
            self.gateway.connect_timeout_secs = secs;
        }

        if let Some(secs) = env_secs("CARTLINE_OPERATION_TIMEOUT_SECS") {
            self.engine.operation_timeout_secs = secs;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "cartline", "cartline")
            .map(|dirs| dirs.config_dir().join("cart.toml"))
    }
}

fn env_secs(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.parse::<u64>() {
        Ok(secs) => {
            debug!(key, secs, "Overriding timeout from environment");
            Some(secs)
        }
        Err(_) => {
            warn!(key, value = %raw, "Ignoring non-numeric timeout in environment");
            None
        }
    }
}
