//! Configuration loading
//!
//! Config file resolution follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. `VINCULO_CONFIG` environment variable
//! 3. User config file (`~/.config/vinculo/config.toml` or platform equivalent)
//! 4. System config file (`/etc/vinculo/config.toml`, Linux only)
//! 5. Compiled defaults (fallback)
//!
//! A missing config file is not an error: defaults are used and a warning is logged.
//! Payment secrets may also be supplied through environment variables, which override
//! the file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::access::ProductCode;
use crate::{Error, Result};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "VINCULO_CONFIG";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5780";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";
const DEFAULT_PAYMENTS_API: &str = "https://api.stripe.com";
const DEFAULT_GEO_ENDPOINT: &str = "http://ip-api.com/json";

/// Top-level service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// SQLite database file; relative paths resolve against the data directory
    pub database_path: PathBuf,
    /// Public site URL used to build checkout return links
    pub public_base_url: String,
    /// Bound on the access-record lookup before failing closed
    pub access_check_timeout_ms: u64,
    pub payments: PaymentsConfig,
    pub geo: GeoConfig,
}

/// Payment provider settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaymentsConfig {
    pub api_base: String,
    pub secret_key: Option<String>,
    pub price_quick: Option<String>,
    pub price_deep: Option<String>,
    pub price_upgrade: Option<String>,
    pub request_timeout_ms: u64,
}

/// Geo-IP lookup settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout_ms: u64,
    /// Session -> country cache size; the cache is cleared when it would overflow
    pub cache_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            database_path: default_data_dir().join("vinculo.db"),
            public_base_url: DEFAULT_PUBLIC_URL.to_string(),
            access_check_timeout_ms: 5000,
            payments: PaymentsConfig::default(),
            geo: GeoConfig::default(),
        }
    }
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_PAYMENTS_API.to_string(),
            secret_key: None,
            price_quick: None,
            price_deep: None,
            price_upgrade: None,
            request_timeout_ms: 10_000,
        }
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_GEO_ENDPOINT.to_string(),
            timeout_ms: 1500,
            cache_capacity: 1000,
        }
    }
}

impl ServiceConfig {
    pub fn access_check_timeout(&self) -> Duration {
        Duration::from_millis(self.access_check_timeout_ms)
    }

    /// Database path with relative paths anchored at the data directory
    pub fn resolved_database_path(&self) -> PathBuf {
        if self.database_path.is_relative() {
            default_data_dir().join(&self.database_path)
        } else {
            self.database_path.clone()
        }
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))
    }

    /// Load configuration using the priority order described in the module docs
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(cli_path) {
            Some(path) => {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
                })?;
                info!("Loaded configuration from {}", path.display());
                Self::from_toml_str(&content)?
            }
            None => {
                warn!("No config file found, using compiled defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment variables win over file values for secrets and price ids
    pub fn apply_env_overrides(&mut self) {
        let overrides = [
            ("VINCULO_PAYMENTS_SECRET_KEY", &mut self.payments.secret_key),
            ("VINCULO_PRICE_QUICK", &mut self.payments.price_quick),
            ("VINCULO_PRICE_DEEP", &mut self.payments.price_deep),
            ("VINCULO_PRICE_UPGRADE", &mut self.payments.price_upgrade),
        ];
        for (var, slot) in overrides {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    *slot = Some(value);
                }
            }
        }
    }
}

impl PaymentsConfig {
    /// Secret key, or a configuration error if it was never provided
    pub fn require_secret_key(&self) -> Result<&str> {
        non_blank(self.secret_key.as_deref())
            .ok_or_else(|| Error::Config("payments.secret_key is not configured".to_string()))
    }

    /// Price id for a product, or a configuration error if it is missing
    pub fn price_for(&self, product: ProductCode) -> Result<&str> {
        let price = match product {
            ProductCode::Quick => self.price_quick.as_deref(),
            ProductCode::Deep => self.price_deep.as_deref(),
            ProductCode::Upgrade => self.price_upgrade.as_deref(),
        };
        non_blank(price).ok_or_else(|| {
            Error::Config(format!("No price id configured for product '{}'", product))
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Find the config file to load, if any
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory
    if let Some(user_config) = dirs::config_dir().map(|d| d.join("vinculo").join("config.toml")) {
        if user_config.exists() {
            return Some(user_config);
        }
    }

    // Priority 4: System config (Linux)
    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/vinculo/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("vinculo"))
        .unwrap_or_else(|| PathBuf::from("./vinculo_data"))
}
