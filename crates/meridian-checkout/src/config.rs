//! # Checkout Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MERIDIAN_BACKEND_URL=https://shop.example.com/api                  │
//! │     MERIDIAN_BASE_CURRENCY=USD                                         │
//! │     MERIDIAN_HTTP_TIMEOUT_SECS=10                                      │
//! │     MERIDIAN_STATE_PATH=/var/lib/meridian/cart.json                    │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/meridian/checkout.toml (Linux)                           │
//! │     ~/Library/Application Support/com.meridian.checkout/checkout.toml  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # checkout.toml
//! [backend]
//! base_url = "https://shop.example.com/api"
//! timeout_secs = 10
//!
//! [pricing]
//! base_currency = "USD"
//!
//! [storage]
//! state_path = "/home/me/.local/share/meridian/cart.json"
//! ```

use meridian_core::validation::validate_currency_code;
use meridian_core::CurrencyCode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Sections
// =============================================================================

/// Where the checkout API lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Default for BackendSettings {
    fn default() -> Self {
        BackendSettings {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingSettings {
    /// Currency catalog prices and rates are authored in.
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
}

fn default_base_currency() -> String {
    "USD".to_string()
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            base_currency: default_base_currency(),
        }
    }
}

/// Where the client-local cart state is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// `None` means the project data directory.
    #[serde(default)]
    pub state_path: Option<PathBuf>,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete checkout configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckoutConfig {
    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub pricing: PricingSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl CheckoutConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (checkout.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading checkout config from file");
                config = Self::from_file(&path)?;
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
            warn!("Failed to load checkout config: {}. Using defaults.", e);
            Self::default()
        })
    }

    fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Saves configuration to file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, toml::to_string_pretty(self)?)?;

        info!(?path, "Checkout config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let url = &self.backend.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "backend.base_url must start with http:// or https://, got: {}",
                url
            )));
        }

        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "backend.timeout_secs must be greater than 0".into(),
            ));
        }

        validate_currency_code(&self.pricing.base_currency)
            .map_err(|e| ConfigError::Invalid(format!("pricing.base_currency: {}", e)))?;

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from a key lookup (the process environment in
    /// production, a map in tests).
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("MERIDIAN_BACKEND_URL") {
            debug!(url = %url, "Overriding backend URL from environment");
            self.backend.base_url = url;
        }

        if let Some(currency) = lookup("MERIDIAN_BASE_CURRENCY") {
            self.pricing.base_currency = currency.trim().to_uppercase();
        }

        if let Some(timeout) = lookup("MERIDIAN_HTTP_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(secs) => self.backend.timeout_secs = secs,
                Err(_) => warn!(value = %timeout, "Ignoring non-numeric MERIDIAN_HTTP_TIMEOUT_SECS"),
            }
        }

        if let Some(path) = lookup("MERIDIAN_STATE_PATH") {
            self.storage.state_path = Some(PathBuf::from(path));
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "meridian", "checkout")
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("checkout.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn base_currency(&self) -> CurrencyCode {
        CurrencyCode::new(&self.pricing.base_currency)
    }

    /// Configured state path, or `cart.json` in the project data directory.
    pub fn state_path(&self) -> Option<PathBuf> {
        self.storage
            .state_path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("cart.json")))
    }
}
