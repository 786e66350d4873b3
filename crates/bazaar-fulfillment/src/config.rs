//! # Service Configuration
//!
//! Configuration for the fulfillment service.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BAZAAR_DATABASE_PATH=/var/lib/bazaar/bazaar.db                     │
//! │     BAZAAR_STEP_UP_TIMEOUT_SECS=3                                      │
//! │                                                                         │
//! │  2. TOML Config File (optional)                                        │
//! │     ./bazaar.toml                                                      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # bazaar.toml
//! database_path = "./data/bazaar.db"
//! max_connections = 8
//! step_up_timeout_secs = 5
//! pending_cancellation_ttl_secs = 600
//! shipping_free_threshold_paise = 100000   # ₹1000
//! shipping_flat_charge_paise = 15000       # ₹150
//! ```

use bazaar_core::money::Money;
use bazaar_core::pricing::ShippingPolicy;
use crate::pending::DEFAULT_PENDING_TTL;
use bazaar_db::DbConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Default file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "bazaar.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "BAZAAR";

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value was read but is not usable.
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Fulfillment service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentConfig {
    /// SQLite database file.
    pub database_path: PathBuf,

    /// Pool size.
    pub max_connections: u32,

    /// Upper bound on one step-up verification call.
    pub step_up_timeout_secs: u64,

    /// How long a staged cancellation stays confirmable.
    pub pending_cancellation_ttl_secs: u64,

    /// Pre-GST subtotal at which shipping becomes free.
    pub shipping_free_threshold_paise: i64,

    /// Shipping charged below the threshold.
    pub shipping_flat_charge_paise: i64,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        let shipping = ShippingPolicy::default();
        FulfillmentConfig {
            database_path: PathBuf::from("./bazaar.db"),
            max_connections: 5,
            step_up_timeout_secs: 5,
            pending_cancellation_ttl_secs: DEFAULT_PENDING_TTL.as_secs(),
            shipping_free_threshold_paise: shipping.free_threshold.paise(),
            shipping_flat_charge_paise: shipping.flat_charge.paise(),
        }
    }
}

impl FulfillmentConfig {
    /// Loads `bazaar.toml` from the working directory (if present) and
    /// `BAZAAR_*` environment variables over the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Same as [`FulfillmentConfig::load`] with an explicit file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        info!(path = %path.display(), "Loading configuration");

        let builder = Self::defaults()?
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        Self::from_config(builder.build()?)
    }

    /// Builder pre-populated with the default values.
    pub fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let d = FulfillmentConfig::default();
        let builder = Config::builder()
            .set_default("database_path", d.database_path.display().to_string())?
            .set_default("max_connections", i64::from(d.max_connections))?
            .set_default("step_up_timeout_secs", d.step_up_timeout_secs as i64)?
            .set_default("pending_cancellation_ttl_secs", d.pending_cancellation_ttl_secs as i64)?
            .set_default("shipping_free_threshold_paise", d.shipping_free_threshold_paise)?
            .set_default("shipping_flat_charge_paise", d.shipping_flat_charge_paise)?;
        Ok(builder)
    }

    /// Deserializes and validates a built configuration.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let parsed: FulfillmentConfig = config.try_deserialize()?;
        parsed.validate()?;
        debug!(config = ?parsed, "Configuration loaded");
        Ok(parsed)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(invalid("database_path", "must not be empty"));
        }
        if self.max_connections == 0 {
            return Err(invalid("max_connections", "must be at least 1"));
        }
        if self.step_up_timeout_secs == 0 {
            return Err(invalid("step_up_timeout_secs", "must be at least 1"));
        }
        if self.pending_cancellation_ttl_secs == 0 {
            return Err(invalid("pending_cancellation_ttl_secs", "must be at least 1"));
        }
        if self.shipping_free_threshold_paise < 0 {
            return Err(invalid("shipping_free_threshold_paise", "must not be negative"));
        }
        if self.shipping_flat_charge_paise < 0 {
            return Err(invalid("shipping_flat_charge_paise", "must not be negative"));
        }
        Ok(())
    }

    /// Database settings derived from this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path).max_connections(self.max_connections)
    }

    /// Shipping rule derived from this configuration.
    pub fn shipping_policy(&self) -> ShippingPolicy {
        ShippingPolicy {
            free_threshold: Money::from_paise(self.shipping_free_threshold_paise),
            flat_charge: Money::from_paise(self.shipping_flat_charge_paise),
        }
    }

    /// Step-up timeout as a duration.
    pub fn step_up_timeout(&self) -> Duration {
        Duration::from_secs(self.step_up_timeout_secs)
    }

    /// Lifetime of a staged cancellation as a duration.
    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_cancellation_ttl_secs)
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Result<FulfillmentConfig, ConfigError> {
        let config = FulfillmentConfig::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        FulfillmentConfig::from_config(config)
    }

    #[test]
    fn test_defaults() {
        let config = from_toml("").unwrap();
        assert_eq!(config, FulfillmentConfig::default());
        assert_eq!(config.step_up_timeout(), Duration::from_secs(5));
        assert_eq!(config.pending_ttl(), Duration::from_secs(600));
        assert_eq!(config.shipping_policy(), ShippingPolicy::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let config = from_toml(
            r#"
            database_path = "/tmp/bazaar.db"
            step_up_timeout_secs = 2
            pending_cancellation_ttl_secs = 120
            shipping_flat_charge_paise = 9900
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/bazaar.db"));
        assert_eq!(config.step_up_timeout(), Duration::from_secs(2));
        assert_eq!(config.pending_ttl(), Duration::from_secs(120));
        assert_eq!(config.shipping_policy().flat_charge, Money::from_rupees(99));
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            from_toml("step_up_timeout_secs = 0"),
            Err(ConfigError::InvalidValue { key, .. }) if key == "step_up_timeout_secs"
        ));
        assert!(matches!(
            from_toml("pending_cancellation_ttl_secs = 0"),
            Err(ConfigError::InvalidValue { key, .. }) if key == "pending_cancellation_ttl_secs"
        ));
        assert!(matches!(
            from_toml("shipping_flat_charge_paise = -1"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            from_toml("max_connections = \"many\""),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_missing_file_is_optional() {
        let config = FulfillmentConfig::load_from(Path::new("/nonexistent/bazaar.toml")).unwrap();
        assert!(config.max_connections >= 1);
    }
}
