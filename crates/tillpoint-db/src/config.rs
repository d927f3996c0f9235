//! # Engine Configuration
//!
//! Runtime settings for the database and the checkout rules, loaded from
//! `TILLPOINT_*` environment variables over defaults.
//!
//! ## Environment Variables
//! ```text
//! TILLPOINT_DB_PATH                    ./tillpoint.db
//! TILLPOINT_MAX_CONNECTIONS            5
//! TILLPOINT_TAX_RATE                   0       (percent, e.g. "8.25")
//! TILLPOINT_DISCOUNT_TOLERANCE_CENTS   1
//! TILLPOINT_ENFORCE_PAYMENT_TOTAL      false
//! TILLPOINT_ALLOW_MANUAL_DISCOUNTS     true
//! ```

use std::env;
use std::path::PathBuf;

use tillpoint_core::validation::validate_tax_rate_bps;
use tillpoint_core::{Money, TaxRate};

use crate::pool::DbConfig;

/// Settings for the transactional services.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of pooled connections.
    pub max_connections: u32,

    /// Flat tax applied to lines that do not carry a tax amount.
    pub tax_rate: TaxRate,

    /// How far a submitted promotion discount may drift from the recomputed one.
    pub discount_tolerance: Money,

    /// Reject checkouts whose payments do not cover the sale total.
    pub enforce_payment_total: bool,

    /// Accept line discounts that are not backed by a promotion.
    pub allow_manual_discounts: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_path: PathBuf::from("./tillpoint.db"),
            max_connections: 5,
            tax_rate: TaxRate::zero(),
            discount_tolerance: Money::from_cents(1),
            enforce_payment_total: false,
            allow_manual_discounts: true,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// absent keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = EngineConfig::default();

        let database_path = lookup("TILLPOINT_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);

        let max_connections = match lookup("TILLPOINT_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::InvalidValue("TILLPOINT_MAX_CONNECTIONS".to_string()))?,
            None => defaults.max_connections,
        };

        let tax_rate = match lookup("TILLPOINT_TAX_RATE") {
            Some(raw) => parse_tax_rate(&raw)
                .ok_or_else(|| ConfigError::InvalidValue("TILLPOINT_TAX_RATE".to_string()))?,
            None => defaults.tax_rate,
        };

        let discount_tolerance = match lookup("TILLPOINT_DISCOUNT_TOLERANCE_CENTS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|c| *c >= 0)
                .map(Money::from_cents)
                .ok_or_else(|| {
                    ConfigError::InvalidValue("TILLPOINT_DISCOUNT_TOLERANCE_CENTS".to_string())
                })?,
            None => defaults.discount_tolerance,
        };

        let enforce_payment_total = match lookup("TILLPOINT_ENFORCE_PAYMENT_TOTAL") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidValue("TILLPOINT_ENFORCE_PAYMENT_TOTAL".to_string())
            })?,
            None => defaults.enforce_payment_total,
        };

        let allow_manual_discounts = match lookup("TILLPOINT_ALLOW_MANUAL_DISCOUNTS") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidValue("TILLPOINT_ALLOW_MANUAL_DISCOUNTS".to_string())
            })?,
            None => defaults.allow_manual_discounts,
        };

        Ok(EngineConfig {
            database_path,
            max_connections,
            tax_rate,
            discount_tolerance,
            enforce_payment_total,
            allow_manual_discounts,
        })
    }

    /// Pool settings for this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone()).max_connections(self.max_connections)
    }
}

fn parse_tax_rate(raw: &str) -> Option<TaxRate> {
    let pct = raw.trim().parse::<f64>().ok()?;
    if !pct.is_finite() || pct < 0.0 {
        return None;
    }
    let rate = TaxRate::from_percentage(pct);
    validate_tax_rate_bps(rate.bps()).ok()?;
    Some(rate)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.discount_tolerance.cents(), 1);
        assert!(!config.enforce_payment_total);
        assert!(config.allow_manual_discounts);
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("TILLPOINT_DB_PATH", "/tmp/pos.db"),
            ("TILLPOINT_MAX_CONNECTIONS", "8"),
            ("TILLPOINT_TAX_RATE", "8.25"),
            ("TILLPOINT_DISCOUNT_TOLERANCE_CENTS", "0"),
            ("TILLPOINT_ENFORCE_PAYMENT_TOTAL", "true"),
            ("TILLPOINT_ALLOW_MANUAL_DISCOUNTS", "off"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/pos.db"));
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.tax_rate.bps(), 825);
        assert_eq!(config.discount_tolerance, Money::zero());
        assert!(config.enforce_payment_total);
        assert!(!config.allow_manual_discounts);
        assert_eq!(config.db_config().max_connections, 8);
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = EngineConfig::from_lookup(lookup(&[("TILLPOINT_TAX_RATE", "lots")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for TILLPOINT_TAX_RATE");

        assert!(EngineConfig::from_lookup(lookup(&[("TILLPOINT_TAX_RATE", "150")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[("TILLPOINT_MAX_CONNECTIONS", "0")])).is_err());
        assert!(
            EngineConfig::from_lookup(lookup(&[("TILLPOINT_ENFORCE_PAYMENT_TOTAL", "maybe")]))
                .is_err()
        );
    }
}
