//! Service configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//! Every loader also has a `from_lookup` form so tests can feed values
//! without touching the process environment.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Tuning for the stock ledger and revenue services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// How many times a mutation that lost the version compare-and-set is
    /// retried before `Conflict` is returned.
    pub max_conflict_retries: u32,

    /// Page size used when a history query does not name one.
    pub default_page_size: u32,

    /// Largest page size a history query may ask for.
    pub max_page_size: u32,

    /// Lifetime of cached revenue answers. Zero disables the cache.
    pub revenue_cache_ttl: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            max_conflict_retries: 3,
            default_page_size: 20,
            max_page_size: 100,
            revenue_cache_ttl: Duration::ZERO,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = LedgerConfig::default();

        let config = LedgerConfig {
            max_conflict_retries: parse_var(
                &lookup,
                "STOCKROOM_MAX_CONFLICT_RETRIES",
                defaults.max_conflict_retries,
            )?,
            default_page_size: parse_var(
                &lookup,
                "STOCKROOM_DEFAULT_PAGE_SIZE",
                defaults.default_page_size,
            )?,
            max_page_size: parse_var(&lookup, "STOCKROOM_MAX_PAGE_SIZE", defaults.max_page_size)?,
            revenue_cache_ttl: Duration::from_secs(parse_var(
                &lookup,
                "STOCKROOM_REVENUE_CACHE_TTL_SECS",
                0u64,
            )?),
        };

        if config.max_page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "STOCKROOM_MAX_PAGE_SIZE".to_string(),
            ));
        }
        if config.default_page_size == 0 || config.default_page_size > config.max_page_size {
            return Err(ConfigError::InvalidValue(
                "STOCKROOM_DEFAULT_PAGE_SIZE".to_string(),
            ));
        }

        Ok(config)
    }

    /// Sets the revenue cache lifetime.
    pub fn revenue_cache_ttl(mut self, ttl: Duration) -> Self {
        self.revenue_cache_ttl = ttl;
        self
    }

    /// Sets the conflict retry budget.
    pub fn max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }
}

/// Reads `key` through `lookup`, falling back to `default` when unset.
pub(crate) fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
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
        let config = LedgerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.max_conflict_retries, 3);
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.revenue_cache_ttl, Duration::ZERO);
    }

    #[test]
    fn test_overrides() {
        let config = LedgerConfig::from_lookup(lookup(&[
            ("STOCKROOM_MAX_CONFLICT_RETRIES", "7"),
            ("STOCKROOM_REVENUE_CACHE_TTL_SECS", " 30 "),
        ]))
        .unwrap();
        assert_eq!(config.max_conflict_retries, 7);
        assert_eq!(config.revenue_cache_ttl, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_values() {
        let err = LedgerConfig::from_lookup(lookup(&[("STOCKROOM_MAX_PAGE_SIZE", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key) if key == "STOCKROOM_MAX_PAGE_SIZE"));

        let err = LedgerConfig::from_lookup(lookup(&[
            ("STOCKROOM_DEFAULT_PAGE_SIZE", "50"),
            ("STOCKROOM_MAX_PAGE_SIZE", "10"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key) if key == "STOCKROOM_DEFAULT_PAGE_SIZE"));
    }
}
