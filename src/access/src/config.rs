//! Engine configuration
//!
//! Environment variables:
//! - `SITE_ACCESS_CACHE_ENABLED` - Enable the grant cache (default: false)
//! - `SITE_ACCESS_CACHE_TTL_SECS` - Grant cache TTL in seconds (default: 30)
//! - `SITE_ACCESS_CACHE_MAX_ENTRIES` - Grant cache capacity (default: 10000)
//! - `SITE_ACCESS_METRICS_ENABLED` - Collect decision counters (default: true)

use crate::cache::{DEFAULT_CACHE_TTL, DEFAULT_MAX_ENTRIES};
use crate::error::{AccessError, Result};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub const ENV_CACHE_ENABLED: &str = "SITE_ACCESS_CACHE_ENABLED";
pub const ENV_CACHE_TTL_SECS: &str = "SITE_ACCESS_CACHE_TTL_SECS";
pub const ENV_CACHE_MAX_ENTRIES: &str = "SITE_ACCESS_CACHE_MAX_ENTRIES";
pub const ENV_METRICS_ENABLED: &str = "SITE_ACCESS_METRICS_ENABLED";

/// Access engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessConfig {
    /// Cache resolved grants per user
    pub enable_cache: bool,

    /// Time-to-live for cached grants
    pub cache_ttl: Duration,

    /// Maximum number of cached users
    pub max_cache_entries: usize,

    /// Collect decision counters
    pub enable_metrics: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            enable_cache: false,
            cache_ttl: DEFAULT_CACHE_TTL,
            max_cache_entries: DEFAULT_MAX_ENTRIES,
            enable_metrics: true,
        }
    }
}

impl AccessConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Missing keys fall back to defaults. Present but unparsable values
    /// are a configuration error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            enable_cache: parse_flag(&lookup, ENV_CACHE_ENABLED)?.unwrap_or(defaults.enable_cache),
            cache_ttl: parse_value::<u64, _>(&lookup, ENV_CACHE_TTL_SECS)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            max_cache_entries: parse_value(&lookup, ENV_CACHE_MAX_ENTRIES)?
                .unwrap_or(defaults.max_cache_entries),
            enable_metrics: parse_flag(&lookup, ENV_METRICS_ENABLED)?
                .unwrap_or(defaults.enable_metrics),
        };

        config.validate()?;

        info!(
            "Access configuration: cache={}, cache_ttl={}s, max_cache_entries={}, metrics={}",
            config.enable_cache,
            config.cache_ttl.as_secs(),
            config.max_cache_entries,
            config.enable_metrics
        );

        Ok(config)
    }

    /// Enable the grant cache with the given TTL
    pub fn with_cache(mut self, ttl: Duration) -> Self {
        self.enable_cache = true;
        self.cache_ttl = ttl;
        self
    }

    /// Check settings are usable
    pub fn validate(&self) -> Result<()> {
        if self.enable_cache {
            if self.cache_ttl.is_zero() {
                return Err(AccessError::Configuration(
                    "cache TTL must be greater than zero".to_string(),
                ));
            }
            if self.max_cache_entries == 0 {
                return Err(AccessError::Configuration(
                    "cache capacity must be greater than zero".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn parse_value<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AccessError::Configuration(format!("invalid value for {}: {:?}", key, raw))),
    }
}

fn parse_flag<F>(lookup: &F, key: &str) -> Result<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(AccessError::Configuration(format!(
                "invalid value for {}: {:?}",
                key, raw
            ))),
        },
    }
}
