//! Configuration for the cache system

use crate::cache::types::CacheTier;
use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`CacheStore`](crate::cache::CacheStore)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Initial state of the global disable switch.
    /// When set, every lookup behaves as a miss.
    pub disabled: bool,

    /// Run a background TTL sweep against the durable store
    pub enable_ttl_sweeper: bool,

    /// Interval between TTL sweeps
    pub sweep_interval: Duration,

    /// Enable hit/miss counters
    pub enable_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            enable_ttl_sweeper: true,
            // Expired documents may linger up to one interval
            sweep_interval: Duration::from_secs(60),
            enable_metrics: true,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Load overrides from `MEMOSTORE_DISABLED`, `MEMOSTORE_TTL_SWEEPER` and
    /// `MEMOSTORE_SWEEP_INTERVAL_SECS`, reading a `.env` file first
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::default();

        if let Some(disabled) = env_bool("MEMOSTORE_DISABLED")? {
            config.disabled = disabled;
        }
        if let Some(sweeper) = env_bool("MEMOSTORE_TTL_SWEEPER")? {
            config.enable_ttl_sweeper = sweeper;
        }
        if let Ok(raw) = std::env::var("MEMOSTORE_SWEEP_INTERVAL_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                CacheError::ConfigError(format!(
                    "MEMOSTORE_SWEEP_INTERVAL_SECS must be an integer, got {:?}",
                    raw
                ))
            })?;
            config.sweep_interval = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.enable_ttl_sweeper && self.sweep_interval.is_zero() {
            return Err(CacheError::ConfigError(
                "sweep_interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" | "" => Ok(Some(false)),
            _ => Err(CacheError::ConfigError(format!(
                "{} must be a boolean, got {:?}",
                name, raw
            ))),
        },
        Err(_) => Ok(None),
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    disabled: Option<bool>,
    enable_ttl_sweeper: Option<bool>,
    sweep_interval: Option<Duration>,
    enable_metrics: Option<bool>,
}

impl CacheConfigBuilder {
    /// Start with caching disabled
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    /// Enable or disable the background TTL sweep
    pub fn enable_ttl_sweeper(mut self, enable: bool) -> Self {
        self.enable_ttl_sweeper = Some(enable);
        self
    }

    /// Set the TTL sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Enable or disable metrics collection
    pub fn enable_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = Some(enable);
        self
    }

    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            disabled: self.disabled.unwrap_or(defaults.disabled),
            enable_ttl_sweeper: self
                .enable_ttl_sweeper
                .unwrap_or(defaults.enable_ttl_sweeper),
            sweep_interval: self.sweep_interval.unwrap_or(defaults.sweep_interval),
            enable_metrics: self.enable_metrics.unwrap_or(defaults.enable_metrics),
        }
    }
}

/// Per-function memoization settings
///
/// `timeout` is the fast-tier freshness window, or the durable TTL. A fast
/// wrapper without a timeout is rejected when the wrapper is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemoizeOptions {
    pub timeout: Option<Duration>,
    pub fast: bool,
}

impl MemoizeOptions {
    /// Durable tier, expiring after `ttl` (or never, with `None`)
    pub fn durable(ttl: Option<Duration>) -> Self {
        Self {
            timeout: ttl,
            fast: false,
        }
    }

    /// Fast tier with the given freshness window
    pub fn fast(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            fast: true,
        }
    }

    pub fn tier(&self) -> CacheTier {
        if self.fast {
            CacheTier::Fast
        } else {
            CacheTier::Durable
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.fast && self.timeout.is_none() {
            return Err(CacheError::ConfigError(
                "You cannot set fast cache without a timeout".to_string(),
            ));
        }

        Ok(())
    }
}
