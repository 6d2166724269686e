//! Core type definitions for the cache system

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Arguments of a memoized call
///
/// Positional arguments keep their order. Keyword arguments may be supplied in
/// any order; setting the same name twice keeps the last value. A keyword
/// argument whose value is JSON `null` counts as absent when keys are derived.
#[derive(Debug, Clone, PartialEq)]
pub struct CallArgs {
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
    use_cache: bool,
}

impl Default for CallArgs {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            kwargs: Vec::new(),
            use_cache: true,
        }
    }
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Append a positional argument of any serializable type
    pub fn try_arg<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let value = serde_json::to_value(value)?;
        Ok(self.arg(value))
    }

    /// Set a keyword argument
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.kwargs.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.kwargs.push((name, value)),
        }
        self
    }

    /// Set a keyword argument of any serializable type
    pub fn try_kwarg<T: Serialize + ?Sized>(
        self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self> {
        let value = serde_json::to_value(value)?;
        Ok(self.kwarg(name, value))
    }

    /// Set an optional keyword argument; `None` is stored as `null`
    pub fn opt_kwarg<V: Into<Value>>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.kwarg(name, v),
            None => self.kwarg(name, Value::Null),
        }
    }

    /// Bypass the cache for this call (the reserved `cache=false` option)
    pub fn no_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Whether this call may be served from the cache
    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Keyword arguments as supplied, including `null` values
    pub fn kwargs(&self) -> &[(String, Value)] {
        &self.kwargs
    }

    /// Keyword arguments with `null` values removed, in caller order
    pub fn present_kwargs(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.kwargs
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Positional argument at `index`
    pub fn positional(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Keyword argument by name (`null` counts as absent)
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.kwargs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
            .filter(|v| !v.is_null())
    }

    /// Decode a positional argument
    pub fn positional_as<T: DeserializeOwned>(&self, index: usize) -> Result<Option<T>> {
        self.positional(index)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(Into::into)
    }

    /// Decode a keyword argument
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.get(name)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(Into::into)
    }
}

/// Storage tier a memoized function uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    /// In-process map, lives as long as the process
    Fast,

    /// Document store with passive TTL expiry
    Durable,
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheTier::Fast => write!(f, "fast"),
            CacheTier::Durable => write!(f, "durable"),
        }
    }
}

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,

    /// Lookups that had to compute
    pub misses: u64,

    /// Calls made with caching bypassed
    pub bypasses: u64,

    /// Results written to either tier
    pub stores: u64,

    /// Durable documents removed by invalidation
    pub invalidations: u64,

    /// Entries currently held by the fast tier
    pub fast_entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, bypasses: {}, stores: {}, \
             invalidations: {}, fast_entries: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.bypasses,
            self.stores,
            self.invalidations,
            self.fast_entries
        )
    }
}
