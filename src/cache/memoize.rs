//! Memoization wrapper
//!
//! [`Memoized`] wraps an async computation and answers repeated calls from
//! the cache. Per call it:
//!
//! 1. runs the computation directly if the call opted out with
//!    [`CallArgs::no_cache`],
//! 2. derives a fast or durable key and looks it up,
//! 3. treats the lookup as a miss if nothing was found, the store is
//!    disabled, or a fast entry has timed out,
//! 4. on a miss computes, stores the successful result and returns it.
//!
//! Errors from the computation are returned unchanged and nothing is cached
//! for them. Store errors reach the caller through `E: From<CacheError>`.
//! Concurrent misses for one key may each compute; the last write wins.

use crate::backend::KeyFilter;
use crate::cache::{
    config::MemoizeOptions,
    invalidation,
    key::{derive_durable, derive_fast},
    store::CacheStore,
    types::{CacheTier, CallArgs},
};
use crate::error::{CacheError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Qualified identity for a function, `module::path::name`
#[macro_export]
macro_rules! function_id {
    ($name:ident) => {
        concat!(module_path!(), "::", stringify!($name))
    };
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Fast { timeout: Duration },
    Durable { ttl: Option<Duration> },
}

/// A computation wrapped with a cache lookup
pub struct Memoized<F> {
    function_id: String,
    options: MemoizeOptions,
    mode: Mode,
    store: Arc<CacheStore>,
    compute: F,
}

impl<F> Memoized<F> {
    /// Wrap `compute` under `function_id`.
    ///
    /// Fails with [`CacheError::ConfigError`] for a fast wrapper without a
    /// timeout.
    pub fn new(
        function_id: impl Into<String>,
        options: MemoizeOptions,
        store: Arc<CacheStore>,
        compute: F,
    ) -> Result<Self> {
        options.validate()?;

        // validate() guarantees a fast wrapper carries a timeout
        let mode = match options.timeout {
            Some(timeout) if options.fast => Mode::Fast { timeout },
            ttl => Mode::Durable { ttl },
        };

        Ok(Self {
            function_id: function_id.into(),
            options,
            mode,
            store,
            compute,
        })
    }

    pub fn function_id(&self) -> &str {
        &self.function_id
    }

    pub fn options(&self) -> MemoizeOptions {
        self.options
    }

    pub fn tier(&self) -> CacheTier {
        self.options.tier()
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Remove durable entries of this function matching any of `filters`
    pub async fn invalidate(&self, filters: &[KeyFilter]) -> Result<u64> {
        invalidation::invalidate(&self.store, &self.function_id, filters).await
    }

    /// Call through the cache
    pub async fn call<Fut, T, E>(&self, args: CallArgs) -> std::result::Result<T, E>
    where
        F: Fn(CallArgs) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
    {
        if !args.use_cache() {
            debug!("Cache bypassed for {}", self.function_id);
            self.store.record_bypass();
            return (self.compute)(args).await;
        }

        match self.mode {
            Mode::Fast { timeout } => {
                let key = derive_fast(&self.function_id, &args);
                let fresh = self
                    .store
                    .get_fast(&key)
                    .await
                    .filter(|entry| {
                        !self.store.is_disabled() && !self.store.is_timed_out(entry)
                    });

                if let Some(entry) = fresh {
                    debug!("Fast cache hit: {}", key);
                    self.store.record_hit();
                    return Ok(decode(entry.result)?);
                }

                debug!("Fast cache miss: {}", key);
                self.store.record_miss();
                let result = (self.compute)(args).await?;
                self.store.set_fast(key, encode(&result)?, timeout).await;
                Ok(result)
            }
            Mode::Durable { ttl } => {
                let key = derive_durable(&self.function_id, &args);
                let cached = self
                    .store
                    .get_durable(&key)
                    .await?
                    .filter(|_| !self.store.is_disabled());

                if let Some(value) = cached {
                    debug!("Durable cache hit: {}", self.function_id);
                    self.store.record_hit();
                    return Ok(decode(value)?);
                }

                debug!("Durable cache miss: {}", self.function_id);
                self.store.record_miss();
                let result = (self.compute)(args).await?;
                self.store.set_durable(&key, encode(&result)?, ttl).await?;
                Ok(result)
            }
        }
    }

    /// Compute with the cache bypassed and store the result unconditionally
    pub async fn warm<Fut, T, E>(&self, args: CallArgs) -> std::result::Result<T, E>
    where
        F: Fn(CallArgs) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
    {
        match self.mode {
            Mode::Fast { timeout } => {
                let key = derive_fast(&self.function_id, &args);
                let result = (self.compute)(args).await?;
                self.store.set_fast(key, encode(&result)?, timeout).await;
                Ok(result)
            }
            Mode::Durable { ttl } => {
                let key = derive_durable(&self.function_id, &args);
                let result = (self.compute)(args).await?;
                self.store.set_durable(&key, encode(&result)?, ttl).await?;
                Ok(result)
            }
        }
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[test]
    fn test_function_id_macro() {
        assert_eq!(
            function_id!(get_scores),
            concat!(module_path!(), "::get_scores")
        );
    }

    #[test]
    fn test_fast_without_timeout_rejected_at_wrap_time() {
        let store = Arc::new(CacheStore::in_memory());
        let options = MemoizeOptions {
            timeout: None,
            fast: true,
        };

        let wrapped = Memoized::new("f", options, store, |_args: CallArgs| async {
            Ok::<i64, CacheError>(1)
        });
        assert!(matches!(wrapped, Err(CacheError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_durable_memoization_computes_once() {
        let store = Arc::new(CacheStore::in_memory());
        let calls = counter();
        let seen = calls.clone();

        let wrapped = Memoized::new(
            "stats::team_count",
            MemoizeOptions::durable(None),
            store.clone(),
            move |args: CallArgs| {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    let base: i64 = args.get_as("base")?.unwrap_or(0);
                    Ok::<i64, CacheError>(base + 100)
                }
            },
        )
        .unwrap();

        let first: i64 = wrapped.call(CallArgs::new().kwarg("base", 1)).await.unwrap();
        let second: i64 = wrapped.call(CallArgs::new().kwarg("base", 1)).await.unwrap();

        assert_eq!(first, 101);
        assert_eq!(second, 101);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = store.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let store = Arc::new(CacheStore::in_memory());
        let calls = counter();
        let seen = calls.clone();

        let wrapped = Memoized::new(
            "flaky",
            MemoizeOptions::fast(Duration::from_secs(60)),
            store,
            move |_args: CallArgs| {
                let attempt = seen.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(CacheError::Other("boom".to_string()))
                    } else {
                        Ok(attempt as i64)
                    }
                }
            },
        )
        .unwrap();

        let err = wrapped.call::<_, i64, CacheError>(CallArgs::new()).await;
        assert!(matches!(err, Err(CacheError::Other(ref m)) if m == "boom"));

        let ok: i64 = wrapped.call(CallArgs::new()).await.unwrap();
        assert_eq!(ok, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fast_expiry_with_simulated_time() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(CacheStore::in_memory_with_clock(clock.clone()));
        let calls = counter();
        let seen = calls.clone();

        let double = Memoized::new(
            "math::double",
            MemoizeOptions::fast(Duration::from_secs(5)),
            store,
            move |args: CallArgs| {
                seen.fetch_add(1, Ordering::SeqCst);
                async move {
                    let x: i64 = args.positional_as(0)?.unwrap_or(0);
                    Ok::<i64, CacheError>(x * 2)
                }
            },
        )
        .unwrap();

        assert_eq!(double.call::<_, i64, CacheError>(CallArgs::new().arg(3)).await.unwrap(), 6);
        clock.advance(Duration::from_secs(4));
        assert_eq!(double.call::<_, i64, CacheError>(CallArgs::new().arg(3)).await.unwrap(), 6);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(2));
        assert_eq!(double.call::<_, i64, CacheError>(CallArgs::new().arg(3)).await.unwrap(), 6);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
