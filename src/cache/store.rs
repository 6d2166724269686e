//! Two-tier cache store
//!
//! [`CacheStore`] is the only owner of cached entries. It provides:
//! - Durable get/set over a [`DocumentStore`], matched by partial key
//! - A process-local fast tier keyed by [`FastKey`]
//! - Bulk invalidation and a global clear
//! - A background sweep removing expired entries from both tiers
//! - The runtime switch that turns every lookup into a miss

use crate::backend::{DeleteFilter, DocumentStore, KeyFilter, MemoryDocumentStore};
use crate::cache::{
    clock::{Clock, SystemClock},
    config::CacheConfig,
    entry::{CacheDocument, FastEntry},
    key::{DurableKey, FastKey},
    types::CacheStats,
};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    bypasses: AtomicU64,
    stores: AtomicU64,
    invalidations: AtomicU64,
}

/// Cache store shared by every memoized function of a process
pub struct CacheStore {
    config: CacheConfig,

    /// Durable tier backend
    durable: Arc<dyn DocumentStore>,

    /// Fast tier: never shared between processes
    fast: RwLock<HashMap<FastKey, FastEntry>>,

    /// Global disable switch
    disabled: AtomicBool,

    clock: Arc<dyn Clock>,

    counters: Counters,
}

impl CacheStore {
    /// Create a store over `durable` using the wall clock
    pub fn new(durable: Arc<dyn DocumentStore>, config: CacheConfig) -> Result<Self> {
        Self::with_clock(durable, config, Arc::new(SystemClock))
    }

    /// Create a store with an explicit time source
    pub fn with_clock(
        durable: Arc<dyn DocumentStore>,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            "Initializing cache store over {} backend (disabled: {})",
            durable.name(),
            config.disabled
        );

        Ok(Self {
            disabled: AtomicBool::new(config.disabled),
            config,
            durable,
            fast: RwLock::new(HashMap::new()),
            clock,
            counters: Counters::default(),
        })
    }

    /// Store backed by a fresh [`MemoryDocumentStore`] with default settings
    pub fn in_memory() -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self::in_memory_with_clock(clock)
    }

    /// In-memory store where both tiers read time from `clock`
    pub fn in_memory_with_clock(clock: Arc<dyn Clock>) -> Self {
        let durable = Arc::new(MemoryDocumentStore::with_clock(clock.clone()));
        let config = CacheConfig::builder().enable_ttl_sweeper(false).build();

        Self {
            disabled: AtomicBool::new(config.disabled),
            config,
            durable,
            fast: RwLock::new(HashMap::new()),
            clock,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn durable(&self) -> &Arc<dyn DocumentStore> {
        &self.durable
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ----- global switch -----

    /// Force every lookup to miss (`true`) or restore normal lookups
    pub fn set_disabled(&self, disabled: bool) {
        info!("Cache {}", if disabled { "disabled" } else { "enabled" });
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    // ----- durable tier -----

    /// Value of the first durable entry matching the key's lookup fields
    pub async fn get_durable(&self, key: &DurableKey) -> Result<Option<Value>> {
        let found = self.durable.find_one(&key.lookup_filter()).await?;
        Ok(found.map(|doc| doc.value))
    }

    /// Upsert `value` under `key`, expiring `ttl` from now if given
    pub async fn set_durable(
        &self,
        key: &DurableKey,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let document = match ttl {
            Some(ttl) => CacheDocument::with_ttl(key, value, self.now(), ttl),
            None => CacheDocument::new(key, value, None),
        };

        self.durable.upsert(document).await?;
        self.count(&self.counters.stores);
        debug!("Stored durable entry for {}", key.function);
        Ok(())
    }

    /// Delete durable entries of `function` matching any filter in `any_of`
    pub async fn delete_matching(&self, function: &str, any_of: &[KeyFilter]) -> Result<u64> {
        let filter = DeleteFilter::Function {
            function: function.to_string(),
            any_of: any_of.to_vec(),
        };

        let removed = self.durable.delete_many(&filter).await?;
        if self.config.enable_metrics {
            self.counters.invalidations.fetch_add(removed, Ordering::Relaxed);
        }
        Ok(removed)
    }

    /// Create the durable store's indexes
    pub async fn ensure_indexes(&self) -> Result<()> {
        self.durable.ensure_indexes().await
    }

    /// Start the background sweep if the config enables it
    ///
    /// Every `sweep_interval` the task runs [`CacheStore::sweep_expired`].
    /// Abort the returned handle to stop it.
    pub fn start_ttl_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.config.enable_ttl_sweeper {
            return None;
        }

        let store = Arc::clone(self);
        let interval = self.config.sweep_interval;
        info!(
            "Starting TTL sweeper for {} store (interval: {:?})",
            store.durable.name(),
            interval
        );

        Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                if let Err(e) = store.sweep_expired().await {
                    warn!("TTL sweep failed: {}", e);
                }
            }
        }))
    }

    /// Remove expired durable documents and timed-out fast entries.
    ///
    /// Returns the number of durable documents removed.
    pub async fn sweep_expired(&self) -> Result<u64> {
        let pruned = self.prune_fast().await;
        let removed = self.durable.sweep_expired().await?;

        if removed > 0 || pruned > 0 {
            debug!(
                "TTL sweep removed {} durable documents and {} fast entries",
                removed, pruned
            );
        }
        Ok(removed)
    }

    // ----- fast tier -----

    /// Raw fast entry; freshness is the caller's decision
    pub async fn get_fast(&self, key: &FastKey) -> Option<FastEntry> {
        self.fast.read().await.get(key).cloned()
    }

    /// Store `value` with `set_time = now`
    pub async fn set_fast(&self, key: FastKey, value: Value, timeout: Duration) {
        debug!("Stored fast entry {}", key);
        let entry = FastEntry::new(value, timeout, self.now());
        self.fast.write().await.insert(key, entry);
        self.count(&self.counters.stores);
    }

    /// Drop fast entries that have timed out, returning how many were dropped
    pub async fn prune_fast(&self) -> usize {
        let now = self.now();
        let mut fast = self.fast.write().await;
        let before = fast.len();
        fast.retain(|_, entry| !entry.is_timed_out(now));
        before - fast.len()
    }

    /// Whether `entry` is older than its timeout right now
    pub fn is_timed_out(&self, entry: &FastEntry) -> bool {
        entry.is_timed_out(self.now())
    }

    // ----- both tiers -----

    /// Delete every durable document and empty the fast tier
    pub async fn clear_all(&self) -> Result<()> {
        let removed = self.durable.delete_many(&DeleteFilter::All).await?;

        let mut fast = self.fast.write().await;
        let fast_count = fast.len();
        fast.clear();

        info!(
            "Cleared cache ({} durable, {} fast entries)",
            removed, fast_count
        );
        Ok(())
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            bypasses: self.counters.bypasses.load(Ordering::Relaxed),
            stores: self.counters.stores.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            fast_entries: self.fast.read().await.len(),
        }
    }

    pub(crate) fn record_hit(&self) {
        self.count(&self.counters.hits);
    }

    pub(crate) fn record_miss(&self) {
        self.count(&self.counters.misses);
    }

    pub(crate) fn record_bypass(&self) {
        self.count(&self.counters.bypasses);
    }

    fn count(&self, counter: &AtomicU64) {
        if self.config.enable_metrics {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}
