//! Bulk invalidation of durable entries
//!
//! A filter names a subset of a function's key fields. An entry is removed
//! when it belongs to the function and matches at least one filter:
//!
//! ```rust
//! use memostore::backend::KeyFilter;
//! use memostore::cache::{invalidate, CacheStore};
//!
//! # async fn example() -> memostore::Result<()> {
//! let store = CacheStore::in_memory();
//! let removed = invalidate(
//!     &store,
//!     "stats::team_registrations",
//!     &[KeyFilter::kwarg("event_id", "wc2026")],
//! )
//! .await?;
//! println!("Removed {} entries", removed);
//! # Ok(())
//! # }
//! ```
//!
//! The fast tier is never touched; its entries age out on their timeout.

use crate::backend::KeyFilter;
use crate::cache::store::CacheStore;
use crate::error::Result;
use tracing::{info, warn};

/// Delete durable entries of `function` matching any of `filters`.
///
/// An empty filter list removes nothing. Returns the number of entries
/// removed.
pub async fn invalidate(store: &CacheStore, function: &str, filters: &[KeyFilter]) -> Result<u64> {
    if filters.is_empty() {
        warn!(
            "Invalidation of {} called without filters; nothing removed",
            function
        );
        return Ok(0);
    }

    let removed = store.delete_matching(function, filters).await?;
    info!(
        "Invalidated {} cache entries for {} ({} filters)",
        removed,
        function,
        filters.len()
    );

    Ok(removed)
}
