//! # Memoization Cache
//!
//! Memoizes expensive computations keyed by their call arguments, across a
//! process-local fast tier and a shared durable tier.
//!
//! ## Features
//!
//! - **Durable tier**: results stored as documents in a [`DocumentStore`],
//!   shared between processes, with optional TTL
//! - **Fast tier**: in-process map with a per-function freshness window
//! - **Per-call bypass**: [`CallArgs::no_cache`] always recomputes
//! - **Bulk invalidation**: remove entries by partial key
//! - **Warming**: recompute and overwrite entries ahead of readers
//! - **Global switch**: [`CacheStore::set_disabled`] turns every lookup into a miss
//!
//! ## Example
//!
//! ```rust
//! use memostore::cache::{CacheStore, CallArgs, MemoizeOptions, Memoized};
//! use memostore::CacheError;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> memostore::Result<()> {
//! let store = Arc::new(CacheStore::in_memory());
//!
//! let double = Memoized::new(
//!     "math::double",
//!     MemoizeOptions::fast(Duration::from_secs(5)),
//!     store,
//!     |args: CallArgs| async move {
//!         let x: i64 = args.positional_as(0)?.unwrap_or(0);
//!         Ok::<i64, CacheError>(x * 2)
//!     },
//! )?;
//!
//! assert_eq!(double.call(CallArgs::new().arg(3)).await?, 6);
//! // Served from the fast tier
//! assert_eq!(double.call(CallArgs::new().arg(3)).await?, 6);
//! # Ok(())
//! # }
//! ```
//!
//! [`DocumentStore`]: crate::backend::DocumentStore

pub mod clock;
pub mod config;
pub mod entry;
pub mod invalidation;
pub mod key;
pub mod memoize;
pub mod store;
pub mod types;
pub mod warm;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, CacheConfigBuilder, MemoizeOptions};
pub use entry::{CacheDocument, FastEntry};
pub use invalidation::invalidate;
pub use key::{derive_durable, derive_fast, DurableKey, FastKey, ARGS_FIELD};
pub use memoize::Memoized;
pub use store::CacheStore;
pub use types::{CacheStats, CacheTier, CallArgs};
pub use warm::warm;
