//! # memostore
//!
//! A keyed result cache for expensive computations, with a durable tier in a
//! document store and a fast tier in process memory.
//!
//! ## Features
//!
//! - Memoization wrapper with per-call `cache=false` bypass
//! - Durable entries shared between processes, with optional TTL
//! - Fast in-process entries with a freshness window
//! - Bulk invalidation by partial key
//! - Cache warming and a runtime disable switch
//! - Async-first design using tokio
//!
//! ## Memoizing a function
//!
//! ```rust
//! use memostore::{CacheError, CacheStore, CallArgs, MemoizeOptions, Memoized};
//! use std::sync::Arc;
//!
//! # async fn example() -> memostore::Result<()> {
//! let store = Arc::new(CacheStore::in_memory());
//!
//! let team_count = Memoized::new(
//!     memostore::function_id!(team_count),
//!     MemoizeOptions::durable(None),
//!     store,
//!     |args: CallArgs| async move {
//!         let event: String = args.get_as("event_id")?.unwrap_or_default();
//!         Ok::<usize, CacheError>(event.len())
//!     },
//! )?;
//!
//! let count: usize = team_count.call(CallArgs::new().kwarg("event_id", "e1")).await?;
//! // Force a recomputation
//! let fresh: usize = team_count
//!     .call(CallArgs::new().kwarg("event_id", "e1").no_cache())
//!     .await?;
//! assert_eq!(count, fresh);
//! # Ok(())
//! # }
//! ```
//!
//! ## Neo4j Durable Tier
//!
//! Entries are stored as `(:CacheEntry)` nodes. Create the indexes once,
//! then share the store between wrappers:
//!
//! ```no_run
//! use memostore::{CacheConfig, CacheStore, Neo4jClient, Neo4jDocumentStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Neo4jClient::new(
//!         "bolt://localhost:7687",
//!         "neo4j",
//!         "password",
//!         "neo4j"
//!     ).await?;
//!
//!     let durable = Arc::new(Neo4jDocumentStore::new(Arc::new(client)));
//!     let store = Arc::new(CacheStore::new(durable, CacheConfig::from_env()?)?);
//!     store.ensure_indexes().await?;
//!     let _sweeper = store.start_ttl_sweeper();
//!     Ok(())
//! }
//! ```
//!
//! ## Health Check
//!
//! ```no_run
//! use memostore::Neo4jClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Neo4jClient::from_env().await?;
//!
//!     let result = client.health_check_detailed().await;
//!     println!("Status: {:?}", result.status);
//!     println!("Response time: {}ms", result.response_time_ms);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cache;
pub mod connection;
pub mod error;

// Re-export main types for convenience
pub use backend::{
    DeleteFilter, DocumentStore, KeyFilter, MemoryDocumentStore, Neo4jDocumentStore,
};
pub use cache::{
    invalidate, warm, CacheConfig, CacheConfigBuilder, CacheStats, CacheStore, CacheTier,
    CallArgs, DurableKey, FastKey, MemoizeOptions, Memoized,
};
pub use connection::{HealthCheckResult, HealthStatus, Neo4jClient, Neo4jConfig};
pub use error::{CacheError, Result};
