//! Durable document stores
//!
//! The durable tier talks to its store only through [`DocumentStore`]. Two
//! implementations ship with the crate:
//!
//! - [`MemoryDocumentStore`]: an in-process document store, used in tests and
//!   single-process deployments
//! - [`Neo4jDocumentStore`]: `(:CacheEntry)` nodes in a Neo4j database
//!
//! Stores expire documents passively. Reads treat a document past its
//! `expire_at` as gone, and [`DocumentStore::sweep_expired`] removes such
//! documents physically. The sweep is driven by
//! [`CacheStore::start_ttl_sweeper`](crate::cache::CacheStore::start_ttl_sweeper),
//! never by the cache's own read and write path.

pub mod filter;
pub mod memory;
pub mod neo4j;

pub use filter::{DeleteFilter, KeyFilter};
pub use memory::MemoryDocumentStore;
pub use neo4j::Neo4jDocumentStore;

use crate::cache::entry::CacheDocument;
use crate::error::Result;
use async_trait::async_trait;

/// Operations the durable tier needs from a document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// First unexpired document matching `filter`
    async fn find_one(&self, filter: &KeyFilter) -> Result<Option<CacheDocument>>;

    /// Replace the document with the same full key, or insert it
    async fn upsert(&self, document: CacheDocument) -> Result<()>;

    /// Delete every selected document, returning how many were removed
    async fn delete_many(&self, filter: &DeleteFilter) -> Result<u64>;

    /// Create the lookup and expiry indexes if they are missing
    async fn ensure_indexes(&self) -> Result<()>;

    /// Remove documents whose expiry has passed
    async fn sweep_expired(&self) -> Result<u64>;
}
