//! In-process document store

use crate::backend::{DeleteFilter, DocumentStore, KeyFilter};
use crate::cache::clock::{Clock, SystemClock};
use crate::cache::entry::CacheDocument;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Index names created by [`DocumentStore::ensure_indexes`]
pub const INDEX_NAMES: [&str; 4] = ["expire_at", "kwargs", "function_ordered_kwargs", "args"];

struct StoredDocument {
    id: Uuid,
    document: CacheDocument,
}

/// Document store held in process memory
///
/// Documents are scanned linearly in insertion order, so `find_one` returns
/// the oldest match.
pub struct MemoryDocumentStore {
    documents: RwLock<Vec<StoredDocument>>,
    indexes: RwLock<BTreeSet<String>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store that reads expiry against `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            indexes: RwLock::new(BTreeSet::new()),
            clock,
        }
    }

    /// Number of stored documents, expired ones included
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Names of the indexes created so far
    pub async fn index_names(&self) -> Vec<String> {
        self.indexes.read().await.iter().cloned().collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn find_one(&self, filter: &KeyFilter) -> Result<Option<CacheDocument>> {
        let now = self.clock.now();
        let documents = self.documents.read().await;

        Ok(documents
            .iter()
            .map(|stored| &stored.document)
            .find(|doc| !doc.is_expired(now) && filter.matches(doc))
            .cloned())
    }

    async fn upsert(&self, document: CacheDocument) -> Result<()> {
        let mut documents = self.documents.write().await;

        match documents.iter_mut().find(|s| s.document.same_key(&document)) {
            Some(existing) => {
                debug!("Replacing cache document {}", existing.id);
                existing.document = document;
            }
            None => {
                let id = Uuid::new_v4();
                debug!("Inserting cache document {}", id);
                documents.push(StoredDocument { id, document });
            }
        }

        Ok(())
    }

    async fn delete_many(&self, filter: &DeleteFilter) -> Result<u64> {
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|stored| !filter.matches(&stored.document));
        Ok((before - documents.len()) as u64)
    }

    async fn ensure_indexes(&self) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        for name in INDEX_NAMES {
            indexes.insert(name.to_string());
        }
        Ok(())
    }

    async fn sweep_expired(&self) -> Result<u64> {
        let now = self.clock.now();
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|stored| !stored.document.is_expired(now));
        Ok((before - documents.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::cache::key::derive_durable;
    use crate::cache::types::CallArgs;
    use serde_json::json;
    use std::time::Duration;

    fn document(gid: i64, value: i64) -> CacheDocument {
        let key = derive_durable("stats::group_scores", &CallArgs::new().kwarg("gid", gid));
        CacheDocument::new(&key, json!(value), None)
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_key() {
        let store = MemoryDocumentStore::new();

        store.upsert(document(1, 10)).await.unwrap();
        store.upsert(document(1, 20)).await.unwrap();
        store.upsert(document(2, 30)).await.unwrap();

        assert_eq!(store.len().await, 2);

        let key = derive_durable("stats::group_scores", &CallArgs::new().kwarg("gid", 1));
        let found = store.find_one(&key.lookup_filter()).await.unwrap().unwrap();
        assert_eq!(found.value, json!(20));
    }

    #[tokio::test]
    async fn test_expired_documents_are_invisible_then_swept() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = MemoryDocumentStore::with_clock(clock.clone());

        let key = derive_durable("f", &CallArgs::new().arg(1));
        let doc = CacheDocument::with_ttl(&key, json!("v"), clock.now(), Duration::from_secs(60));
        store.upsert(doc).await.unwrap();
        store.upsert(document(5, 5)).await.unwrap();

        assert!(store.find_one(&key.lookup_filter()).await.unwrap().is_some());

        clock.advance(Duration::from_secs(61));
        assert!(store.find_one(&key.lookup_filter()).await.unwrap().is_none());
        assert_eq!(store.len().await, 2);

        assert_eq!(store.sweep_expired().await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_many() {
        let store = MemoryDocumentStore::new();
        for gid in 0..4 {
            store.upsert(document(gid, gid)).await.unwrap();
        }

        let removed = store
            .delete_many(&DeleteFilter::Function {
                function: "stats::group_scores".to_string(),
                any_of: vec![KeyFilter::kwarg("gid", 0), KeyFilter::kwarg("gid", 3)],
            })
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.len().await, 2);

        assert_eq!(store.delete_many(&DeleteFilter::All).await.unwrap(), 2);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_ensure_indexes_is_idempotent() {
        let store = MemoryDocumentStore::new();
        store.ensure_indexes().await.unwrap();
        store.ensure_indexes().await.unwrap();

        let names = store.index_names().await;
        assert_eq!(names.len(), INDEX_NAMES.len());
        assert!(names.contains(&"expire_at".to_string()));
    }
}
