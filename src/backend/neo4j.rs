//! Neo4j-backed document store
//!
//! Each durable entry is a `(:CacheEntry)` node. Key fields and the value are
//! stored as canonical JSON strings (serde_json maps serialize with sorted
//! keys), so key equality becomes string equality on indexed properties.
//! `expire_at` is stored as epoch milliseconds and is absent for entries that
//! never expire.
//!
//! Upserts `MERGE` on the four key properties. Neo4j has no composite
//! uniqueness constraint over them, so two first writes racing on one key
//! can leave duplicate nodes. Lookups return one of them; invalidation and
//! sweeps remove all of them.

use crate::backend::{DeleteFilter, DocumentStore, KeyFilter};
use crate::cache::clock::{Clock, SystemClock};
use crate::cache::entry::CacheDocument;
use crate::connection::Neo4jClient;
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use neo4rs::{query, Query, Row};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const RETURN_COLUMNS: &str = "RETURN n.id AS id, n.function AS function, n.args AS args,
        n.ordered_kwargs AS ordered_kwargs, n.kwargs AS kwargs, n.value AS value,
        coalesce(n.expire_at, -1) AS expire_at";

const INDEX_STATEMENTS: [&str; 5] = [
    "CREATE CONSTRAINT cache_entry_id IF NOT EXISTS FOR (n:CacheEntry) REQUIRE n.id IS UNIQUE",
    "CREATE INDEX cache_entry_expire_at IF NOT EXISTS FOR (n:CacheEntry) ON (n.expire_at)",
    "CREATE INDEX cache_entry_kwargs IF NOT EXISTS FOR (n:CacheEntry) ON (n.kwargs)",
    "CREATE INDEX cache_entry_function_ordered_kwargs IF NOT EXISTS \
     FOR (n:CacheEntry) ON (n.function, n.ordered_kwargs)",
    "CREATE INDEX cache_entry_args IF NOT EXISTS FOR (n:CacheEntry) ON (n.args)",
];

/// Document store persisting cache entries as Neo4j nodes
pub struct Neo4jDocumentStore {
    client: Arc<Neo4jClient>,
    clock: Arc<dyn Clock>,
}

impl Neo4jDocumentStore {
    pub fn new(client: Arc<Neo4jClient>) -> Self {
        Self::with_clock(client, Arc::new(SystemClock))
    }

    pub fn with_clock(client: Arc<Neo4jClient>, clock: Arc<dyn Clock>) -> Self {
        Self { client, clock }
    }

    pub fn client(&self) -> &Arc<Neo4jClient> {
        &self.client
    }

    /// Documents matching the property conditions of `filter`, refined
    /// client-side for conditions Cypher cannot express on JSON strings
    async fn fetch(
        &self,
        filter: &KeyFilter,
        include_expired: bool,
        limit: Option<usize>,
    ) -> Result<Vec<(String, CacheDocument)>> {
        let mut conditions = Vec::new();
        if filter.function.is_some() {
            conditions.push("n.function = $function");
        }
        if filter.args.is_some() {
            conditions.push("n.args = $args");
        }
        if filter.ordered_kwargs.is_some() {
            conditions.push("n.ordered_kwargs = $ordered_kwargs");
        }
        if filter.kwargs.is_some() {
            conditions.push("n.kwargs = $kwargs");
        }
        if !include_expired {
            conditions.push("(n.expire_at IS NULL OR n.expire_at > $now)");
        }

        let mut cypher = String::from("MATCH (n:CacheEntry)");
        if !conditions.is_empty() {
            cypher.push_str(" WHERE ");
            cypher.push_str(&conditions.join(" AND "));
        }
        cypher.push(' ');
        cypher.push_str(RETURN_COLUMNS);
        // Kwarg-field conditions are checked after the fetch, so only a
        // property-only filter can be limited server-side
        if let Some(limit) = limit.filter(|_| filter.kwarg_fields.is_empty()) {
            cypher.push_str(&format!(" LIMIT {}", limit));
        }

        let mut q = query(&cypher).param("now", self.clock.now().timestamp_millis());
        if let Some(function) = &filter.function {
            q = q.param("function", function.clone());
        }
        if let Some(args) = &filter.args {
            q = q.param("args", serde_json::to_string(args)?);
        }
        if let Some(ordered) = &filter.ordered_kwargs {
            q = q.param("ordered_kwargs", serde_json::to_string(ordered)?);
        }
        if let Some(kwargs) = &filter.kwargs {
            q = q.param("kwargs", serde_json::to_string(kwargs)?);
        }

        let mut rows = self.rows(q, "fetch cache entries").await?;
        rows.retain(|(_, doc)| filter.matches(doc));
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn rows(&self, q: Query, context: &str) -> Result<Vec<(String, CacheDocument)>> {
        let mut result = self
            .client
            .graph()
            .execute(q)
            .await
            .map_err(|e| CacheError::QueryError(format!("Failed to {}: {}", context, e)))?;

        let mut documents = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| CacheError::QueryError(format!("Failed to read cache row: {}", e)))?
        {
            documents.push(document_from_row(&row)?);
        }

        Ok(documents)
    }

    async fn count(&self, q: Query, context: &str) -> Result<u64> {
        let mut result = self
            .client
            .graph()
            .execute(q)
            .await
            .map_err(|e| CacheError::QueryError(format!("Failed to {}: {}", context, e)))?;

        match result
            .next()
            .await
            .map_err(|e| {
                CacheError::QueryError(format!("Failed to read {} result: {}", context, e))
            })?
        {
            Some(row) => {
                let deleted: i64 = row.get("deleted_count").map_err(|e| {
                    CacheError::QueryError(format!("Failed to extract deleted count: {}", e))
                })?;
                Ok(deleted.max(0) as u64)
            }
            None => Ok(0),
        }
    }
}

#[async_trait]
impl DocumentStore for Neo4jDocumentStore {
    fn name(&self) -> &'static str {
        "neo4j"
    }

    async fn find_one(&self, filter: &KeyFilter) -> Result<Option<CacheDocument>> {
        let mut found = self.fetch(filter, false, Some(1)).await?;
        Ok(found.pop().map(|(_, doc)| doc))
    }

    async fn upsert(&self, document: CacheDocument) -> Result<()> {
        let set_expiry = if document.expire_at.is_some() {
            "SET n.expire_at = $expire_at"
        } else {
            "REMOVE n.expire_at"
        };
        let cypher = format!(
            "MERGE (n:CacheEntry {{function: $function, args: $args,
                    ordered_kwargs: $ordered_kwargs, kwargs: $kwargs}})
             ON CREATE SET n.id = $id
             SET n.value = $value
             {}",
            set_expiry
        );

        let mut q = query(&cypher)
            .param("id", Uuid::new_v4().to_string())
            .param("function", document.function.clone())
            .param("args", serde_json::to_string(&document.args)?)
            .param("ordered_kwargs", serde_json::to_string(&document.ordered_kwargs)?)
            .param("kwargs", serde_json::to_string(&document.kwargs)?)
            .param("value", serde_json::to_string(&document.value)?);
        if let Some(expire_at) = document.expire_at {
            q = q.param("expire_at", expire_at.timestamp_millis());
        }

        self.client
            .graph()
            .run(q)
            .await
            .map_err(|e| CacheError::QueryError(format!("Failed to upsert cache entry: {}", e)))?;

        debug!("Upserted cache entry for {}", document.function);
        Ok(())
    }

    async fn delete_many(&self, filter: &DeleteFilter) -> Result<u64> {
        match filter {
            DeleteFilter::All => {
                let q = query(
                    "MATCH (n:CacheEntry)
                     WITH n, n.id AS id
                     DETACH DELETE n
                     RETURN count(id) AS deleted_count",
                );
                self.count(q, "delete all cache entries").await
            }
            DeleteFilter::Function { function, any_of } => {
                if any_of.is_empty() {
                    return Ok(0);
                }

                let candidates = self
                    .fetch(&KeyFilter::new().function(function.clone()), true, None)
                    .await?;
                let ids: Vec<String> = candidates
                    .into_iter()
                    .filter(|(_, doc)| filter.matches(doc))
                    .map(|(id, _)| id)
                    .collect();
                if ids.is_empty() {
                    return Ok(0);
                }

                let q = query(
                    "MATCH (n:CacheEntry)
                     WHERE n.id IN $ids
                     WITH n, n.id AS id
                     DETACH DELETE n
                     RETURN count(id) AS deleted_count",
                )
                .param("ids", ids);
                self.count(q, "delete cache entries").await
            }
        }
    }

    async fn ensure_indexes(&self) -> Result<()> {
        for statement in INDEX_STATEMENTS {
            self.client.graph().run(query(statement)).await.map_err(|e| {
                CacheError::QueryError(format!("Failed to create cache index: {}", e))
            })?;
        }

        info!("Ensured {} cache entry indexes", INDEX_STATEMENTS.len());
        Ok(())
    }

    async fn sweep_expired(&self) -> Result<u64> {
        let q = query(
            "MATCH (n:CacheEntry)
             WHERE n.expire_at IS NOT NULL AND n.expire_at <= $now
             WITH n, n.id AS id
             DETACH DELETE n
             RETURN count(id) AS deleted_count",
        )
        .param("now", self.clock.now().timestamp_millis());

        self.count(q, "sweep expired cache entries").await
    }
}

fn column(row: &Row, name: &str) -> Result<String> {
    row.get(name).map_err(|e| {
        CacheError::QueryError(format!("Failed to extract cache entry {}: {}", name, e))
    })
}

fn document_from_row(row: &Row) -> Result<(String, CacheDocument)> {
    let id = column(row, "id")?;
    let expire_at: i64 = row.get("expire_at").map_err(|e| {
        CacheError::QueryError(format!("Failed to extract cache entry expire_at: {}", e))
    })?;

    let document = CacheDocument {
        function: column(row, "function")?,
        args: serde_json::from_str(&column(row, "args")?)?,
        ordered_kwargs: serde_json::from_str(&column(row, "ordered_kwargs")?)?,
        kwargs: serde_json::from_str(&column(row, "kwargs")?)?,
        value: serde_json::from_str(&column(row, "value")?)?,
        expire_at: millis_to_datetime(expire_at),
    };

    Ok((id, document))
}

/// Negative values mark entries without expiry
fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    if millis < 0 {
        None
    } else {
        Utc.timestamp_millis_opt(millis).single()
    }
}
