//! Neo4j Durable Tier Demo
//!
//! Stores memoized results as `(:CacheEntry)` nodes and shows that a second
//! store over the same database sees them.
//!
//! Usage:
//!   cargo run --example neo4j_backend_demo
//!
//! Environment variables:
//!   NEO4J_URI      - Neo4j connection URI (default: bolt://localhost:7687)
//!   NEO4J_USER     - Neo4j username (default: neo4j)
//!   NEO4J_PASSWORD - Neo4j password (default: password)
//!   NEO4J_DATABASE - Neo4j database name (default: neo4j)

use memostore::{
    CacheConfig, CacheError, CacheStore, CallArgs, KeyFilter, MemoizeOptions, Memoized,
    Neo4jClient, Neo4jDocumentStore,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("=== Neo4j Durable Tier Demo ===");

    let client = Arc::new(Neo4jClient::from_env().await?);
    let health = client.health_check_detailed().await;
    info!("Database status: {:?} ({}ms)", health.status, health.response_time_ms);

    let config = CacheConfig::builder().enable_ttl_sweeper(false).build();
    let durable = Arc::new(Neo4jDocumentStore::new(client.clone()));
    let store = Arc::new(CacheStore::new(durable, config.clone())?);
    store.ensure_indexes().await?;

    let computations = Arc::new(AtomicUsize::new(0));
    let counter = computations.clone();
    let function_id = "demo::group_scores";

    let scores = Memoized::new(
        function_id,
        MemoizeOptions::durable(Some(Duration::from_secs(600))),
        store.clone(),
        move |args: CallArgs| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                let gid: i64 = args.get_as("gid")?.unwrap_or(0);
                Ok::<Vec<i64>, CacheError>(vec![gid * 10, gid * 20, gid * 30])
            }
        },
    )?;

    let call = || CallArgs::new().kwarg("gid", 7).kwarg("show_ineligible", false);
    info!("first:  {:?}", scores.call(call()).await?);
    info!("second: {:?}", scores.call(call()).await?);

    // A second store over the same database shares the durable entries
    let other = CacheStore::new(Arc::new(Neo4jDocumentStore::new(client)), config)?;
    let key = memostore::cache::derive_durable(function_id, &call());
    info!("seen by another store: {:?}", other.get_durable(&key).await?);

    info!("computations: {}", computations.load(Ordering::SeqCst));

    let removed = scores.invalidate(&[KeyFilter::kwarg("gid", 7)]).await?;
    info!("invalidated {} entries", removed);

    Ok(())
}
