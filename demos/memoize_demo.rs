//! Memoization Demo
//!
//! Wraps two slow computations with the in-memory cache: one on the fast
//! tier, one on the durable tier. Shows hits, the per-call bypass,
//! invalidation and warming.
//!
//! Usage:
//!   cargo run --example memoize_demo

use memostore::{
    invalidate, warm, CacheError, CacheStore, CallArgs, KeyFilter, MemoizeOptions, Memoized,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, Level};

async fn slow_sum(args: CallArgs) -> Result<i64, CacheError> {
    tokio::time::sleep(Duration::from_millis(200)).await;
    let total = args
        .args()
        .iter()
        .filter_map(|v| v.as_i64())
        .sum();
    Ok(total)
}

async fn team_registrations(args: CallArgs) -> Result<Vec<String>, CacheError> {
    tokio::time::sleep(Duration::from_millis(200)).await;
    let event: String = args.get_as("event_id")?.unwrap_or_default();
    let team: String = args.get_as("team_id")?.unwrap_or_default();
    Ok(vec![format!("{}/{}/alice", event, team), format!("{}/{}/bob", event, team)])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("=== Memoization Demo ===");

    let store = Arc::new(CacheStore::in_memory());

    info!("\n--- Fast tier (5s window) ---");
    let sum = Memoized::new(
        memostore::function_id!(slow_sum),
        MemoizeOptions::fast(Duration::from_secs(5)),
        store.clone(),
        slow_sum,
    )?;

    for label in ["first call", "second call"] {
        let start = Instant::now();
        let total: i64 = sum.call(CallArgs::new().arg(1).arg(2).arg(3)).await?;
        info!("{}: {} in {:?}", label, total, start.elapsed());
    }

    let start = Instant::now();
    let total: i64 = sum.call(CallArgs::new().arg(1).arg(2).arg(3).no_cache()).await?;
    info!("bypassed call: {} in {:?}", total, start.elapsed());

    info!("\n--- Durable tier ---");
    let function_id = memostore::function_id!(team_registrations);
    let registrations = Memoized::new(
        function_id,
        MemoizeOptions::durable(Some(Duration::from_secs(3600))),
        store.clone(),
        team_registrations,
    )?;

    let call = || CallArgs::new().kwarg("event_id", "e1").kwarg("team_id", "t1");
    let names: Vec<String> = registrations.call(call()).await?;
    info!("computed: {:?}", names);
    let names: Vec<String> = registrations.call(call()).await?;
    info!("cached:   {:?}", names);

    let removed = invalidate(&store, function_id, &[KeyFilter::kwarg("event_id", "e1")]).await?;
    info!("invalidated {} entries for event e1", removed);

    let warmed: Vec<String> = warm(&store, function_id, call(), team_registrations).await?;
    info!("warmed:   {:?}", warmed);

    let stats = store.stats().await;
    info!("\n{}", stats);

    Ok(())
}
