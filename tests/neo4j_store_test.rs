//! Integration tests for the Neo4j document store
//!
//! These tests require a running Neo4j instance.
//! Run with: cargo test --test neo4j_store_test -- --ignored

use memostore::cache::{derive_durable, CacheDocument};
use memostore::{
    CacheConfig, CacheError, CacheStore, CallArgs, DeleteFilter, DocumentStore, KeyFilter,
    MemoizeOptions, Memoized, Neo4jClient, Neo4jDocumentStore,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// Helper function to get Neo4j connection details from environment or use defaults
fn get_neo4j_config() -> (String, String, String, String) {
    let uri = std::env::var("NEO4J_URI").unwrap_or_else(|_| "bolt://localhost:7687".to_string());
    let user = std::env::var("NEO4J_USER").unwrap_or_else(|_| "neo4j".to_string());
    let password = std::env::var("NEO4J_PASSWORD").unwrap_or_else(|_| "password".to_string());
    let database = std::env::var("NEO4J_DATABASE").unwrap_or_else(|_| "neo4j".to_string());
    (uri, user, password, database)
}

async fn connect() -> Arc<Neo4jClient> {
    let (uri, user, password, database) = get_neo4j_config();
    let client = Neo4jClient::new(&uri, &user, &password, &database)
        .await
        .expect("Failed to connect to Neo4j");
    Arc::new(client)
}

/// Function identity unique to one test run, so tests never see each other's entries
fn unique_function(name: &str) -> String {
    format!("test::{}::{}", name, Uuid::new_v4())
}

#[tokio::test]
#[ignore] // Run with: cargo test --ignored
async fn test_health_check() {
    let client = connect().await;

    assert!(client.health_check().await.unwrap());

    let result = client.health_check_detailed().await;
    assert!(result.status.is_operational(), "error: {:?}", result.error);
}

#[tokio::test]
#[ignore]
async fn test_ensure_indexes_is_idempotent() {
    let store = Neo4jDocumentStore::new(connect().await);

    store.ensure_indexes().await.expect("first index creation");
    store.ensure_indexes().await.expect("second index creation");
}

#[tokio::test]
#[ignore]
async fn test_upsert_and_find_one() {
    let store = Neo4jDocumentStore::new(connect().await);
    let function = unique_function("upsert");
    let key = derive_durable(&function, &CallArgs::new().arg(1).kwarg("gid", 3));

    assert!(store.find_one(&key.lookup_filter()).await.unwrap().is_none());

    store
        .upsert(CacheDocument::new(&key, json!({"score": 10}), None))
        .await
        .unwrap();
    store
        .upsert(CacheDocument::new(&key, json!({"score": 11}), None))
        .await
        .unwrap();

    let found = store.find_one(&key.lookup_filter()).await.unwrap().unwrap();
    assert_eq!(found.value, json!({"score": 11}));
    assert_eq!(found.key(), key);
    assert!(found.expire_at.is_none());

    // The upsert replaced the document rather than adding one
    let removed = store
        .delete_many(&DeleteFilter::Function {
            function: function.clone(),
            any_of: vec![KeyFilter::new()],
        })
        .await
        .unwrap();
    assert_eq!(removed, 1);
}

#[tokio::test]
#[ignore]
async fn test_expired_documents_are_hidden_and_swept() {
    let store = Neo4jDocumentStore::new(connect().await);
    let function = unique_function("expiry");
    let key = derive_durable(&function, &CallArgs::new());

    let past = chrono::Utc::now() - chrono::Duration::seconds(5);
    store
        .upsert(CacheDocument::new(&key, json!(1), Some(past)))
        .await
        .unwrap();

    assert!(store.find_one(&key.lookup_filter()).await.unwrap().is_none());
    assert!(store.sweep_expired().await.unwrap() >= 1);
}

#[tokio::test]
#[ignore]
async fn test_delete_many_by_kwarg_field() {
    let store = Neo4jDocumentStore::new(connect().await);
    let function = unique_function("invalidate");

    for (event, team) in [("e1", "t1"), ("e1", "t2"), ("e2", "t1")] {
        let call = CallArgs::new().kwarg("event_id", event).kwarg("team_id", team);
        let key = derive_durable(&function, &call);
        store
            .upsert(CacheDocument::new(&key, json!([]), None))
            .await
            .unwrap();
    }

    let removed = store
        .delete_many(&DeleteFilter::Function {
            function: function.clone(),
            any_of: vec![KeyFilter::kwarg("event_id", "e1")],
        })
        .await
        .unwrap();
    assert_eq!(removed, 2);

    let remaining = derive_durable(
        &function,
        &CallArgs::new().kwarg("event_id", "e2").kwarg("team_id", "t1"),
    );
    assert!(store
        .find_one(&remaining.lookup_filter())
        .await
        .unwrap()
        .is_some());

    store
        .delete_many(&DeleteFilter::Function {
            function,
            any_of: vec![KeyFilter::new()],
        })
        .await
        .unwrap();
}

#[tokio::test]
#[ignore]
async fn test_memoized_over_neo4j() {
    let client = connect().await;
    let config = CacheConfig::builder().enable_ttl_sweeper(false).build();
    let store = Arc::new(
        CacheStore::new(Arc::new(Neo4jDocumentStore::new(client.clone())), config.clone())
            .unwrap(),
    );
    let function = unique_function("memoized");
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();

    let wrapped = Memoized::new(
        function.clone(),
        MemoizeOptions::durable(Some(Duration::from_secs(300))),
        store.clone(),
        move |args: CallArgs| {
            seen.fetch_add(1, Ordering::SeqCst);
            async move {
                let gid: i64 = args.get_as("gid")?.unwrap_or(0);
                Ok::<i64, CacheError>(gid * 10)
            }
        },
    )
    .unwrap();

    assert_eq!(wrapped.call(CallArgs::new().kwarg("gid", 4)).await.unwrap(), 40);
    assert_eq!(wrapped.call(CallArgs::new().kwarg("gid", 4)).await.unwrap(), 40);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A second process sees the same durable entry
    let other = CacheStore::new(Arc::new(Neo4jDocumentStore::new(client)), config).unwrap();
    let key = derive_durable(&function, &CallArgs::new().kwarg("gid", 4));
    assert_eq!(other.get_durable(&key).await.unwrap(), Some(json!(40)));

    let removed = wrapped.invalidate(&[KeyFilter::kwarg("gid", 4)]).await.unwrap();
    assert_eq!(removed, 1);
    assert!(other.get_durable(&key).await.unwrap().is_none());
}
