//! Cache warming
//!
//! A warmer recomputes a result with the cache bypassed and writes it to the
//! durable tier under the call's key, so the next reader hits a fresh entry.
//! Warmed entries carry no TTL; they are replaced by the next warm or removed
//! by invalidation.

use crate::cache::key::derive_durable;
use crate::cache::memoize::encode;
use crate::cache::store::CacheStore;
use crate::cache::types::CallArgs;
use crate::error::CacheError;
use serde::Serialize;
use std::future::Future;
use tracing::debug;

/// Compute `function_id` for `args` and store the result without expiry.
///
/// The computation receives the arguments with the cache bypass set. On
/// error nothing is written and the error is returned.
pub async fn warm<C, Fut, T, E>(
    store: &CacheStore,
    function_id: &str,
    args: CallArgs,
    compute: C,
) -> Result<T, E>
where
    C: FnOnce(CallArgs) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: Serialize,
    E: From<CacheError>,
{
    let key = derive_durable(function_id, &args);
    let result = compute(args.no_cache()).await?;

    store.set_durable(&key, encode(&result)?, None).await?;
    debug!("Warmed durable entry for {}", function_id);

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_warm_overwrites_and_never_expires() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = CacheStore::in_memory_with_clock(clock.clone());
        let args = CallArgs::new().kwarg("event_id", "e1");
        let key = derive_durable("stats::registration_count", &args);

        store
            .set_durable(&key, serde_json::json!(1), Some(Duration::from_secs(5)))
            .await
            .unwrap();

        let warmed: u64 = warm(&store, "stats::registration_count", args, |call| async move {
            assert!(!call.use_cache());
            Ok::<u64, CacheError>(7)
        })
        .await
        .unwrap();
        assert_eq!(warmed, 7);

        clock.advance(Duration::from_secs(3600));
        assert_eq!(
            store.get_durable(&key).await.unwrap(),
            Some(serde_json::json!(7))
        );
    }

    #[tokio::test]
    async fn test_warm_error_writes_nothing() {
        let store = CacheStore::in_memory();
        let args = CallArgs::new().arg(1);
        let key = derive_durable("f", &args);

        let result = warm(&store, "f", args, |_call| async {
            Err::<u64, CacheError>(CacheError::Other("source unavailable".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert!(store.get_durable(&key).await.unwrap().is_none());
    }
}
