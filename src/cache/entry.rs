//! Stored cache entries for both tiers

use crate::cache::key::DurableKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// A durable cache document: the structured key plus the memoized value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheDocument {
    pub function: String,
    pub args: Vec<Value>,
    pub ordered_kwargs: Vec<(String, Value)>,
    pub kwargs: Map<String, Value>,

    /// The memoized result
    pub value: Value,

    /// Absolute expiry; `None` never expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<DateTime<Utc>>,
}

impl CacheDocument {
    /// Build a document for `key`
    pub fn new(key: &DurableKey, value: Value, expire_at: Option<DateTime<Utc>>) -> Self {
        Self {
            function: key.function.clone(),
            args: key.args.clone(),
            ordered_kwargs: key.ordered_kwargs.clone(),
            kwargs: key.kwargs.clone(),
            value,
            expire_at,
        }
    }

    /// Build a document that expires `ttl` after `now`.
    /// A TTL too large to represent never expires.
    pub fn with_ttl(key: &DurableKey, value: Value, now: DateTime<Utc>, ttl: Duration) -> Self {
        let expire_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl));
        Self::new(key, value, expire_at)
    }

    /// The key fields of this document
    pub fn key(&self) -> DurableKey {
        DurableKey {
            function: self.function.clone(),
            args: self.args.clone(),
            ordered_kwargs: self.ordered_kwargs.clone(),
            kwargs: self.kwargs.clone(),
        }
    }

    /// True when both documents carry the same full key
    pub fn same_key(&self, other: &CacheDocument) -> bool {
        self.function == other.function
            && self.args == other.args
            && self.ordered_kwargs == other.ordered_kwargs
            && self.kwargs == other.kwargs
    }

    /// Whether the document has passed its expiry at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expire_at, Some(at) if at <= now)
    }
}

/// An in-process cache entry
#[derive(Debug, Clone, PartialEq)]
pub struct FastEntry {
    /// The memoized result
    pub result: Value,

    /// How long the entry stays fresh
    pub timeout: Duration,

    /// When the entry was written
    pub set_time: DateTime<Utc>,
}

impl FastEntry {
    pub fn new(result: Value, timeout: Duration, set_time: DateTime<Utc>) -> Self {
        Self {
            result,
            timeout,
            set_time,
        }
    }

    /// Age of the entry at `now`; zero if `now` precedes `set_time`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.set_time).to_std().unwrap_or(Duration::ZERO)
    }

    /// Timed out once the age strictly exceeds the timeout
    pub fn is_timed_out(&self, now: DateTime<Utc>) -> bool {
        self.age(now) > self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::derive_durable;
    use crate::cache::types::CallArgs;
    use serde_json::json;

    #[test]
    fn test_document_with_ttl() {
        let key = derive_durable("stats::solves", &CallArgs::new().kwarg("pid", "p1"));
        let now = Utc::now();
        let doc = CacheDocument::with_ttl(&key, json!(12), now, Duration::from_secs(30));

        assert_eq!(doc.expire_at, Some(now + chrono::Duration::seconds(30)));
        assert!(!doc.is_expired(now));
        assert!(doc.is_expired(now + chrono::Duration::seconds(30)));
        assert_eq!(doc.key(), key);
    }

    #[test]
    fn test_document_without_expiry_never_expires() {
        let key = derive_durable("f", &CallArgs::new());
        let doc = CacheDocument::new(&key, json!(null), None);
        assert!(!doc.is_expired(Utc::now() + chrono::Duration::days(3650)));
    }

    #[test]
    fn test_fast_entry_timeout_boundary() {
        let set_time = Utc::now();
        let entry = FastEntry::new(json!(6), Duration::from_secs(5), set_time);

        assert!(!entry.is_timed_out(set_time + chrono::Duration::milliseconds(4_999)));
        assert!(!entry.is_timed_out(set_time + chrono::Duration::seconds(5)));
        assert!(entry.is_timed_out(set_time + chrono::Duration::milliseconds(5_001)));
    }

    #[test]
    fn test_fast_entry_age_with_clock_skew() {
        let set_time = Utc::now();
        let entry = FastEntry::new(json!(1), Duration::from_secs(1), set_time);
        assert_eq!(entry.age(set_time - chrono::Duration::seconds(10)), Duration::ZERO);
    }
}
