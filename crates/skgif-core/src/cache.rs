//! Classification cache.
//!
//! Stores the concept codes an external classifier returned for one
//! classification input, keyed by a content-derived hash (see
//! [`ClassificationInput::cache_key`](crate::classify::ClassificationInput::cache_key)).
//! The cache itself never calls the classifier.
//!
//! Puts are upserts. Two requests that miss on the same key at the same
//! time may both call the classifier and both write; the values are
//! identical so either write is correct.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationCacheEntry {
    pub input_key: String,
    /// Concept codes as returned by the classifier, in its order.
    pub topics: Vec<String>,
    pub cached_at: DateTime<Utc>,
}

impl ClassificationCacheEntry {
    pub fn new(input_key: impl Into<String>, topics: Vec<String>) -> Self {
        Self {
            input_key: input_key.into(),
            topics,
            cached_at: Utc::now(),
        }
    }

    /// Whether the entry is younger than `ttl`. A zero TTL never expires.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        if ttl.is_zero() {
            return true;
        }
        match now.signed_duration_since(self.cached_at).to_std() {
            Ok(age) => age < ttl,
            Err(_) => true,
        }
    }
}

/// Durable or in-memory key-value store for classification results.
#[async_trait]
pub trait ClassificationCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<ClassificationCacheEntry>>;

    async fn put(&self, entry: &ClassificationCacheEntry) -> Result<()>;
}

/// Process-local cache for tests and single-run tools.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, ClassificationCacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ClassificationCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<ClassificationCacheEntry>> {
        let entries = self.entries.read().map_err(|_| anyhow!("cache lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, entry: &ClassificationCacheEntry) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| anyhow!("cache lock poisoned"))?;
        entries.insert(entry.input_key.clone(), entry.clone());
        Ok(())
    }
}

/// A cache that never hits. Used when the durable cache cannot be opened.
pub struct NoCache;

#[async_trait]
impl ClassificationCache for NoCache {
    async fn get(&self, _key: &str) -> Result<Option<ClassificationCacheEntry>> {
        Ok(None)
    }

    async fn put(&self, _entry: &ClassificationCacheEntry) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_round_trip() {
        let cache = MemoryCache::new();
        assert!(cache.get("k1").await.unwrap().is_none());

        let entry = ClassificationCacheEntry::new("k1", vec!["urn:c1".into()]);
        cache.put(&entry).await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), Some(entry.clone()));

        cache.put(&entry).await.unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_no_cache_always_misses() {
        let cache = NoCache;
        cache
            .put(&ClassificationCacheEntry::new("k1", vec![]))
            .await
            .unwrap();
        assert!(cache.get("k1").await.unwrap().is_none());
    }

    #[test]
    fn test_freshness() {
        let mut entry = ClassificationCacheEntry::new("k", vec![]);
        let now = entry.cached_at;
        let week = Duration::from_secs(7 * 24 * 3600);
        assert!(entry.is_fresh(week, now));

        entry.cached_at = now - chrono::Duration::days(8);
        assert!(!entry.is_fresh(week, now));
        assert!(entry.is_fresh(Duration::ZERO, now));
    }
}
