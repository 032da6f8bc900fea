//! Session result cache
//!
//! Memoizes one envelope per `source_id:query` pair for a fixed TTL.
//! Expired entries are logically absent from the moment the window
//! closes and are evicted on the next read touching them; there is no
//! sweeper task.
//!
//! Keys use the query string *as given* — `"example.com"` and
//! `"EXAMPLE.com"` occupy distinct entries. Case normalization is the
//! aggregation engine's boundary concern, not the cache's.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use osprey_core::{ResultEnvelope, CACHE_TTL_SECS};

struct CacheEntry {
    envelope: ResultEnvelope,
    inserted_at: Instant,
}

/// TTL-bounded envelope cache shared by all queries in a session
pub struct ResultCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(CACHE_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Cache key for a source/query pair
    pub fn key(source_id: &str, query: &str) -> String {
        format!("{source_id}:{query}")
    }

    /// Look up a live entry, evicting it if the TTL has lapsed
    pub fn get(&self, source_id: &str, query: &str) -> Option<ResultEnvelope> {
        let key = Self::key(source_id, query);

        let expired = match self.entries.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(entry.envelope.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove(&key);
        }
        None
    }

    /// Store an envelope, overwriting any previous entry
    pub fn put(&self, source_id: &str, query: &str, envelope: ResultEnvelope) {
        self.entries.insert(
            Self::key(source_id, query),
            CacheEntry {
                envelope,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Live envelopes, ordered by key for stable export output
    pub fn snapshot(&self) -> Vec<ResultEnvelope> {
        let mut live: Vec<(String, ResultEnvelope)> = self
            .entries
            .iter()
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .map(|entry| (entry.key().clone(), entry.envelope.clone()))
            .collect();
        live.sort_by(|a, b| a.0.cmp(&b.0));
        live.into_iter().map(|(_, envelope)| envelope).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hit_envelope, test_source};
    use osprey_core::Category;

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let cache = ResultCache::new();
        let source = test_source("crtsh", Category::Domain, 0);
        let envelope = hit_envelope(&source, "example.com");

        cache.put(&source.id, "example.com", envelope.clone());

        let first = cache.get(&source.id, "example.com").unwrap();
        let second = cache.get(&source.id, "example.com").unwrap();
        assert_eq!(first, envelope);
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_absent() {
        let cache = ResultCache::with_ttl(Duration::from_millis(100));
        let source = test_source("crtsh", Category::Domain, 0);

        cache.put(&source.id, "example.com", hit_envelope(&source, "example.com"));
        assert!(cache.get(&source.id, "example.com").is_some());

        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(cache.get(&source.id, "example.com").is_none());
        // lazy eviction removed the stale entry on that read
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_keys_are_case_sensitive() {
        let cache = ResultCache::new();
        let source = test_source("crtsh", Category::Domain, 0);

        cache.put(&source.id, "example.com", hit_envelope(&source, "example.com"));
        cache.put(&source.id, "EXAMPLE.com", hit_envelope(&source, "EXAMPLE.com"));

        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.get(&source.id, "example.com").unwrap().query,
            "example.com"
        );
        assert_eq!(
            cache.get(&source.id, "EXAMPLE.com").unwrap().query,
            "EXAMPLE.com"
        );
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = ResultCache::new();
        let source = test_source("crtsh", Category::Domain, 0);
        let other = test_source("dns_records", Category::Domain, 0);

        cache.put(&source.id, "example.com", hit_envelope(&source, "example.com"));
        cache.put(&source.id, "example.com", hit_envelope(&other, "example.com"));

        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get(&source.id, "example.com").unwrap().source_id,
            "dns_records"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_skips_expired() {
        let cache = ResultCache::with_ttl(Duration::from_millis(100));
        let source = test_source("crtsh", Category::Domain, 0);

        cache.put(&source.id, "old.com", hit_envelope(&source, "old.com"));
        tokio::time::advance(Duration::from_millis(150)).await;
        cache.put(&source.id, "new.com", hit_envelope(&source, "new.com"));

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].query, "new.com");
    }
}
