//! In-process counter store.
//!
//! Backed by a `DashMap` of slice buckets. Counts are only consistent within
//! one process, so this store is meant for development and tests.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{bucket_ttl_ms, weighted_previous, window_position, CounterStore, StoreError, WindowCount};

/// Expired buckets are swept every this many calls.
const PRUNE_EVERY: u64 = 1024;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u64,
    expires_at_ms: u64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: DashMap<String, Bucket>,
    calls: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live buckets (expired ones may linger until the next sweep).
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Drop every bucket whose expiry has passed.
    pub fn prune(&self, now_ms: u64) {
        self.buckets.retain(|_, bucket| bucket.expires_at_ms > now_ms);
    }

    fn live_count(&self, key: &str, now_ms: u64) -> u64 {
        self.buckets
            .get(key)
            .filter(|bucket| bucket.expires_at_ms > now_ms)
            .map(|bucket| bucket.count)
            .unwrap_or(0)
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn sliding_window(
        &self,
        key: &str,
        limit: u64,
        window_ms: u64,
        now_ms: u64,
    ) -> Result<WindowCount, StoreError> {
        if self.calls.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune(now_ms);
        }

        let (slice, reset_at_ms, elapsed) = window_position(now_ms, window_ms);
        let previous = match slice.checked_sub(1) {
            Some(prev) => self.live_count(&format!("{}:{}", key, prev), now_ms),
            None => 0,
        };
        let previous = weighted_previous(previous, elapsed);

        // The entry guard holds the shard lock for the whole check-and-increment.
        let mut bucket = self
            .buckets
            .entry(format!("{}:{}", key, slice))
            .or_insert(Bucket {
                count: 0,
                expires_at_ms: 0,
            });
        if bucket.expires_at_ms <= now_ms {
            bucket.count = 0;
        }

        let used = bucket.count + previous;
        if used >= limit {
            return Ok(WindowCount {
                admitted: false,
                used,
                reset_at_ms,
            });
        }

        bucket.count += 1;
        bucket.expires_at_ms = now_ms + bucket_ttl_ms(window_ms);

        Ok(WindowCount {
            admitted: true,
            used: used + 1,
            reset_at_ms,
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: u64 = 10_000;

    #[tokio::test]
    async fn test_admits_exactly_limit_per_slice() {
        let store = MemoryStore::new();
        let now = 1_000_000; // slice start

        for i in 1..=5 {
            let count = store.sliding_window("k", 5, WINDOW, now).await.unwrap();
            assert!(count.admitted, "request {} should be admitted", i);
            assert_eq!(count.used, i);
        }

        let rejected = store.sliding_window("k", 5, WINDOW, now).await.unwrap();
        assert!(!rejected.admitted);
        assert_eq!(rejected.used, 5);
        assert_eq!(rejected.reset_at_ms, now + WINDOW);
    }

    #[tokio::test]
    async fn test_rejections_are_not_counted() {
        let store = MemoryStore::new();
        for _ in 0..10 {
            store.sliding_window("k", 2, WINDOW, 0).await.unwrap();
        }
        // Half a window later only the weighted previous slice remains.
        let count = store.sliding_window("k", 2, WINDOW, WINDOW + WINDOW / 2).await.unwrap();
        assert!(count.admitted);
        assert_eq!(count.used, 2);
    }

    #[tokio::test]
    async fn test_previous_slice_weighs_into_window() {
        let store = MemoryStore::new();
        for _ in 0..20 {
            assert!(store.sliding_window("k", 20, WINDOW, 0).await.unwrap().admitted);
        }

        // 10% into the next slice, 18 of the previous 20 still count.
        let now = WINDOW + WINDOW / 10;
        for _ in 0..2 {
            assert!(store.sliding_window("k", 20, WINDOW, now).await.unwrap().admitted);
        }
        assert!(!store.sliding_window("k", 20, WINDOW, now).await.unwrap().admitted);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = MemoryStore::new();
        assert!(store.sliding_window("a", 1, WINDOW, 0).await.unwrap().admitted);
        assert!(!store.sliding_window("a", 1, WINDOW, 0).await.unwrap().admitted);
        assert!(store.sliding_window("b", 1, WINDOW, 0).await.unwrap().admitted);
    }

    #[tokio::test]
    async fn test_prune_drops_expired_buckets() {
        let store = MemoryStore::new();
        store.sliding_window("k", 5, WINDOW, 0).await.unwrap();
        assert_eq!(store.len(), 1);

        store.prune(bucket_ttl_ms(WINDOW) + 1);
        assert!(store.is_empty());
    }
}
