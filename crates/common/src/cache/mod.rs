//! In-process TTL cache.
//!
//! Spec §4.8/§9 calls for a "concurrent TTL map" that is a process-wide
//! singleton owned by the planner — not a distributed cache. `moka` is the
//! idiomatic fit for this across the example pack; the teacher's
//! Redis-backed `Cache` (get-or-load with TTL) is the shape we keep, minus
//! the network round-trip.

use crate::metrics::record_cache;
use moka::future::Cache as MokaCache;
use std::future::Future;
use std::time::Duration;

/// A keyed, TTL-expiring in-process cache of strings (topic summaries are
/// the only thing spec §4.8 asks to cache).
#[derive(Clone)]
pub struct TopicSummaryCache {
    inner: MokaCache<String, String>,
}

impl TopicSummaryCache {
    pub fn new(ttl: Duration) -> Self {
        let inner = MokaCache::builder().time_to_live(ttl).build();
        Self { inner }
    }

    /// Key format fixed by spec §4.8: `topic_summary:{period}:{topic.name}`.
    pub fn key(period: &str, topic_name: &str) -> String {
        format!("topic_summary:{period}:{topic_name}")
    }

    pub async fn get_or_load<F, Fut>(&self, key: &str, loader: F) -> crate::errors::Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = crate::errors::Result<String>>,
    {
        if let Some(cached) = self.inner.get(key).await {
            record_cache(true);
            return Ok(cached);
        }
        record_cache(false);
        let value = loader().await?;
        self.inner.insert(key.to_string(), value.clone()).await;
        Ok(value)
    }

    pub async fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_load_caches_after_first_miss() {
        let cache = TopicSummaryCache::new(Duration::from_secs(60));
        let key = TopicSummaryCache::key("week", "Rust");

        let mut calls = 0;
        let first = cache
            .get_or_load(&key, || {
                calls += 1;
                async { Ok("digest one".to_string()) }
            })
            .await
            .unwrap();
        assert_eq!(first, "digest one");

        let second = cache
            .get_or_load(&key, || async {
                panic!("loader should not run on cache hit");
                #[allow(unreachable_code)]
                Ok(String::new())
            })
            .await
            .unwrap();
        assert_eq!(second, "digest one");
        assert_eq!(calls, 1);
    }
}
