use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use error_stack::Report;
use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::cache::{BarCache, CacheKey};
use crate::error::CacheError;
use crate::model::PriceSeries;

struct Entry {
    series: PriceSeries,
    fetched_at: DateTime<Utc>,
}

/// Process-local cache; contents are lost on exit.
pub struct MemoryCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn is_fresh(&self, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - fetched_at < self.ttl
    }
}

impl BarCache for MemoryCache {
    fn get(
        &self,
        key: &CacheKey,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Option<PriceSeries>, Report<CacheError>>> {
        let key = key.clone();
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            match entries.get(&key) {
                Some(e) if self.is_fresh(e.fetched_at, now) => Ok(Some(e.series.clone())),
                Some(_) => {
                    entries.remove(&key);
                    Ok(None)
                }
                None => Ok(None),
            }
        })
    }

    fn put(
        &self,
        key: &CacheKey,
        series: &PriceSeries,
        fetched_at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<(), Report<CacheError>>> {
        let key = key.clone();
        let series = series.clone();
        Box::pin(async move {
            self.entries
                .lock()
                .await
                .insert(key, Entry { series, fetched_at });
            Ok(())
        })
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> BoxFuture<'_, Result<usize, Report<CacheError>>> {
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            let before = entries.len();
            entries.retain(|_, e| self.is_fresh(e.fetched_at, now));
            Ok(before - entries.len())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DateRange;
    use crate::model::fixtures::series_from_closes;

    fn key(ticker: &str) -> CacheKey {
        let range = DateRange::new(
            "2023-01-01".parse().unwrap(),
            "2024-01-01".parse().unwrap(),
        )
        .unwrap();
        CacheKey::new(ticker, range)
    }

    #[tokio::test]
    async fn get_returns_fresh_entry() {
        let cache = MemoryCache::new(Duration::minutes(5));
        let now = Utc::now();
        let series = series_from_closes(&[1.0, 2.0, 3.0]);
        cache.put(&key("AAPL"), &series, now).await.unwrap();

        let hit = cache.get(&key("AAPL"), now + Duration::minutes(4)).await.unwrap();
        assert_eq!(hit, Some(series));
    }

    #[tokio::test]
    async fn get_skips_expired_entry() {
        let cache = MemoryCache::new(Duration::minutes(5));
        let now = Utc::now();
        cache
            .put(&key("AAPL"), &series_from_closes(&[1.0]), now)
            .await
            .unwrap();

        let miss = cache.get(&key("AAPL"), now + Duration::minutes(5)).await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn keys_do_not_collide() {
        let cache = MemoryCache::new(Duration::minutes(5));
        let now = Utc::now();
        cache
            .put(&key("AAPL"), &series_from_closes(&[1.0]), now)
            .await
            .unwrap();
        assert!(cache.get(&key("MSFT"), now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn purge_drops_only_expired() {
        let cache = MemoryCache::new(Duration::minutes(5));
        let now = Utc::now();
        cache
            .put(&key("OLD"), &series_from_closes(&[1.0]), now - Duration::minutes(10))
            .await
            .unwrap();
        cache
            .put(&key("NEW"), &series_from_closes(&[1.0]), now)
            .await
            .unwrap();

        assert_eq!(cache.purge_expired(now).await.unwrap(), 1);
        assert!(cache.get(&key("NEW"), now).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn expired_entry_is_dropped_on_read() {
        let cache = MemoryCache::new(Duration::minutes(5));
        let now = Utc::now();
        cache
            .put(&key("AAPL"), &series_from_closes(&[1.0]), now)
            .await
            .unwrap();

        assert!(cache.get(&key("AAPL"), now + Duration::hours(5)).await.unwrap().is_none());
        assert!(cache.entries.lock().await.is_empty());
    }

    #[tokio::test]
    async fn purge_after_startup_releases_stale_entries() {
        let cache = MemoryCache::new(Duration::minutes(5));
        let t0 = Utc::now();
        assert_eq!(cache.purge_expired(t0).await.unwrap(), 0);
        for i in 0..50 {
            cache
                .put(&key(&format!("T{i}")), &series_from_closes(&[1.0]), t0)
                .await
                .unwrap();
        }

        assert_eq!(cache.purge_expired(t0 + Duration::hours(5)).await.unwrap(), 50);
        assert!(cache.entries.lock().await.is_empty());
    }
}
