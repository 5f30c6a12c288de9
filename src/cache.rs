pub mod memory;
pub mod sqlite;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use error_stack::Report;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::{CacheError, ProviderError};
use crate::model::{DateRange, PriceSeries};
use crate::provider::DataProvider;

/// Identity of one fetch: the same ticker over the same range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub ticker: String,
    pub range: DateRange,
}

impl CacheKey {
    /// Tickers are case-insensitive; the key stores them upper-cased.
    pub fn new(ticker: &str, range: DateRange) -> Self {
        Self {
            ticker: ticker.trim().to_uppercase(),
            range,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.ticker, self.range)
    }
}

/// Keyed store of fetched series with a time-to-live.
///
/// Entries older than the TTL are never returned; `purge_expired` removes them.
pub trait BarCache: Send + Sync {
    fn get(
        &self,
        key: &CacheKey,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Option<PriceSeries>, Report<CacheError>>>;

    fn put(
        &self,
        key: &CacheKey,
        series: &PriceSeries,
        fetched_at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<(), Report<CacheError>>>;

    /// Remove expired entries, returning how many were dropped.
    fn purge_expired(&self, now: DateTime<Utc>) -> BoxFuture<'_, Result<usize, Report<CacheError>>>;
}

/// Memoizes a provider's successful fetches in a [`BarCache`].
///
/// Failures, including "no data", are never cached. A broken cache only costs
/// a refetch.
pub struct CachedProvider {
    inner: Arc<dyn DataProvider>,
    cache: Arc<dyn BarCache>,
}

impl CachedProvider {
    pub fn new(inner: Arc<dyn DataProvider>, cache: Arc<dyn BarCache>) -> Self {
        Self { inner, cache }
    }
}

impl CachedProvider {
    async fn purge_expired(&self) {
        match self.cache.purge_expired(Utc::now()).await {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "evicted expired bar cache entries"),
            Err(e) => warn!(error = ?e, "bar cache purge failed (continuing)"),
        }
    }
}

impl DataProvider for CachedProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fetch_daily_bars(
        &self,
        ticker: &str,
        range: DateRange,
    ) -> BoxFuture<'_, Result<PriceSeries, Report<ProviderError>>> {
        let key = CacheKey::new(ticker, range);
        let ticker = ticker.to_owned();
        Box::pin(async move {
            match self.cache.get(&key, Utc::now()).await {
                Ok(Some(series)) => {
                    debug!(key = %key, bars = series.len(), "bar cache hit");
                    return Ok(series);
                }
                Ok(None) => {
                    debug!(key = %key, "bar cache miss");
                    self.purge_expired().await;
                }
                Err(e) => warn!(error = ?e, key = %key, "bar cache read failed (continuing)"),
            }

            let series = self.inner.fetch_daily_bars(&ticker, range).await?;

            if let Err(e) = self.cache.put(&key, &series, Utc::now()).await {
                warn!(error = ?e, key = %key, "bar cache write failed (continuing)");
            }
            Ok(series)
        })
    }
}
