use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};

use crate::cache::{BarCache, CacheKey};
use crate::error::CacheError;
use crate::model::{PriceBar, PriceSeries};

type BarRow = (String, f64, f64, f64, f64, i64);

/// On-disk cache so that repeated runs over the same range skip the network.
pub struct SqliteCache {
    pool: SqlitePool,
    ttl: Duration,
}

impl SqliteCache {
    /// Open (or create) a SQLite database at `path` and run migrations.
    pub async fn open(path: &Path, ttl: Duration) -> Result<Self, Report<CacheError>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .change_context(CacheError::Migration)
                .attach_with(|| format!("cannot create cache directory: {}", parent.display()))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .change_context(CacheError::Migration)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(opts)
            .await
            .change_context(CacheError::Migration)
            .attach_with(|| format!("database path: {}", path.display()))?;

        Self::with_pool(pool, ttl).await
    }

    async fn with_pool(pool: SqlitePool, ttl: Duration) -> Result<Self, Report<CacheError>> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .change_context(CacheError::Migration)?;

        Ok(Self { pool, ttl })
    }
}

impl BarCache for SqliteCache {
    fn get(
        &self,
        key: &CacheKey,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Option<PriceSeries>, Report<CacheError>>> {
        let key = key.clone();
        Box::pin(async move {
            let start = key.range.start.to_string();
            let end = key.range.end.to_string();

            let fetched_at: Option<(String,)> = sqlx::query_as(
                "SELECT fetched_at FROM cached_series \
                 WHERE ticker = ? AND start_date = ? AND end_date = ?",
            )
            .bind(&key.ticker)
            .bind(&start)
            .bind(&end)
            .fetch_optional(&self.pool)
            .await
            .change_context(CacheError::Query)?;

            let Some((fetched_at,)) = fetched_at else {
                return Ok(None);
            };
            let fresh = parse_time_utc(&fetched_at).is_some_and(|t| now - t < self.ttl);
            if !fresh {
                return Ok(None);
            }

            let rows: Vec<BarRow> = sqlx::query_as(
                "SELECT date, open, high, low, close, volume FROM cached_bars \
                 WHERE ticker = ? AND start_date = ? AND end_date = ? \
                 ORDER BY date ASC",
            )
            .bind(&key.ticker)
            .bind(&start)
            .bind(&end)
            .fetch_all(&self.pool)
            .await
            .change_context(CacheError::Query)?;

            let bars = rows
                .into_iter()
                .map(map_bar_row)
                .collect::<Result<Vec<_>, _>>()?;

            let series = PriceSeries::new(key.ticker.clone(), bars)
                .change_context(CacheError::Query)
                .attach_with(|| format!("cache key: {key}"))?;
            Ok(Some(series))
        })
    }

    fn put(
        &self,
        key: &CacheKey,
        series: &PriceSeries,
        fetched_at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<(), Report<CacheError>>> {
        let key = key.clone();
        let bars = series.bars().to_vec();
        Box::pin(async move {
            let start = key.range.start.to_string();
            let end = key.range.end.to_string();

            let mut tx = self
                .pool
                .begin()
                .await
                .change_context(CacheError::Insert)?;

            sqlx::query("DELETE FROM cached_bars WHERE ticker = ? AND start_date = ? AND end_date = ?")
                .bind(&key.ticker)
                .bind(&start)
                .bind(&end)
                .execute(&mut *tx)
                .await
                .change_context(CacheError::Insert)?;

            sqlx::query(
                "INSERT OR REPLACE INTO cached_series (ticker, start_date, end_date, fetched_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&key.ticker)
            .bind(&start)
            .bind(&end)
            .bind(format_time(fetched_at))
            .execute(&mut *tx)
            .await
            .change_context(CacheError::Insert)?;

            for b in &bars {
                sqlx::query(
                    "INSERT INTO cached_bars \
                     (ticker, start_date, end_date, date, open, high, low, close, volume) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&key.ticker)
                .bind(&start)
                .bind(&end)
                .bind(b.date.to_string())
                .bind(b.open)
                .bind(b.high)
                .bind(b.low)
                .bind(b.close)
                .bind(i64::try_from(b.volume).unwrap_or(i64::MAX))
                .execute(&mut *tx)
                .await
                .change_context(CacheError::Insert)?;
            }

            tx.commit().await.change_context(CacheError::Insert)?;
            Ok(())
        })
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> BoxFuture<'_, Result<usize, Report<CacheError>>> {
        Box::pin(async move {
            let cutoff = format_time(now - self.ttl);

            let mut tx = self
                .pool
                .begin()
                .await
                .change_context(CacheError::Insert)?;

            sqlx::query(
                "DELETE FROM cached_bars WHERE (ticker, start_date, end_date) IN \
                 (SELECT ticker, start_date, end_date FROM cached_series WHERE fetched_at <= ?)",
            )
            .bind(&cutoff)
            .execute(&mut *tx)
            .await
            .change_context(CacheError::Insert)?;

            let removed = sqlx::query("DELETE FROM cached_series WHERE fetched_at <= ?")
                .bind(&cutoff)
                .execute(&mut *tx)
                .await
                .change_context(CacheError::Insert)?
                .rows_affected();

            tx.commit().await.change_context(CacheError::Insert)?;
            Ok(removed as usize)
        })
    }
}

fn map_bar_row(
    (date, open, high, low, close, volume): BarRow,
) -> Result<PriceBar, Report<CacheError>> {
    let date = NaiveDate::from_str(&date)
        .change_context(CacheError::Query)
        .attach_with(|| format!("stored date: {date}"))?;
    Ok(PriceBar {
        date,
        open,
        high,
        low,
        close,
        volume: volume.max(0) as u64,
    })
}

/// Fixed-width UTC timestamps so that string comparison in SQL is chronological.
fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time_utc(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
