use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime};
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::model::{DateRange, PriceBar, PriceSeries};
use crate::provider::DataProvider;

const PROVIDER_NAME: &str = "yahoo";
const CHART_PATH: &str = "/v8/finance/chart";
const NOT_FOUND_CODE: &str = "Not Found";
/// Yahoo does not publish a limit; stay well below what the public chart
/// endpoint tolerates.
const FALLBACK_REQUESTS_PER_SECOND: NonZeroU32 = nonzero!(2u32);

/// Daily bars from the Yahoo Finance chart API.
pub struct YahooProvider {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl YahooProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, Report<ProviderError>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .change_context(ProviderError::Request {
                provider: PROVIDER_NAME.into(),
            })
            .attach("failed to build HTTP client")?;

        let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(FALLBACK_REQUESTS_PER_SECOND);
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
        })
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn fetch_daily_bars(
        &self,
        ticker: &str,
        range: DateRange,
    ) -> BoxFuture<'_, Result<PriceSeries, Report<ProviderError>>> {
        let ticker = ticker.to_owned();
        Box::pin(async move {
            // Wait for rate limiter before making the request
            self.rate_limiter.until_ready().await;

            let url = format!("{}{}/{}", self.base_url, CHART_PATH, ticker);
            let period1 = unix_seconds(range.start).to_string();
            let period2 = unix_seconds(range.end).to_string();
            let params = [
                ("period1", period1.as_str()),
                ("period2", period2.as_str()),
                ("interval", "1d"),
                ("events", "history"),
            ];

            debug!(ticker = %ticker, range = %range, "requesting yahoo chart");

            let response = self
                .client
                .get(&url)
                .query(&params)
                .send()
                .await
                .change_context(ProviderError::Request {
                    provider: PROVIDER_NAME.into(),
                })
                .attach_with(|| format!("ticker: {ticker}"))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .change_context(ProviderError::Request {
                    provider: PROVIDER_NAME.into(),
                })?;

            // Unknown symbols come back as 404 with a structured error body.
            let parsed = serde_json::from_str::<ChartResponse>(&body);
            if let Ok(ChartResponse {
                chart:
                    ChartBody {
                        error: Some(api_error),
                        ..
                    },
            }) = &parsed
            {
                if api_error.code == NOT_FOUND_CODE {
                    return Err(Report::new(ProviderError::NoData { ticker })
                        .attach(api_error.description.clone()));
                }
                return Err(Report::new(ProviderError::Request {
                    provider: PROVIDER_NAME.into(),
                })
                .attach(format!("{}: {}", api_error.code, api_error.description)));
            }

            if !status.is_success() {
                return Err(Report::new(ProviderError::Request {
                    provider: PROVIDER_NAME.into(),
                })
                .attach(format!("HTTP status: {status}")));
            }

            let parsed = parsed.change_context(ProviderError::ResponseParse {
                provider: PROVIDER_NAME.into(),
            })?;
            let series = into_series(parsed, &ticker, range)?;

            info!(
                ticker = %ticker,
                range = %range,
                fetched = series.len(),
                "yahoo daily bar fetch complete"
            );
            Ok(series)
        })
    }
}

fn unix_seconds(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Convert a decoded chart response into a validated series.
///
/// Rows with a missing field or an inconsistent price range are skipped;
/// bars outside `range` are dropped and repeated dates keep the first row.
fn into_series(
    response: ChartResponse,
    ticker: &str,
    range: DateRange,
) -> Result<PriceSeries, Report<ProviderError>> {
    let no_data = || ProviderError::NoData {
        ticker: ticker.to_owned(),
    };

    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Err(Report::new(no_data()));
    };
    let timestamps = result.timestamp.unwrap_or_default();
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Err(Report::new(no_data()));
    };

    let offset = result.meta.gmtoffset;
    let mut bars: Vec<PriceBar> = Vec::with_capacity(timestamps.len());
    let mut skipped = 0usize;

    for (i, ts) in timestamps.iter().enumerate() {
        let fields = (
            DateTime::from_timestamp(ts + offset, 0).map(|dt| dt.date_naive()),
            quote.open.get(i).copied().flatten(),
            quote.high.get(i).copied().flatten(),
            quote.low.get(i).copied().flatten(),
            quote.close.get(i).copied().flatten(),
            quote.volume.get(i).copied().flatten(),
        );
        let (Some(date), Some(open), Some(high), Some(low), Some(close), Some(volume)) = fields
        else {
            skipped += 1;
            continue;
        };

        let bar = PriceBar {
            date,
            open,
            high,
            low,
            close,
            volume,
        };
        if !range.contains(bar.date) || !bar.is_well_formed() {
            skipped += 1;
            continue;
        }
        bars.push(bar);
    }

    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);

    if skipped > 0 {
        warn!(ticker, skipped, "skipped incomplete or out-of-range rows");
    }
    if bars.is_empty() {
        return Err(Report::new(no_data()));
    }

    PriceSeries::new(ticker, bars).change_context(ProviderError::ResponseParse {
        provider: PROVIDER_NAME.into(),
    })
}

// ── REST response types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartApiError>,
}

#[derive(Debug, Deserialize)]
struct ChartApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds; timestamps mark the session open.
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}
