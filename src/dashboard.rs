use std::str::FromStr;

use chrono::NaiveDate;
use error_stack::{Report, ResultExt};
use tracing::{info, warn};

use crate::chart::{ChartRenderer, ema_chart, sma_chart};
use crate::error::{ConfigError, DashboardError, ProviderError};
use crate::indicator::ma::EmaMode;
use crate::model::{DateRange, StrategyRequest};
use crate::provider::DataProvider;
use crate::strategy::Marker;
use crate::strategy::crossover::sma_strategy;
use crate::strategy::ema::ema_overlay;

pub const NO_DATA_MESSAGE: &str = "No data found for the specified ticker and date range.";

/// What one fetch-compute-render cycle produced.
#[derive(Debug)]
pub enum CycleOutcome {
    Rendered { bars: usize, markers: Vec<Marker> },
    /// The cycle stopped early; the message is meant for the user.
    Advisory(String),
}

/// Run one dashboard interaction to completion.
///
/// Fetch problems never escape as errors: "no data" and provider failures
/// become [`CycleOutcome::Advisory`]. Only rendering failures are errors.
pub async fn run_cycle(
    provider: &dyn DataProvider,
    renderers: &[Box<dyn ChartRenderer>],
    request: &StrategyRequest,
    ema_mode: EmaMode,
) -> Result<CycleOutcome, Report<DashboardError>> {
    info!(
        provider = provider.name(),
        ticker = %request.ticker,
        range = %request.range,
        short_window = request.short_window,
        long_window = request.long_window,
        ema_window = request.ema_window,
        "starting cycle"
    );

    let series = match provider
        .fetch_daily_bars(&request.ticker, request.range)
        .await
    {
        Ok(series) => series,
        Err(report) => return Ok(CycleOutcome::Advisory(advisory_for(&report))),
    };

    if series.len() < request.long_window {
        info!(
            bars = series.len(),
            long_window = request.long_window,
            "series shorter than long window; long average stays undefined"
        );
    }

    let (Some(crossover), Some(overlay)) = (
        sma_strategy(&series, request.short_window, request.long_window),
        ema_overlay(&series, request.ema_window, ema_mode),
    ) else {
        return Ok(CycleOutcome::Advisory(NO_DATA_MESSAGE.into()));
    };

    let charts = [
        sma_chart(&crossover, &request.ticker),
        ema_chart(&overlay, &request.ticker),
    ];
    for renderer in renderers {
        for chart in &charts {
            renderer
                .render(chart)
                .change_context(DashboardError::Render {
                    kind: chart.kind.to_string(),
                })?;
        }
    }

    let markers = crossover.markers();
    info!(
        ticker = series.ticker(),
        bars = series.len(),
        markers = markers.len(),
        ema_mode = %overlay.mode,
        ema_last = ?overlay.last(),
        "cycle complete"
    );
    Ok(CycleOutcome::Rendered {
        bars: series.len(),
        markers,
    })
}

/// Parse an interactive request line: `TICKER [START [END]]`.
///
/// Omitted fields, and the window sizes, come from `defaults`.
pub fn parse_request_line(
    line: &str,
    defaults: &StrategyRequest,
) -> Result<StrategyRequest, Report<ConfigError>> {
    let invalid = |field: String| Report::new(ConfigError::Validation { field });

    let mut parts = line.split_whitespace();
    let ticker = parts
        .next()
        .ok_or_else(|| invalid("request: ticker is required".into()))?;

    let mut dates = [defaults.range.start, defaults.range.end];
    for slot in &mut dates {
        if let Some(raw) = parts.next() {
            *slot = NaiveDate::from_str(raw)
                .change_context(ConfigError::Validation {
                    field: format!("request: \"{raw}\" is not a YYYY-MM-DD date"),
                })?;
        }
    }
    if let Some(extra) = parts.next() {
        return Err(invalid(format!("request: unexpected \"{extra}\"")));
    }

    let [start, end] = dates;
    let range = DateRange::new(start, end)
        .ok_or_else(|| invalid(format!("request: end {end} must be after start {start}")))?;

    Ok(StrategyRequest {
        ticker: ticker.to_uppercase(),
        range,
        ..defaults.clone()
    })
}

fn advisory_for(report: &Report<ProviderError>) -> String {
    let error = report.current_context();
    if error.is_no_data() {
        info!(error = ?report, "no data for request");
        return NO_DATA_MESSAGE.into();
    }
    warn!(error = ?report, "fetch failed");
    format!("Error fetching stock data: {error}")
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::provider::testing::StaticProvider;
    use crate::chart::{Chart, ChartKind};
    use crate::error::ChartError;
    use crate::model::fixtures::series_from_closes;
    use crate::strategy::MarkerKind;

    #[derive(Default)]
    struct RecordingRenderer {
        seen: Arc<Mutex<Vec<ChartKind>>>,
    }

    impl ChartRenderer for RecordingRenderer {
        fn render(&self, chart: &Chart) -> Result<(), Report<ChartError>> {
            self.seen.lock().unwrap().push(chart.kind);
            Ok(())
        }
    }

    struct FailingRenderer;

    impl ChartRenderer for FailingRenderer {
        fn render(&self, _chart: &Chart) -> Result<(), Report<ChartError>> {
            Err(Report::new(ChartError::Write))
        }
    }

    fn request() -> StrategyRequest {
        StrategyRequest {
            ticker: "AAPL".into(),
            range: DateRange::new(
                "2020-01-01".parse().unwrap(),
                "2020-12-31".parse().unwrap(),
            )
            .unwrap(),
            short_window: 5,
            long_window: 20,
            ema_window: 10,
        }
    }

    #[tokio::test]
    async fn cycle_renders_both_charts() {
        let closes: Vec<f64> = (0..100).map(|i| 1.0 + i as f64).collect();
        let provider = StaticProvider::with_series(series_from_closes(&closes));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let renderers: Vec<Box<dyn ChartRenderer>> = vec![Box::new(RecordingRenderer {
            seen: Arc::clone(&seen),
        })];

        let outcome = run_cycle(&provider, &renderers, &request(), EmaMode::Recursive)
            .await
            .unwrap();

        match outcome {
            CycleOutcome::Rendered { bars, markers } => {
                assert_eq!(bars, 100);
                assert_eq!(markers.len(), 1);
                assert_eq!(markers[0].kind, MarkerKind::Buy);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(
            *seen.lock().unwrap(),
            vec![ChartKind::SmaCrossover, ChartKind::Ema]
        );
    }

    #[tokio::test]
    async fn no_data_becomes_advisory() {
        let provider = StaticProvider::no_data();
        let outcome = run_cycle(&provider, &[], &request(), EmaMode::Recursive)
            .await
            .unwrap();
        match outcome {
            CycleOutcome::Advisory(message) => assert_eq!(message, NO_DATA_MESSAGE),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_failure_is_distinguishable_advisory() {
        let provider = StaticProvider::failing();
        let outcome = run_cycle(&provider, &[], &request(), EmaMode::Recursive)
            .await
            .unwrap();
        match outcome {
            CycleOutcome::Advisory(message) => {
                assert_ne!(message, NO_DATA_MESSAGE);
                assert!(message.starts_with("Error fetching stock data"));
                assert!(message.contains("static"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn render_failure_is_an_error() {
        let provider = StaticProvider::with_series(series_from_closes(&[1.0, 2.0, 3.0]));
        let renderers: Vec<Box<dyn ChartRenderer>> = vec![Box::new(FailingRenderer)];
        let err = run_cycle(&provider, &renderers, &request(), EmaMode::Recursive)
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            DashboardError::Render { kind } if kind == "sma"
        ));
    }

    #[tokio::test]
    async fn short_history_still_renders() {
        let provider = StaticProvider::with_series(series_from_closes(&[10.0, 11.0, 12.0]));
        let outcome = run_cycle(&provider, &[], &request(), EmaMode::Recursive)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            CycleOutcome::Rendered { bars: 3, ref markers } if markers.is_empty()
        ));
    }

    #[test]
    fn request_line_with_ticker_only_uses_defaults() {
        let parsed = parse_request_line("msft", &request()).unwrap();
        assert_eq!(parsed.ticker, "MSFT");
        assert_eq!(parsed.range, request().range);
        assert_eq!(parsed.short_window, 5);
    }

    #[test]
    fn request_line_overrides_dates() {
        let parsed = parse_request_line("TSLA 2019-01-01 2019-06-01", &request()).unwrap();
        assert_eq!(parsed.range.start, "2019-01-01".parse::<NaiveDate>().unwrap());
        assert_eq!(parsed.range.end, "2019-06-01".parse::<NaiveDate>().unwrap());
    }

    #[test]
    fn request_line_rejects_bad_input() {
        assert!(parse_request_line("   ", &request()).is_err());
        assert!(parse_request_line("AAPL 2019-13-01", &request()).is_err());
        assert!(parse_request_line("AAPL 2019-06-01 2019-01-01", &request()).is_err());
        assert!(parse_request_line("AAPL 2019-01-01 2019-06-01 extra", &request()).is_err());
    }
}
