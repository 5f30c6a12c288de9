use std::fmt;

use chrono::NaiveDate;
use error_stack::{Report, bail};

use crate::error::SeriesError;

/// One daily OHLCV bar.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    /// Positive finite prices with `low <= open, close <= high`.
    pub fn is_well_formed(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite() && *p > 0.0)
            && self.low <= self.open.min(self.close)
            && self.high >= self.open.max(self.close)
    }
}

/// Daily bars for one ticker, ascending by date with no duplicate dates.
///
/// Fetched once per request and never mutated afterwards; indicator output
/// lives in separate structures that borrow the series.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    ticker: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(
        ticker: impl Into<String>,
        bars: Vec<PriceBar>,
    ) -> Result<Self, Report<SeriesError>> {
        for (index, bar) in bars.iter().enumerate() {
            if !bar.is_well_formed() {
                bail!(SeriesError::InvalidPrice {
                    index,
                    date: bar.date.to_string(),
                });
            }
            if index > 0 && bars[index - 1].date >= bar.date {
                bail!(SeriesError::Unordered {
                    index,
                    date: bar.date.to_string(),
                });
            }
        }
        Ok(Self {
            ticker: ticker.into(),
            bars,
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }
}

/// Calendar range for a fetch. `start` is inclusive, `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Everything one dashboard interaction asks for.
#[derive(Debug, Clone)]
pub struct StrategyRequest {
    pub ticker: String,
    pub range: DateRange,
    pub short_window: usize,
    pub long_window: usize,
    pub ema_window: usize,
}
