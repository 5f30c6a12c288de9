pub mod html;
pub mod terminal;

use std::fmt;

use chrono::NaiveDate;
use error_stack::Report;

use crate::error::ChartError;
use crate::strategy::MarkerKind;
use crate::strategy::crossover::SmaCrossover;
use crate::strategy::ema::EmaOverlay;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    SmaCrossover,
    Ema,
}

impl ChartKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SmaCrossover => "sma",
            Self::Ema => "ema",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One series drawn on a chart.
#[derive(Debug, Clone, PartialEq)]
pub enum Trace {
    Candlestick {
        name: String,
        x: Vec<NaiveDate>,
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
    },
    /// `None` entries are drawn as gaps.
    Line {
        name: String,
        x: Vec<NaiveDate>,
        y: Vec<Option<f64>>,
    },
    Markers {
        name: String,
        kind: MarkerKind,
        x: Vec<NaiveDate>,
        y: Vec<f64>,
    },
}

impl Trace {
    pub fn name(&self) -> &str {
        match self {
            Self::Candlestick { name, .. } | Self::Line { name, .. } | Self::Markers { name, .. } => {
                name
            }
        }
    }
}

/// Renderer-independent description of a chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub kind: ChartKind,
    pub ticker: String,
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub traces: Vec<Trace>,
}

/// Sink for finished charts.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, chart: &Chart) -> Result<(), Report<ChartError>>;
}

/// Candles, both averages and the buy/sell markers.
pub fn sma_chart(crossover: &SmaCrossover<'_>, ticker: &str) -> Chart {
    let series = crossover.series();
    let bars = series.bars();
    let dates = series.dates();

    let mut traces = vec![
        Trace::Candlestick {
            name: "Price".into(),
            x: dates.clone(),
            open: bars.iter().map(|b| b.open).collect(),
            high: bars.iter().map(|b| b.high).collect(),
            low: bars.iter().map(|b| b.low).collect(),
            close: bars.iter().map(|b| b.close).collect(),
        },
        Trace::Line {
            name: "Short SMA".into(),
            x: dates.clone(),
            y: crossover.short_sma.clone(),
        },
        Trace::Line {
            name: "Long SMA".into(),
            x: dates,
            y: crossover.long_sma.clone(),
        },
    ];

    let markers = crossover.markers();
    for (kind, name) in [(MarkerKind::Buy, "Buy"), (MarkerKind::Sell, "Sell")] {
        let (x, y) = markers
            .iter()
            .filter(|m| m.kind == kind)
            .map(|m| (m.date, m.price))
            .unzip();
        traces.push(Trace::Markers {
            name: name.into(),
            kind,
            x,
            y,
        });
    }

    Chart {
        kind: ChartKind::SmaCrossover,
        ticker: ticker.to_owned(),
        title: format!("{ticker} Price with SMA"),
        x_title: "Date".into(),
        y_title: "Price".into(),
        traces,
    }
}

/// Close line with the exponential average on top.
pub fn ema_chart(overlay: &EmaOverlay<'_>, ticker: &str) -> Chart {
    let series = overlay.series();
    let dates = series.dates();
    let label = format!("EMA{}", overlay.window);

    Chart {
        kind: ChartKind::Ema,
        ticker: ticker.to_owned(),
        title: format!("{ticker} Price and {label}"),
        x_title: "Date".into(),
        y_title: "Price".into(),
        traces: vec![
            Trace::Line {
                name: "Close".into(),
                x: dates.clone(),
                y: series.closes().into_iter().map(Some).collect(),
            },
            Trace::Line {
                name: label,
                x: dates,
                y: overlay.values.iter().copied().map(Some).collect(),
            },
        ],
    }
}
