use std::fmt;

use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::{Indicator, rolling_mean};
use crate::model::PriceSeries;

/// Simple moving average of closes over the trailing `window` bars.
///
/// `None` for the first `window - 1` bars; all `None` if the window is zero or
/// longer than the series.
pub fn calculate_sma(series: &PriceSeries, window: usize) -> Vec<Option<f64>> {
    rolling_mean(&series.closes(), window)
}

/// How the exponential average treats the start of the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmaMode {
    /// `ema[0] = close[0]`, then `ema[i] = a*close[i] + (1-a)*ema[i-1]`.
    #[default]
    Recursive,
    /// Bias-corrected weights: each value is the weighted mean of all closes
    /// so far with weights `(1-a)^age`.
    Adjusted,
}

impl EmaMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "recursive" => Some(Self::Recursive),
            "adjusted" => Some(Self::Adjusted),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recursive => "recursive",
            Self::Adjusted => "adjusted",
        }
    }
}

impl fmt::Display for EmaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Exponential moving average of closes with span `window`
/// (`alpha = 2 / (window + 1)`).
///
/// Defined for every bar. Returns an empty column for an empty series or a
/// zero window.
pub fn calculate_ema(series: &PriceSeries, window: usize, mode: EmaMode) -> Vec<f64> {
    let closes = series.closes();
    if window == 0 || closes.is_empty() {
        return Vec::new();
    }

    let alpha = 2.0 / (window as f64 + 1.0);
    let decay = 1.0 - alpha;

    match mode {
        EmaMode::Recursive => {
            let mut ema = closes[0];
            let mut out = Vec::with_capacity(closes.len());
            out.push(ema);
            for &close in &closes[1..] {
                ema = alpha * close + decay * ema;
                out.push(ema);
            }
            out
        }
        EmaMode::Adjusted => {
            let mut numerator = 0.0;
            let mut denominator = 0.0;
            closes
                .iter()
                .map(|&close| {
                    numerator = close + decay * numerator;
                    denominator = 1.0 + decay * denominator;
                    numerator / denominator
                })
                .collect()
        }
    }
}

/// Simple Moving Average.
pub struct Sma {
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        "sma"
    }

    fn required_bars(&self) -> usize {
        self.period
    }

    fn series(&self, series: &PriceSeries) -> Vec<Option<f64>> {
        calculate_sma(series, self.period)
    }
}

/// Exponential Moving Average.
pub struct Ema {
    period: usize,
    mode: EmaMode,
}

impl Ema {
    pub fn new(period: usize, mode: EmaMode) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period, mode })
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Column label used on charts, e.g. `ema_20`.
    pub fn column_name(&self) -> String {
        format!("ema_{}", self.period)
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        "ema"
    }

    fn required_bars(&self) -> usize {
        1
    }

    fn series(&self, series: &PriceSeries) -> Vec<Option<f64>> {
        calculate_ema(series, self.period, self.mode)
            .into_iter()
            .map(Some)
            .collect()
    }
}
