use tracing::debug;

use crate::indicator::Indicator;
use crate::indicator::ma::{Ema, EmaMode};
use crate::model::PriceSeries;

/// Exponential average column computed over a borrowed price series.
#[derive(Debug, Clone, PartialEq)]
pub struct EmaOverlay<'a> {
    series: &'a PriceSeries,
    pub window: usize,
    pub mode: EmaMode,
    /// Column label, `ema_<window>`.
    pub column: String,
    pub values: Vec<f64>,
}

/// Compute the EMA overlay. `None` for an empty series or a zero window.
pub fn ema_overlay(series: &PriceSeries, window: usize, mode: EmaMode) -> Option<EmaOverlay<'_>> {
    if series.is_empty() {
        return None;
    }
    let ema = Ema::new(window, mode).ok()?;
    debug!(
        indicator = ema.name(),
        period = ema.period(),
        mode = %mode,
        bars = series.len(),
        "computing exponential average"
    );
    let values = ema.series(series).into_iter().flatten().collect();

    Some(EmaOverlay {
        series,
        window,
        mode,
        column: ema.column_name(),
        values,
    })
}

impl<'a> EmaOverlay<'a> {
    pub fn series(&self) -> &'a PriceSeries {
        self.series
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::series_from_closes;

    #[test]
    fn overlay_has_one_value_per_bar() {
        let series = series_from_closes(&[10.0, 11.0, 12.5, 9.0, 13.0]);
        let overlay = ema_overlay(&series, 20, EmaMode::Recursive).unwrap();
        assert_eq!(overlay.values.len(), series.len());
        assert_eq!(overlay.values[0], 10.0);
        assert_eq!(overlay.column, "ema_20");
    }

    #[test]
    fn overlay_follows_recursive_definition() {
        let closes = [20.0, 22.0, 21.0, 25.0, 24.0, 30.0];
        let series = series_from_closes(&closes);
        let window = 4;
        let overlay = ema_overlay(&series, window, EmaMode::Recursive).unwrap();

        let alpha = 2.0 / (window as f64 + 1.0);
        let mut expected = closes[0];
        for (i, close) in closes.iter().enumerate().skip(1) {
            expected = alpha * close + (1.0 - alpha) * expected;
            assert!((overlay.values[i] - expected).abs() < 1e-12);
        }
        assert_eq!(overlay.last(), overlay.values.last().copied());
    }

    #[test]
    fn overlay_empty_series() {
        let series = series_from_closes(&[]);
        assert!(ema_overlay(&series, 20, EmaMode::Recursive).is_none());
    }

    #[test]
    fn overlay_zero_window() {
        let series = series_from_closes(&[1.0, 2.0]);
        assert!(ema_overlay(&series, 0, EmaMode::Recursive).is_none());
    }

    #[test]
    fn overlay_leaves_series_untouched() {
        let series = series_from_closes(&[1.0, 2.0, 3.0]);
        let before = series.clone();
        let overlay = ema_overlay(&series, 2, EmaMode::Adjusted).unwrap();
        assert_eq!(overlay.series(), &before);
    }
}
