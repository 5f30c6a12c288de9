use tracing::debug;

use crate::indicator::Indicator;
use crate::indicator::ma::Sma;
use crate::model::PriceSeries;
use crate::strategy::{Marker, MarkerKind};

/// Moving-average crossover columns computed over a borrowed price series.
///
/// All columns have one entry per bar of `series`.
#[derive(Debug, Clone, PartialEq)]
pub struct SmaCrossover<'a> {
    series: &'a PriceSeries,
    pub short_window: usize,
    pub long_window: usize,
    pub short_sma: Vec<Option<f64>>,
    pub long_sma: Vec<Option<f64>>,
    /// `1.0` while the short average is above the long one, else `0.0`.
    pub signal: Vec<f64>,
    /// Signal delta: `+1.0` buy, `-1.0` sell. Undefined at index 0.
    pub position: Vec<Option<f64>>,
}

/// Run the SMA crossover strategy.
///
/// Returns `None` for an empty series. `short_window < long_window` is the
/// intended usage but is not enforced.
///
/// The signal is evaluated from index `short_window` onwards; a comparison
/// against an undefined average counts as "not above", so nothing fires until
/// both averages have warmed up.
pub fn sma_strategy(
    series: &PriceSeries,
    short_window: usize,
    long_window: usize,
) -> Option<SmaCrossover<'_>> {
    if series.is_empty() {
        return None;
    }

    let short_sma = sma_column(series, short_window);
    let long_sma = sma_column(series, long_window);

    let mut signal = vec![0.0; series.len()];
    for i in short_window..series.len() {
        signal[i] = match (short_sma[i], long_sma[i]) {
            (Some(short), Some(long)) if short > long => 1.0,
            _ => 0.0,
        };
    }

    let position = std::iter::once(None)
        .chain(signal.windows(2).map(|w| Some(w[1] - w[0])))
        .collect();

    Some(SmaCrossover {
        series,
        short_window,
        long_window,
        short_sma,
        long_sma,
        signal,
        position,
    })
}

fn sma_column(series: &PriceSeries, window: usize) -> Vec<Option<f64>> {
    match Sma::new(window) {
        Ok(sma) => {
            debug!(
                indicator = sma.name(),
                period = sma.period(),
                bars = series.len(),
                required = sma.required_bars(),
                "computing moving average"
            );
            sma.series(series)
        }
        Err(_) => vec![None; series.len()],
    }
}

impl<'a> SmaCrossover<'a> {
    pub fn series(&self) -> &'a PriceSeries {
        self.series
    }

    /// Buy and sell points in date order.
    pub fn markers(&self) -> Vec<Marker> {
        let bars = self.series.bars();
        self.position
            .iter()
            .enumerate()
            .filter_map(|(index, delta)| {
                let kind = match *delta {
                    Some(d) if d > 0.0 => MarkerKind::Buy,
                    Some(d) if d < 0.0 => MarkerKind::Sell,
                    _ => return None,
                };
                Some(Marker {
                    index,
                    date: bars[index].date,
                    kind,
                    price: self.long_sma[index].unwrap_or(bars[index].close),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::series_from_closes;

    #[test]
    fn empty_series_yields_nothing() {
        let series = series_from_closes(&[]);
        assert!(sma_strategy(&series, 5, 20).is_none());
    }

    #[test]
    fn columns_match_series_length() {
        let series = series_from_closes(&[5.0; 7]);
        let result = sma_strategy(&series, 2, 4).unwrap();
        assert_eq!(result.short_sma.len(), 7);
        assert_eq!(result.long_sma.len(), 7);
        assert_eq!(result.signal.len(), 7);
        assert_eq!(result.position.len(), 7);
        assert_eq!(result.position[0], None);
    }

    #[test]
    fn constant_prices_never_signal() {
        let series = series_from_closes(&[100.0; 60]);
        let result = sma_strategy(&series, 5, 20).unwrap();

        for i in 4..60 {
            assert!((result.short_sma[i].unwrap() - 100.0).abs() < 1e-9);
        }
        for i in 19..60 {
            assert!((result.long_sma[i].unwrap() - 100.0).abs() < 1e-9);
        }
        assert!(result.signal.iter().all(|s| *s == 0.0));
        assert!(result.position[1..].iter().all(|p| *p == Some(0.0)));
        assert!(result.markers().is_empty());
    }

    #[test]
    fn rising_prices_buy_once_when_long_average_warms_up() {
        let closes: Vec<f64> = (0..100).map(|i| 1.0 + i as f64).collect();
        let series = series_from_closes(&closes);
        let result = sma_strategy(&series, 5, 20).unwrap();

        for i in 20..100 {
            assert!(result.short_sma[i].unwrap() > result.long_sma[i].unwrap());
        }

        let markers = result.markers();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].kind, MarkerKind::Buy);
        assert_eq!(markers[0].index, 19);
        assert_eq!(result.position[19], Some(1.0));
        assert!((markers[0].price - result.long_sma[19].unwrap()).abs() < 1e-12);
    }

    #[test]
    fn v_shape_buys_at_the_crossing() {
        let mut closes: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        closes.extend((1..=30).map(|i| 71.0 + 3.0 * i as f64));
        let series = series_from_closes(&closes);
        let result = sma_strategy(&series, 5, 20).unwrap();

        let crossing = (19..closes.len())
            .find(|&i| result.short_sma[i].unwrap() > result.long_sma[i].unwrap())
            .expect("short average never rose above long");
        assert!(crossing >= 30);
        assert_eq!(result.position[crossing], Some(1.0));
        assert_eq!(result.signal[crossing - 1], 0.0);

        let buys: Vec<_> = result
            .markers()
            .into_iter()
            .filter(|m| m.kind == MarkerKind::Buy)
            .collect();
        assert_eq!(buys.len(), 1);
        assert_eq!(buys[0].index, crossing);
    }

    #[test]
    fn peak_produces_sell_marker() {
        let mut closes: Vec<f64> = (0..30).map(|i| 50.0 + 2.0 * i as f64).collect();
        closes.extend((1..=30).map(|i| 108.0 - 3.0 * i as f64));
        let series = series_from_closes(&closes);
        let result = sma_strategy(&series, 5, 20).unwrap();

        let markers = result.markers();
        let kinds: Vec<_> = markers.iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![MarkerKind::Buy, MarkerKind::Sell]);
        assert_eq!(result.position[markers[1].index], Some(-1.0));
    }

    #[test]
    fn undefined_long_average_counts_as_not_above() {
        let closes: Vec<f64> = (0..10).map(|i| 10.0 + i as f64).collect();
        let series = series_from_closes(&closes);
        let result = sma_strategy(&series, 2, 5).unwrap();

        // short is defined from index 1 and the signal activates at index 2,
        // but the long average only exists from index 4.
        assert_eq!(result.signal[2], 0.0);
        assert_eq!(result.signal[3], 0.0);
        assert_eq!(result.signal[4], 1.0);
        assert_eq!(result.position[4], Some(1.0));
    }

    #[test]
    fn signal_activates_at_short_window_index() {
        // Falling prices with the "short" window longer than the "long" one:
        // both averages exist at index 9 with short > long, but the signal
        // only starts at index 10.
        let closes: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let series = series_from_closes(&closes);
        let result = sma_strategy(&series, 10, 3).unwrap();

        assert!(result.short_sma[9].unwrap() > result.long_sma[9].unwrap());
        assert_eq!(result.signal[9], 0.0);
        assert_eq!(result.signal[10], 1.0);
        assert_eq!(result.position[10], Some(1.0));
    }

    #[test]
    fn zero_window_degrades_to_undefined() {
        let series = series_from_closes(&[1.0, 2.0, 3.0]);
        let result = sma_strategy(&series, 0, 2).unwrap();
        assert!(result.short_sma.iter().all(Option::is_none));
        assert!(result.signal.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn window_longer_than_series_never_signals() {
        let series = series_from_closes(&[1.0, 2.0, 3.0]);
        let result = sma_strategy(&series, 5, 20).unwrap();
        assert!(result.long_sma.iter().all(Option::is_none));
        assert!(result.markers().is_empty());
    }

    #[test]
    fn repeated_runs_are_identical() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + ((i * 37) % 17) as f64).collect();
        let series = series_from_closes(&closes);
        let first = sma_strategy(&series, 5, 20).unwrap();
        let second = sma_strategy(&series, 5, 20).unwrap();
        assert_eq!(first, second);
        assert_eq!(series, series_from_closes(&closes));
    }
}
