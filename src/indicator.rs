pub mod ma;

use crate::model::PriceSeries;

/// A technical analysis indicator over a daily price series.
///
/// Output is aligned with the input: one entry per bar, `None` while the
/// indicator is still warming up.
pub trait Indicator: Send + Sync {
    /// Unique name of this indicator (e.g., "sma", "ema").
    fn name(&self) -> &str;

    /// Minimum number of bars required to produce a defined value.
    fn required_bars(&self) -> usize;

    fn series(&self, series: &PriceSeries) -> Vec<Option<f64>>;
}

/// Trailing arithmetic mean over `window` values, aligned with `values`.
///
/// Entries before index `window - 1` are `None`. A zero window, or one longer
/// than the input, leaves every entry undefined.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut output = vec![None; values.len()];
    if window == 0 || window > values.len() {
        return output;
    }

    let mut sum: f64 = values[..window].iter().sum();
    output[window - 1] = Some(sum / window as f64);
    for i in window..values.len() {
        sum += values[i] - values[i - window];
        output[i] = Some(sum / window as f64);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_mean_aligns_with_input() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert!((out[2].unwrap() - 2.0).abs() < 1e-9);
        assert!((out[3].unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn rolling_mean_zero_window_is_undefined() {
        assert!(rolling_mean(&[1.0, 2.0], 0).iter().all(Option::is_none));
    }

    #[test]
    fn rolling_mean_window_longer_than_input() {
        assert!(rolling_mean(&[1.0, 2.0], 3).iter().all(Option::is_none));
    }

    #[test]
    fn rolling_mean_empty_input() {
        assert!(rolling_mean(&[], 5).is_empty());
    }

    #[test]
    fn rolling_mean_window_of_one_is_identity() {
        let values = [3.0, 1.5, 7.25];
        let out = rolling_mean(&values, 1);
        for (v, o) in values.iter().zip(out) {
            assert_eq!(Some(*v), o);
        }
    }
}
