pub mod crossover;
pub mod ema;

use std::fmt;

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Buy,
    Sell,
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// A bar where the crossover signal flipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub index: usize,
    pub date: NaiveDate,
    pub kind: MarkerKind,
    /// Where the marker sits on the chart.
    pub price: f64,
}
