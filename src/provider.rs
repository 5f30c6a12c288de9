pub mod yahoo;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::ProviderError;
use crate::model::{DateRange, PriceSeries};

/// Source of daily price history.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn DataProvider`).
pub trait DataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch daily bars for `ticker` with dates in `range` (end exclusive).
    ///
    /// A request that succeeds but yields zero bars fails with
    /// [`ProviderError::NoData`]; transport or decoding problems use the
    /// other variants.
    fn fetch_daily_bars(
        &self,
        ticker: &str,
        range: DateRange,
    ) -> BoxFuture<'_, Result<PriceSeries, Report<ProviderError>>>;
}
