use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum SeriesError {
    #[display("bar {index} is not after the previous bar ({date})")]
    Unordered { index: usize, date: String },
    #[display("bar {index} has an invalid price range ({date})")]
    InvalidPrice { index: usize, date: String },
}

#[derive(Debug, Display, Error)]
pub enum ProviderError {
    #[display("no data found for {ticker} in the requested range")]
    NoData { ticker: String },
    #[display("request to {provider} failed")]
    Request { provider: String },
    #[display("failed to parse response from {provider}")]
    ResponseParse { provider: String },
}

impl ProviderError {
    /// `true` when the provider answered but had nothing for the request.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData { .. })
    }
}

#[derive(Debug, Display, Error)]
pub enum CacheError {
    #[display("cache migration failed")]
    Migration,
    #[display("failed to write cache entry")]
    Insert,
    #[display("failed to read cache entry")]
    Query,
}

#[derive(Debug, Display, Error)]
pub enum IndicatorError {
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
}

#[derive(Debug, Display, Error)]
pub enum ChartError {
    #[display("failed to serialize chart")]
    Serialize,
    #[display("failed to write chart output")]
    Write,
}

#[derive(Debug, Display, Error)]
pub enum DashboardError {
    #[display("failed to render {kind} chart")]
    Render { kind: String },
}
