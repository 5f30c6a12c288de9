use std::path::Path;

use chrono::NaiveDate;
use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::indicator::ma::EmaMode;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_output_dir() -> String {
    "./charts".into()
}

fn default_provider_name() -> String {
    "yahoo".into()
}

fn default_base_url() -> String {
    "https://query1.finance.yahoo.com".into()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; stock-strategies)".into()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_requests_per_second() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

fn default_cache_backend() -> String {
    "memory".into()
}

fn default_cache_path() -> String {
    "./data/bars.db".into()
}

fn default_ttl_minutes() -> u64 {
    60
}

fn default_ticker() -> String {
    "AAPL".into()
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2010, 1, 1).unwrap_or_default()
}

fn default_short_window() -> usize {
    50
}

fn default_long_window() -> usize {
    200
}

fn default_ema_window() -> usize {
    20
}

fn default_ema_mode() -> String {
    "recursive".into()
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Accepted values: `"memory"` | `"sqlite"`
    #[serde(default = "default_cache_backend")]
    pub backend: String,
    /// Database file for the `sqlite` backend.
    #[serde(default = "default_cache_path")]
    pub path: String,
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: default_cache_backend(),
            path: default_cache_path(),
            ttl_minutes: default_ttl_minutes(),
        }
    }
}

/// Request defaults; every field can be overridden on the command line.
#[derive(Debug, Deserialize)]
pub struct StrategyConfig {
    #[serde(default = "default_ticker")]
    pub ticker: String,
    #[serde(default = "default_start_date")]
    pub start: NaiveDate,
    /// Exclusive. Defaults to tomorrow so that today's bar is included.
    pub end: Option<NaiveDate>,
    #[serde(default = "default_short_window")]
    pub short_window: usize,
    #[serde(default = "default_long_window")]
    pub long_window: usize,
    #[serde(default = "default_ema_window")]
    pub ema_window: usize,
    /// Accepted values: `"recursive"` | `"adjusted"`
    #[serde(default = "default_ema_mode")]
    pub ema_mode: String,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            ticker: default_ticker(),
            start: default_start_date(),
            end: None,
            short_window: default_short_window(),
            long_window: default_long_window(),
            ema_window: default_ema_window(),
            ema_mode: default_ema_mode(),
        }
    }
}

impl StrategyConfig {
    pub fn ema_mode(&self) -> EmaMode {
        EmaMode::from_str(&self.ema_mode).unwrap_or_default()
    }

    /// `true` when the "short" average is not shorter than the "long" one.
    ///
    /// Allowed, but the caller should warn once logging is up.
    pub fn windows_inverted(&self) -> bool {
        self.short_window >= self.long_window
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
///
/// A missing file is not an error: every section has defaults.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .change_context(ConfigError::ReadFile)
            .attach_with(|| format!("path: {}", path.display()))?;
        parse(&content)?
    } else {
        parse("")?
    };

    validate(&config)?;

    Ok(config)
}

fn parse(content: &str) -> Result<AppConfig, Report<ConfigError>> {
    toml::from_str(content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];
const VALID_PROVIDERS: &[&str] = &["yahoo"];
const VALID_CACHE_BACKENDS: &[&str] = &["memory", "sqlite"];

pub fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_provider(config)?;
    validate_cache(config)?;
    validate_strategy(&config.strategy)?;
    Ok(())
}

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_LOG_FORMATS.contains(&config.general.log_format.as_str()) {
        return Err(invalid(format!(
            "general.log_format \"{}\" is not valid",
            config.general.log_format
        )));
    }
    Ok(())
}

fn validate_provider(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let provider = &config.provider;
    if !VALID_PROVIDERS.contains(&provider.name.as_str()) {
        return Err(invalid(format!(
            "provider.name \"{}\" is not a known data provider",
            provider.name
        )));
    }
    if provider.requests_per_second == 0 {
        return Err(invalid("provider.requests_per_second must be > 0".into()));
    }
    if provider.timeout_secs == 0 {
        return Err(invalid("provider.timeout_secs must be > 0".into()));
    }
    Ok(())
}

fn validate_cache(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_CACHE_BACKENDS.contains(&config.cache.backend.as_str()) {
        return Err(invalid(format!(
            "cache.backend \"{}\" is not valid",
            config.cache.backend
        )));
    }
    Ok(())
}

/// Checks shared by the config file and command-line overrides.
pub fn validate_strategy(strategy: &StrategyConfig) -> Result<(), Report<ConfigError>> {
    if strategy.ticker.trim().is_empty() {
        return Err(invalid("strategy.ticker must not be empty".into()));
    }
    for (name, value) in [
        ("short_window", strategy.short_window),
        ("long_window", strategy.long_window),
        ("ema_window", strategy.ema_window),
    ] {
        if value == 0 {
            return Err(invalid(format!("strategy.{name} must be > 0")));
        }
    }
    if EmaMode::from_str(&strategy.ema_mode).is_none() {
        return Err(invalid(format!(
            "strategy.ema_mode \"{}\" is not valid",
            strategy.ema_mode
        )));
    }
    if let Some(end) = strategy.end.filter(|end| *end <= strategy.start) {
        return Err(invalid(format!(
            "strategy.end {end} must be after strategy.start {}",
            strategy.start
        )));
    }
    Ok(())
}
