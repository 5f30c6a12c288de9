mod cache;
mod chart;
mod config;
mod dashboard;
mod error;
mod indicator;
mod model;
mod provider;
mod strategy;

use std::path::Path;
use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use clap::Parser;
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cache::memory::MemoryCache;
use cache::sqlite::SqliteCache;
use cache::{BarCache, CachedProvider};
use chart::ChartRenderer;
use chart::html::HtmlRenderer;
use chart::terminal::TerminalRenderer;
use config::{AppConfig, StrategyConfig};
use dashboard::{CycleOutcome, parse_request_line, run_cycle};
use indicator::ma::EmaMode;
use model::{DateRange, StrategyRequest};
use provider::DataProvider;
use provider::yahoo::YahooProvider;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("cache error")]
    Cache,
    #[display("provider error")]
    Provider,
    #[display("runtime error")]
    Runtime,
}

#[derive(Parser)]
#[command(
    name = "stock-strategies",
    about = "SMA crossover and EMA charts for daily stock prices"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// Ticker symbol, e.g. AAPL
    #[arg(short, long)]
    ticker: Option<String>,
    /// First day of the range (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Day after the last bar of the range (YYYY-MM-DD, exclusive)
    #[arg(long)]
    end: Option<NaiveDate>,
    #[arg(long)]
    short_window: Option<usize>,
    #[arg(long)]
    long_window: Option<usize>,
    #[arg(long)]
    ema_window: Option<usize>,
    /// `recursive` or `adjusted`
    #[arg(long)]
    ema_mode: Option<String>,
    /// Directory for the HTML charts
    #[arg(long)]
    output_dir: Option<String>,
    /// Skip the bar cache for this run
    #[arg(long)]
    no_cache: bool,
    /// Keep reading `TICKER [START [END]]` lines from stdin after the first cycle
    #[arg(short, long)]
    interactive: bool,
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let mut config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;
    apply_overrides(&mut config, &cli);
    config::validate_strategy(&config.strategy).change_context(AppError::Config)?;

    init_tracing(&config);
    warn_inverted_windows(&config.strategy);

    let request = initial_request(&config)?;
    let ema_mode = config.strategy.ema_mode();

    // ── Provider ──────────────────────────────────────────────────────────────
    let yahoo: Arc<dyn DataProvider> =
        Arc::new(YahooProvider::new(&config.provider).change_context(AppError::Provider)?);

    let provider: Arc<dyn DataProvider> = if config.cache.enabled && !cli.no_cache {
        let cache = build_cache(&config).await?;
        match cache.purge_expired(Utc::now()).await {
            Ok(purged) => info!(purged, backend = %config.cache.backend, "cache ready"),
            Err(e) => tracing::warn!(error = ?e, "failed to purge expired cache entries"),
        }
        Arc::new(CachedProvider::new(yahoo, cache))
    } else {
        info!("bar cache disabled");
        yahoo
    };

    // ── Renderers ─────────────────────────────────────────────────────────────
    let renderers: Vec<Box<dyn ChartRenderer>> = vec![
        Box::new(HtmlRenderer::new(&config.general.output_dir)),
        Box::new(TerminalRenderer),
    ];

    run_and_report(provider.as_ref(), &renderers, &request, ema_mode).await?;

    if !cli.interactive {
        return Ok(());
    }

    // ── Interactive loop ──────────────────────────────────────────────────────
    info!("reading requests from stdin: TICKER [START [END]], empty line or \"quit\" to exit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.change_context(AppError::Runtime)? {
        let line = line.trim();
        if line.is_empty() || line.eq_ignore_ascii_case("quit") {
            break;
        }
        match parse_request_line(line, &request) {
            Ok(next) => run_and_report(provider.as_ref(), &renderers, &next, ema_mode).await?,
            Err(e) => {
                tracing::warn!(error = ?e, "ignoring request");
                eprintln!("{}", e.current_context());
            }
        }
    }

    info!("done");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

fn warn_inverted_windows(strategy: &StrategyConfig) -> bool {
    let inverted = strategy.windows_inverted();
    if inverted {
        tracing::warn!(
            short_window = strategy.short_window,
            long_window = strategy.long_window,
            "short window is not shorter than long window"
        );
    }
    inverted
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    let strategy = &mut config.strategy;
    if let Some(ticker) = &cli.ticker {
        strategy.ticker = ticker.clone();
    }
    if let Some(start) = cli.start {
        strategy.start = start;
    }
    if let Some(end) = cli.end {
        strategy.end = Some(end);
    }
    if let Some(window) = cli.short_window {
        strategy.short_window = window;
    }
    if let Some(window) = cli.long_window {
        strategy.long_window = window;
    }
    if let Some(window) = cli.ema_window {
        strategy.ema_window = window;
    }
    if let Some(mode) = &cli.ema_mode {
        strategy.ema_mode = mode.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.general.output_dir = dir.clone();
    }
}

fn initial_request(config: &AppConfig) -> Result<StrategyRequest, Report<AppError>> {
    let strategy = &config.strategy;
    let end = strategy
        .end
        .or_else(|| Utc::now().date_naive().checked_add_days(Days::new(1)))
        .ok_or_else(|| Report::new(AppError::Config))
        .attach("could not compute default end date")?;
    let range = DateRange::new(strategy.start, end)
        .ok_or_else(|| Report::new(AppError::Config))
        .attach_with(|| format!("end {end} must be after start {}", strategy.start))?;

    Ok(StrategyRequest {
        ticker: strategy.ticker.trim().to_uppercase(),
        range,
        short_window: strategy.short_window,
        long_window: strategy.long_window,
        ema_window: strategy.ema_window,
    })
}

async fn build_cache(config: &AppConfig) -> Result<Arc<dyn BarCache>, Report<AppError>> {
    // Ten years is effectively "never expires".
    const MAX_TTL_MINUTES: u64 = 10 * 366 * 24 * 60;
    let ttl = chrono::Duration::minutes(config.cache.ttl_minutes.min(MAX_TTL_MINUTES) as i64);

    match config.cache.backend.as_str() {
        "sqlite" => {
            let path = Path::new(&config.cache.path);
            let cache = SqliteCache::open(path, ttl)
                .await
                .change_context(AppError::Cache)?;
            Ok(Arc::new(cache))
        }
        _ => Ok(Arc::new(MemoryCache::new(ttl))),
    }
}

async fn run_and_report(
    provider: &dyn DataProvider,
    renderers: &[Box<dyn ChartRenderer>],
    request: &StrategyRequest,
    ema_mode: EmaMode,
) -> Result<(), Report<AppError>> {
    let outcome = run_cycle(provider, renderers, request, ema_mode)
        .await
        .change_context(AppError::Runtime)?;

    match outcome {
        CycleOutcome::Rendered { bars, markers } => {
            info!(
                ticker = %request.ticker,
                bars,
                signals = markers.len(),
                "charts rendered"
            );
        }
        CycleOutcome::Advisory(message) => {
            tracing::warn!(ticker = %request.ticker, %message, "no charts rendered");
            eprintln!("{message}");
        }
    }
    Ok(())
}
