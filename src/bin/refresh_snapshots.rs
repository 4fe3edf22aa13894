/// One ETL pass: fetch 1m/5m/15m candles, compute snapshots, store them.
///
/// Scheduling is external (cron or a systemd timer); the trading loop reads
/// the results when `trading.snapshot_source = "store"`.
use anyhow::Context;
use clap::Parser;
use perpbot::api::BybitClient;
use perpbot::config::SnapshotSource;
use perpbot::db;
use perpbot::execution::FeatureFeed;
use perpbot::models::{Symbol, Timeframe};
use perpbot::AppConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "refresh_snapshots")]
#[clap(about = "Compute and store the latest indicator snapshots")]
struct Cli {
    /// Path to a TOML config file
    #[clap(long)]
    config: Option<PathBuf>,

    /// Symbols to refresh (default: trading.symbol)
    #[clap(long)]
    symbol: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let client = Arc::new(
        BybitClient::new(&config.exchange).context("Failed to create Bybit client")?,
    );
    let store = db::connect_store(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open snapshot store: {}", e))?;
    let feed = FeatureFeed::new(
        client,
        config.exchange.retry_policy(),
        config.trading.candle_limit,
    )
    .with_store(store, SnapshotSource::Live, true);

    let symbols: Vec<Symbol> = if cli.symbol.is_empty() {
        vec![Symbol::new(&config.trading.symbol)]
    } else {
        cli.symbol.iter().map(|s| Symbol::new(s)).collect()
    };

    let mut failures = 0;
    for symbol in &symbols {
        match feed.refresh(symbol).await {
            Ok(snapshots) => {
                let missing = snapshots.missing(&Timeframe::ALL);
                if missing.is_empty() {
                    tracing::info!("✅ {}: stored 1m/5m/15m snapshots", symbol);
                } else {
                    tracing::warn!("⚠️  {}: no snapshot for {:?}", symbol, missing);
                }
            }
            Err(e) => {
                tracing::error!("❌ {}: refresh failed: {}", symbol, e);
                failures += 1;
            }
        }
    }

    anyhow::ensure!(
        failures == 0,
        "{} of {} symbols failed to refresh",
        failures,
        symbols.len()
    );
    Ok(())
}
