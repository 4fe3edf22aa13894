use anyhow::Context;
use clap::Parser;
use perpbot::api::BybitClient;
use perpbot::config::SnapshotSource;
use perpbot::db;
use perpbot::execution::{BracketExecutor, CycleOutcome, FeatureFeed, PositionGuard, TradingCycle};
use perpbot::models::Symbol;
use perpbot::strategy::{MtfSignalEngine, Strategy};
use perpbot::AppConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Multi-timeframe perpetual futures trading bot
#[derive(Parser)]
#[clap(name = "perpbot")]
#[clap(about = "Polls 1m/5m/15m candles, decides, and places bracket orders")]
struct Cli {
    /// Path to a TOML config file (default: config/perpbot.toml if present)
    #[clap(long)]
    config: Option<PathBuf>,

    /// Override trading.symbol (e.g. CORE/USDT:USDT)
    #[clap(long)]
    symbol: Option<String>,

    /// Run a single cycle and exit
    #[clap(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(symbol) = cli.symbol {
        config.trading.symbol = symbol;
    }
    setup_logging(&config.logging.filter);

    let symbol = Symbol::new(&config.trading.symbol);
    tracing::info!("🚀 perpbot starting for {}", symbol);
    tracing::info!("  Order quantity: {}", config.trading.order_quantity);
    tracing::info!("  Poll interval: {}s", config.trading.poll_interval_secs);
    tracing::info!("  Snapshot source: {:?}", config.trading.snapshot_source);

    let cycle = build_cycle(&config, symbol).await?;

    if cli.once {
        match cycle.run_once().await {
            CycleOutcome::Executed { decision, result } => {
                tracing::info!("Executed: {}", serde_json::to_string(&decision)?);
                tracing::info!("Legs: {}", serde_json::to_string(&result)?);
            }
            CycleOutcome::Decided(decision) => {
                tracing::info!("Decided: {}", serde_json::to_string(&decision)?);
            }
            CycleOutcome::ExposureOpen => tracing::info!("Exposure open, nothing to do"),
            CycleOutcome::Failed(e) => anyhow::bail!("Cycle failed: {}", e),
        }
        return Ok(());
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("⚠️  Received Ctrl+C, shutting down...");
    };

    cycle.run(config.trading.poll_interval(), shutdown).await;

    tracing::info!("✅ Shutdown complete");
    Ok(())
}

fn setup_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn build_cycle(config: &AppConfig, symbol: Symbol) -> anyhow::Result<TradingCycle> {
    let client = Arc::new(
        BybitClient::new(&config.exchange).context("Failed to create Bybit client")?,
    );
    let order_timeout = config.trading.order_timeout();

    let mut feed = FeatureFeed::new(
        client.clone(),
        config.exchange.retry_policy(),
        config.trading.candle_limit,
    );
    if config.trading.snapshot_source == SnapshotSource::Store || config.trading.persist_snapshots
    {
        let store = db::connect_store(&config.database)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open snapshot store: {}", e))?;
        feed = feed.with_store(
            store,
            config.trading.snapshot_source,
            config.trading.persist_snapshots,
        );
    }

    let strategy: Arc<dyn Strategy> = Arc::new(MtfSignalEngine::new(config.signal.clone()));
    tracing::info!("  Strategy: {}", strategy.name());

    Ok(TradingCycle::new(
        symbol.clone(),
        PositionGuard::new(client.clone(), order_timeout),
        feed,
        strategy,
        BracketExecutor::new(client, symbol, config.trading.order_quantity, order_timeout),
    ))
}
