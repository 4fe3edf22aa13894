use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::api::RetryPolicy;
use crate::indicators::snapshot::CROSS_LOOKBACK;
use crate::strategy::SignalConfig;

const DEFAULT_CONFIG_FILE: &str = "config/perpbot.toml";
const ENV_PREFIX: &str = "PERPBOT";

/// Full application configuration
///
/// Sources, later ones overriding earlier: built-in defaults, the TOML file,
/// `PERPBOT__SECTION__KEY` environment variables. Exchange credentials fall
/// back to `BYBIT_API_KEY` / `BYBIT_API_SECRET`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub exchange: ExchangeConfig,
    pub trading: TradingConfig,
    pub signal: SignalConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub recv_window_ms: u64,
    pub requests_per_second: u32,
    pub request_timeout_secs: u64,
    pub retry_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.bybit.com".to_string(),
            api_key: None,
            api_secret: None,
            recv_window_ms: 5000,
            requests_per_second: 10,
            request_timeout_secs: 10,
            retry_attempts: 3,
            initial_backoff_ms: 500,
        }
    }
}

impl ExchangeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.initial_backoff_ms),
        )
    }
}

// Keep the secret out of logs
impl fmt::Debug for ExchangeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .field("recv_window_ms", &self.recv_window_ms)
            .field("requests_per_second", &self.requests_per_second)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("retry_attempts", &self.retry_attempts)
            .field("initial_backoff_ms", &self.initial_backoff_ms)
            .finish()
    }
}

/// Where the cycle gets its feature snapshots from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    /// Fetch candles and compute snapshots every cycle
    #[default]
    Live,
    /// Read the latest snapshots written by the refresh job
    Store,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub symbol: String,
    pub order_quantity: f64,
    pub poll_interval_secs: u64,
    pub candle_limit: usize,
    pub order_timeout_secs: u64,
    pub snapshot_source: SnapshotSource,
    /// Persist live snapshots to the store as they are computed
    pub persist_snapshots: bool,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbol: "CORE/USDT:USDT".to_string(),
            order_quantity: 1.0,
            poll_interval_secs: 60,
            candle_limit: 100,
            order_timeout_secs: 10,
            snapshot_source: SnapshotSource::Live,
            persist_snapshots: false,
        }
    }
}

impl TradingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn order_timeout(&self) -> Duration {
        Duration::from_secs(self.order_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "perpbot=info,perpbot::strategy=debug".to_string(),
        }
    }
}

impl AppConfig {
    /// Load `.env`, then the config file (explicit path or the default
    /// location if present), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut app: AppConfig = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        app.apply_env_credentials();
        app.validate()?;
        Ok(app)
    }

    fn apply_env_credentials(&mut self) {
        if self.exchange.api_key.is_none() {
            self.exchange.api_key = std::env::var("BYBIT_API_KEY").ok().filter(|k| !k.is_empty());
        }
        if self.exchange.api_secret.is_none() {
            self.exchange.api_secret =
                std::env::var("BYBIT_API_SECRET").ok().filter(|s| !s.is_empty());
        }
        if self.database.url.is_none() {
            self.database.url = std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty());
        }
    }

    pub fn validate(&self) -> Result<()> {
        let trading = &self.trading;
        anyhow::ensure!(
            trading.order_quantity.is_finite() && trading.order_quantity > 0.0,
            "trading.order_quantity must be > 0 (got {})",
            trading.order_quantity
        );
        anyhow::ensure!(
            trading.poll_interval_secs >= 1,
            "trading.poll_interval_secs must be at least 1"
        );
        anyhow::ensure!(
            trading.candle_limit >= 21,
            "trading.candle_limit must be at least 21 (got {})",
            trading.candle_limit
        );
        anyhow::ensure!(
            !trading.symbol.trim().is_empty(),
            "trading.symbol must not be empty"
        );
        anyhow::ensure!(
            self.exchange.requests_per_second > 0,
            "exchange.requests_per_second must be > 0"
        );
        anyhow::ensure!(
            self.exchange.retry_attempts >= 1,
            "exchange.retry_attempts must be at least 1"
        );
        if trading.snapshot_source == SnapshotSource::Store || trading.persist_snapshots {
            anyhow::ensure!(
                self.database.url.is_some(),
                "database.url (or DATABASE_URL) is required when snapshots use the store"
            );
        }

        // Snapshots only record crosses within the last CROSS_LOOKBACK bars
        let signal = &self.signal;
        anyhow::ensure!(
            signal.ema_cross_max_bars <= CROSS_LOOKBACK,
            "signal.ema_cross_max_bars must be at most {} (got {})",
            CROSS_LOOKBACK,
            signal.ema_cross_max_bars
        );
        anyhow::ensure!(
            signal.stoch_cross_max_bars <= CROSS_LOOKBACK,
            "signal.stoch_cross_max_bars must be at most {} (got {})",
            CROSS_LOOKBACK,
            signal.stoch_cross_max_bars
        );
        Ok(())
    }
}
