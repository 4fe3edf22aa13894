use thiserror::Error;

use crate::models::Timeframe;

/// Failures talking to the exchange.
///
/// `is_transient` separates what a caller may retry with backoff from what
/// must abort the cycle immediately.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("rate limited by exchange: {0}")]
    RateLimited(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("order rejected ({code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("failed to decode exchange response: {0}")]
    Decode(String),

    #[error("invalid order: {0}")]
    InvalidOrder(String),
}

impl ExchangeError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExchangeError::RateLimited(_) | ExchangeError::Network(_) | ExchangeError::Timeout(_)
        )
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ExchangeError::Timeout(0)
        } else if e.is_decode() {
            ExchangeError::Decode(e.to_string())
        } else {
            ExchangeError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(e: serde_json::Error) -> Self {
        ExchangeError::Decode(e.to_string())
    }
}

/// Failures computing a feature snapshot from a candle series
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndicatorError {
    #[error("insufficient data: {have} candles, need at least {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("invalid candle series: {0}")]
    InvalidSeries(String),
}

/// Failures producing the fused per-cycle snapshot set
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("fetching {timeframe} candles: {source}")]
    Exchange {
        timeframe: Timeframe,
        source: ExchangeError,
    },

    #[error("snapshot store: {0}")]
    Store(String),
}
