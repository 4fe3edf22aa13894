pub mod bybit;
pub mod retry;

pub use bybit::BybitClient;
pub use retry::RetryPolicy;

use async_trait::async_trait;
use std::fmt;

use crate::error::ExchangeError;
use crate::models::{Candle, Side, Symbol, Timeframe};

/// Supplies ascending OHLCV candles for a symbol and timeframe
#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn get_candles(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError>;
}

/// Order placement and position queries
#[async_trait]
pub trait ExchangeTrading: Send + Sync {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError>;

    async fn get_positions(&self, symbol: &Symbol) -> Result<Vec<PositionRecord>, ExchangeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Limit,
    Market,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "Limit",
            OrderType::Market => "Market",
        }
    }
}

/// Which way price must cross the trigger for a conditional order to fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDirection {
    Above,
    Below,
}

impl TriggerDirection {
    /// Exchange code: 1 = rises to trigger, 2 = falls to trigger
    pub fn code(&self) -> u8 {
        match self {
            TriggerDirection::Above => 1,
            TriggerDirection::Below => 2,
        }
    }
}

impl fmt::Display for TriggerDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerDirection::Above => f.write_str("above"),
            TriggerDirection::Below => f.write_str("below"),
        }
    }
}

/// Price feed a trigger is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    MarkPrice,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::MarkPrice => "MarkPrice",
        }
    }
}

/// Optional order flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderParams {
    pub reduce_only: bool,
    pub trigger_price: Option<f64>,
    pub trigger_direction: Option<TriggerDirection>,
    pub trigger_by: Option<TriggerSource>,
    pub client_order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub order_type: OrderType,
    pub side: Side,
    pub amount: f64,
    pub price: Option<f64>,
    pub params: OrderParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAck {
    pub order_id: String,
}

/// One position entry as reported by the exchange
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRecord {
    pub symbol: String,
    pub side: Option<Side>,
    pub size: f64,
}
