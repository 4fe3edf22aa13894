use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::api::{
    ExchangeTrading, OrderParams, OrderRequest, OrderType, TriggerDirection, TriggerSource,
};
use crate::models::{Side, Symbol};
use crate::strategy::TradeDecision;

/// Which protective exit a conditional order represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitLeg {
    TakeProfit,
    StopLoss,
}

impl TriggerDirection {
    /// Trigger direction for an exit leg of a position opened on `entry_side`
    ///
    /// | entry | take profit | stop loss |
    /// |-------|-------------|-----------|
    /// | Buy   | above       | below     |
    /// | Sell  | below       | above     |
    pub fn for_leg(entry_side: Side, leg: ExitLeg) -> Self {
        match (entry_side, leg) {
            (Side::Buy, ExitLeg::TakeProfit) => TriggerDirection::Above,
            (Side::Buy, ExitLeg::StopLoss) => TriggerDirection::Below,
            (Side::Sell, ExitLeg::TakeProfit) => TriggerDirection::Below,
            (Side::Sell, ExitLeg::StopLoss) => TriggerDirection::Above,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketLeg {
    Entry,
    TakeProfit,
    StopLoss,
}

impl fmt::Display for BracketLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BracketLeg::Entry => f.write_str("entry"),
            BracketLeg::TakeProfit => f.write_str("take_profit"),
            BracketLeg::StopLoss => f.write_str("stop_loss"),
        }
    }
}

/// Result of placing one leg
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LegOutcome {
    Placed {
        order_id: String,
        requested_price: f64,
    },
    Failed {
        error_message: String,
    },
}

impl LegOutcome {
    pub fn is_placed(&self) -> bool {
        matches!(self, LegOutcome::Placed { .. })
    }

    pub fn order_id(&self) -> Option<&str> {
        match self {
            LegOutcome::Placed { order_id, .. } => Some(order_id),
            LegOutcome::Failed { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            LegOutcome::Placed { .. } => None,
            LegOutcome::Failed { error_message } => Some(error_message),
        }
    }
}

/// Every leg of a bracket is always reported, placed or not
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BracketOrderResult {
    pub entry: LegOutcome,
    pub take_profit: LegOutcome,
    pub stop_loss: LegOutcome,
}

impl BracketOrderResult {
    pub fn all_placed(&self) -> bool {
        self.entry.is_placed() && self.take_profit.is_placed() && self.stop_loss.is_placed()
    }

    pub fn failed_legs(&self) -> Vec<BracketLeg> {
        [
            (BracketLeg::Entry, &self.entry),
            (BracketLeg::TakeProfit, &self.take_profit),
            (BracketLeg::StopLoss, &self.stop_loss),
        ]
        .into_iter()
        .filter(|(_, outcome)| !outcome.is_placed())
        .map(|(leg, _)| leg)
        .collect()
    }
}

/// Places a limit entry plus reduce-only, mark-price-triggered exits
///
/// Legs are placed one after another and never rolled back. Each exchange
/// call is bounded by `call_timeout`; a timeout is a failed leg. Retrying a
/// failed leg is left to the caller.
pub struct BracketExecutor {
    exchange: Arc<dyn ExchangeTrading>,
    symbol: Symbol,
    quantity: f64,
    call_timeout: Duration,
}

impl BracketExecutor {
    pub fn new(
        exchange: Arc<dyn ExchangeTrading>,
        symbol: Symbol,
        quantity: f64,
        call_timeout: Duration,
    ) -> Self {
        Self {
            exchange,
            symbol,
            quantity,
            call_timeout,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Build the three orders for a decision without sending them
    pub fn build_orders(&self, trade: &TradeDecision) -> [(BracketLeg, OrderRequest); 3] {
        let entry = OrderRequest {
            symbol: self.symbol.clone(),
            order_type: OrderType::Limit,
            side: trade.side,
            amount: self.quantity,
            price: Some(trade.entry_price),
            params: OrderParams {
                client_order_id: Some(uuid::Uuid::new_v4().to_string()),
                ..OrderParams::default()
            },
        };

        [
            (BracketLeg::Entry, entry),
            (
                BracketLeg::TakeProfit,
                self.exit_order(trade.side, ExitLeg::TakeProfit, trade.take_profit.level),
            ),
            (
                BracketLeg::StopLoss,
                self.exit_order(trade.side, ExitLeg::StopLoss, trade.stop_loss.level),
            ),
        ]
    }

    fn exit_order(&self, entry_side: Side, leg: ExitLeg, trigger_price: f64) -> OrderRequest {
        OrderRequest {
            symbol: self.symbol.clone(),
            order_type: OrderType::Market,
            side: entry_side.opposite(),
            amount: self.quantity,
            price: None,
            params: OrderParams {
                reduce_only: true,
                trigger_price: Some(trigger_price),
                trigger_direction: Some(TriggerDirection::for_leg(entry_side, leg)),
                trigger_by: Some(TriggerSource::MarkPrice),
                client_order_id: Some(uuid::Uuid::new_v4().to_string()),
            },
        }
    }

    pub async fn execute(&self, trade: &TradeDecision) -> BracketOrderResult {
        tracing::info!(
            symbol = %self.symbol,
            side = %trade.side,
            entry = trade.entry_price,
            take_profit = trade.take_profit.level,
            stop_loss = trade.stop_loss.level,
            quantity = self.quantity,
            "Placing bracket order"
        );

        let [entry, take_profit, stop_loss] = self.build_orders(trade);

        let result = BracketOrderResult {
            entry: self.place_leg(entry.0, &entry.1, trade.entry_price).await,
            take_profit: self
                .place_leg(take_profit.0, &take_profit.1, trade.take_profit.level)
                .await,
            stop_loss: self
                .place_leg(stop_loss.0, &stop_loss.1, trade.stop_loss.level)
                .await,
        };

        if result.all_placed() {
            tracing::info!(symbol = %self.symbol, "Bracket fully placed");
        } else {
            tracing::warn!(
                symbol = %self.symbol,
                failed = ?result.failed_legs(),
                "Bracket placed with failed legs"
            );
        }

        result
    }

    async fn place_leg(&self, leg: BracketLeg, order: &OrderRequest, price: f64) -> LegOutcome {
        match tokio::time::timeout(self.call_timeout, self.exchange.place_order(order)).await {
            Ok(Ok(ack)) => {
                tracing::info!(
                    symbol = %self.symbol,
                    leg = %leg,
                    order_id = %ack.order_id,
                    price,
                    "Order placed"
                );
                LegOutcome::Placed {
                    order_id: ack.order_id,
                    requested_price: price,
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(symbol = %self.symbol, leg = %leg, error = %e, "Order failed");
                LegOutcome::Failed {
                    error_message: e.to_string(),
                }
            }
            Err(_) => {
                let message = format!("timed out after {:?}", self.call_timeout);
                tracing::warn!(symbol = %self.symbol, leg = %leg, "Order {}", message);
                LegOutcome::Failed {
                    error_message: message,
                }
            }
        }
    }
}
