use std::sync::Arc;
use std::time::Duration;

use crate::api::ExchangeTrading;
use crate::models::Symbol;

/// Gates each cycle on the exchange's view of open exposure
///
/// Fails closed: any query error or timeout reports exposure as open, so a
/// cycle is skipped rather than risking a second position.
pub struct PositionGuard {
    exchange: Arc<dyn ExchangeTrading>,
    call_timeout: Duration,
}

impl PositionGuard {
    pub fn new(exchange: Arc<dyn ExchangeTrading>, call_timeout: Duration) -> Self {
        Self {
            exchange,
            call_timeout,
        }
    }

    pub async fn has_open_exposure(&self, symbol: &Symbol) -> bool {
        let query = self.exchange.get_positions(symbol);
        match tokio::time::timeout(self.call_timeout, query).await {
            Ok(Ok(positions)) => {
                // NaN sizes count as exposure
                let open = positions
                    .iter()
                    .any(|p| p.size.abs() > 0.0 || !p.size.is_finite());
                if open {
                    tracing::info!(symbol = %symbol, positions = positions.len(), "Open exposure");
                }
                open
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    symbol = %symbol,
                    error = %e,
                    "Position query failed, assuming exposure"
                );
                true
            }
            Err(_) => {
                tracing::warn!(
                    symbol = %symbol,
                    timeout = ?self.call_timeout,
                    "Position query timed out, assuming exposure"
                );
                true
            }
        }
    }
}
