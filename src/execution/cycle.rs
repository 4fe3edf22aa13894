use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{BracketExecutor, BracketOrderResult, FeatureFeed, PositionGuard};
use crate::models::Symbol;
use crate::strategy::{Decision, Strategy};

/// What one pass of the trading loop did
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Guard found an open position (or could not tell); nothing else ran
    ExposureOpen,
    /// Decision was WAIT
    Decided(Decision),
    Executed {
        decision: Decision,
        result: BracketOrderResult,
    },
    /// Snapshots could not be produced; skipped until the next tick
    Failed(String),
}

/// Guard → snapshots → decide → execute, for a single symbol
pub struct TradingCycle {
    symbol: Symbol,
    guard: PositionGuard,
    feed: FeatureFeed,
    strategy: Arc<dyn Strategy>,
    executor: BracketExecutor,
}

impl TradingCycle {
    pub fn new(
        symbol: Symbol,
        guard: PositionGuard,
        feed: FeatureFeed,
        strategy: Arc<dyn Strategy>,
        executor: BracketExecutor,
    ) -> Self {
        Self {
            symbol,
            guard,
            feed,
            strategy,
            executor,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub async fn run_once(&self) -> CycleOutcome {
        if self.guard.has_open_exposure(&self.symbol).await {
            tracing::info!(symbol = %self.symbol, "Exposure open, skipping cycle");
            return CycleOutcome::ExposureOpen;
        }

        let snapshots = match self.feed.snapshots(&self.symbol).await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                tracing::error!(symbol = %self.symbol, error = %e, "Cycle failed");
                return CycleOutcome::Failed(e.to_string());
            }
        };

        let decision = self.strategy.decide(&snapshots);
        tracing::info!(
            symbol = %self.symbol,
            strategy = self.strategy.name(),
            signal = %decision.signal(),
            confidence = %decision.confidence(),
            score = decision.confidence_score(),
            "Decision"
        );

        let Some(trade) = decision.as_trade() else {
            return CycleOutcome::Decided(decision);
        };

        let result = self.executor.execute(trade).await;
        CycleOutcome::Executed { decision, result }
    }

    /// Run cycles every `period` until `shutdown` resolves
    ///
    /// The first cycle runs immediately. Ticks missed while a cycle is still
    /// running are skipped, so cycles never overlap.
    pub async fn run<F>(&self, period: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval_at(Instant::now(), period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        tracing::info!(
            symbol = %self.symbol,
            interval_secs = period.as_secs(),
            "Trading loop started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(symbol = %self.symbol, "Shutdown requested, stopping loop");
                    break;
                }
                _ = ticker.tick() => {
                    match self.run_once().await {
                        CycleOutcome::Executed { result, .. } if !result.all_placed() => {
                            tracing::warn!(
                                symbol = %self.symbol,
                                failed = ?result.failed_legs(),
                                "Cycle executed with failed legs"
                            );
                        }
                        CycleOutcome::Executed { .. } => {
                            tracing::info!(symbol = %self.symbol, "Cycle executed");
                        }
                        CycleOutcome::Decided(decision) => {
                            tracing::debug!(
                                symbol = %self.symbol,
                                reasoning = decision.reasoning(),
                                "No trade this cycle"
                            );
                        }
                        CycleOutcome::ExposureOpen | CycleOutcome::Failed(_) => {}
                    }
                }
            }
        }
    }
}
