use std::sync::Arc;

use crate::api::{CandleSource, RetryPolicy};
use crate::config::SnapshotSource;
use crate::db::SnapshotStore;
use crate::error::FeedError;
use crate::indicators::{compute_snapshot, FeatureSnapshot};
use crate::models::{Symbol, Timeframe};
use crate::strategy::TimeframeSnapshots;

/// A stored snapshot is stale once its bar closed more than this many
/// intervals ago
pub const MAX_STORED_AGE_INTERVALS: i64 = 2;

/// Produces the fused 1m/5m/15m snapshot set for one cycle
///
/// In live mode the three timeframes are fetched concurrently and all
/// snapshots come from the same pass. A timeframe whose candles cannot
/// produce a snapshot is left empty; the decision engine turns that into a
/// WAIT naming the timeframe. Exchange errors (after retries) fail the feed.
pub struct FeatureFeed {
    source: Arc<dyn CandleSource>,
    store: Option<Arc<dyn SnapshotStore>>,
    mode: SnapshotSource,
    persist: bool,
    retry: RetryPolicy,
    candle_limit: usize,
}

impl FeatureFeed {
    pub fn new(source: Arc<dyn CandleSource>, retry: RetryPolicy, candle_limit: usize) -> Self {
        Self {
            source,
            store: None,
            mode: SnapshotSource::Live,
            persist: false,
            retry,
            candle_limit,
        }
    }

    /// Attach a store. `persist` saves live snapshots as they are computed.
    pub fn with_store(
        mut self,
        store: Arc<dyn SnapshotStore>,
        mode: SnapshotSource,
        persist: bool,
    ) -> Self {
        self.store = Some(store);
        self.mode = mode;
        self.persist = persist;
        self
    }

    pub async fn snapshots(&self, symbol: &Symbol) -> Result<TimeframeSnapshots, FeedError> {
        match self.mode {
            SnapshotSource::Live => {
                let snapshots = self.compute_live(symbol).await?;
                if self.persist {
                    // A failed write must not block trading on fresh data
                    if let Err(e) = self.save_all(symbol, &snapshots).await {
                        tracing::warn!(symbol = %symbol, error = %e, "Failed to persist snapshots");
                    }
                }
                Ok(snapshots)
            }
            SnapshotSource::Store => self.load_from_store(symbol).await,
        }
    }

    /// Compute all three snapshots from fresh candles and store them
    pub async fn refresh(&self, symbol: &Symbol) -> Result<TimeframeSnapshots, FeedError> {
        let snapshots = self.compute_live(symbol).await?;
        self.save_all(symbol, &snapshots).await?;
        Ok(snapshots)
    }

    async fn compute_live(&self, symbol: &Symbol) -> Result<TimeframeSnapshots, FeedError> {
        let (m1, m5, m15) = tokio::try_join!(
            self.compute_one(symbol, Timeframe::M1),
            self.compute_one(symbol, Timeframe::M5),
            self.compute_one(symbol, Timeframe::M15),
        )?;

        Ok(TimeframeSnapshots { m1, m5, m15 })
    }

    async fn compute_one(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
    ) -> Result<Option<FeatureSnapshot>, FeedError> {
        let operation = format!("{} {} candles", symbol, timeframe);
        let candles = self
            .retry
            .run(&operation, || {
                self.source.get_candles(symbol, timeframe, self.candle_limit)
            })
            .await
            .map_err(|source| FeedError::Exchange { timeframe, source })?;

        match compute_snapshot(&candles) {
            Ok(snapshot) => {
                tracing::debug!(
                    symbol = %symbol,
                    timeframe = %timeframe,
                    candles = candles.len(),
                    close = snapshot.last_close,
                    rsi = ?snapshot.rsi,
                    adx = ?snapshot.adx,
                    atr = ?snapshot.atr,
                    "Computed snapshot"
                );
                Ok(Some(snapshot))
            }
            Err(e) => {
                tracing::warn!(
                    symbol = %symbol,
                    timeframe = %timeframe,
                    error = %e,
                    "No snapshot for timeframe"
                );
                Ok(None)
            }
        }
    }

    async fn load_from_store(&self, symbol: &Symbol) -> Result<TimeframeSnapshots, FeedError> {
        let store = self.require_store()?;
        let mut snapshots = TimeframeSnapshots::default();

        for timeframe in Timeframe::ALL {
            match store.latest(symbol, timeframe).await {
                Ok(Some(snapshot)) => snapshots.insert(timeframe, snapshot),
                Ok(None) => {
                    tracing::warn!(symbol = %symbol, timeframe = %timeframe, "No stored snapshot")
                }
                Err(e) => return Err(FeedError::Store(e.to_string())),
            }
        }

        let now = chrono::Utc::now().timestamp_millis();
        for timeframe in discard_stale(&mut snapshots, now) {
            tracing::warn!(symbol = %symbol, timeframe = %timeframe, "Discarded stale stored snapshot");
        }

        Ok(snapshots)
    }

    async fn save_all(
        &self,
        symbol: &Symbol,
        snapshots: &TimeframeSnapshots,
    ) -> Result<(), FeedError> {
        let store = self.require_store()?;

        for timeframe in Timeframe::ALL {
            if let Some(snapshot) = snapshots.get(timeframe) {
                store
                    .save(symbol, timeframe, snapshot)
                    .await
                    .map_err(|e| FeedError::Store(e.to_string()))?;
            }
        }

        Ok(())
    }

    fn require_store(&self) -> Result<&Arc<dyn SnapshotStore>, FeedError> {
        self.store
            .as_ref()
            .ok_or_else(|| FeedError::Store("no snapshot store configured".to_string()))
    }
}

/// Drop stored snapshots that are too old to trade on, or that were not
/// written in the same pass as the rest of the set
///
/// The 1m and 15m snapshots must lie within one 15m bucket of each other;
/// otherwise the older one is dropped. Returns the dropped timeframes.
pub fn discard_stale(snapshots: &mut TimeframeSnapshots, now_ms: i64) -> Vec<Timeframe> {
    let mut dropped = Vec::new();

    for timeframe in Timeframe::ALL {
        let interval = timeframe.duration_ms();
        let stale = snapshots.get(timeframe).is_some_and(|snapshot| {
            let closed_at = snapshot.timestamp + interval;
            now_ms - closed_at > MAX_STORED_AGE_INTERVALS * interval
        });
        if stale {
            snapshots.remove(timeframe);
            dropped.push(timeframe);
        }
    }

    let m1 = snapshots.m1.as_ref().map(|s| s.timestamp);
    let m15 = snapshots.m15.as_ref().map(|s| s.timestamp);
    if let (Some(m1), Some(m15)) = (m1, m15) {
        if (m1 - m15).abs() > Timeframe::M15.duration_ms() {
            let older = if m1 < m15 { Timeframe::M1 } else { Timeframe::M15 };
            snapshots.remove(older);
            dropped.push(older);
        }
    }

    dropped
}
