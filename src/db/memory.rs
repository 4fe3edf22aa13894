use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::SnapshotStore;
use crate::indicators::FeatureSnapshot;
use crate::models::{Symbol, Timeframe};
use crate::Result;

/// Process-local store for tests and embedding. Holds only the newest
/// snapshot per symbol and timeframe, so memory stays bounded.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<(Symbol, Timeframe), FeatureSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of (symbol, timeframe) keys holding a snapshot
    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn latest(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
    ) -> Result<Option<FeatureSnapshot>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(&(symbol.clone(), timeframe)).cloned())
    }

    async fn save(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        snapshot: &FeatureSnapshot,
    ) -> Result<()> {
        let mut snapshots = self.snapshots.write().await;
        let key = (symbol.clone(), timeframe);

        // Older writes never displace a newer bar; equal timestamps replace
        let newer = snapshots
            .get(&key)
            .map_or(true, |current| snapshot.timestamp >= current.timestamp);
        if newer {
            snapshots.insert(key, snapshot.clone());
        }
        Ok(())
    }
}
