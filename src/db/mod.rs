// Snapshot storage
pub mod memory;
pub mod postgres;

pub use memory::InMemorySnapshotStore;
pub use postgres::PostgresSnapshotStore;

use async_trait::async_trait;

use crate::indicators::FeatureSnapshot;
use crate::models::{Symbol, Timeframe};
use crate::Result;

/// Latest-snapshot storage keyed by symbol and timeframe
///
/// Saving a snapshot with a timestamp that already exists replaces it.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn latest(&self, symbol: &Symbol, timeframe: Timeframe)
        -> Result<Option<FeatureSnapshot>>;

    async fn save(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        snapshot: &FeatureSnapshot,
    ) -> Result<()>;
}

/// Open the Postgres store described by the database config
pub async fn connect_store(
    database: &crate::config::DatabaseConfig,
) -> Result<std::sync::Arc<dyn SnapshotStore>> {
    let url = database
        .url
        .as_deref()
        .ok_or("database.url is not configured")?;
    let store = PostgresSnapshotStore::new(url, database.max_connections).await?;
    Ok(std::sync::Arc::new(store))
}
