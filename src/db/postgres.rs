use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use super::SnapshotStore;
use crate::indicators::FeatureSnapshot;
use crate::models::{Symbol, Timeframe};
use crate::Result;

/// Postgres storage for indicator snapshots
///
/// One row per (symbol, timeframe, candle timestamp) in `market_indicators`,
/// with the full snapshot kept as JSONB.
pub struct PostgresSnapshotStore {
    pool: PgPool,
}

impl PostgresSnapshotStore {
    /// Connect and run pending migrations
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Connected to Postgres snapshot store");

        Ok(Self { pool })
    }

    /// Delete every snapshot for a symbol
    pub async fn clear_symbol(&self, symbol: &Symbol) -> Result<u64> {
        let result = sqlx::query("DELETE FROM market_indicators WHERE symbol = $1")
            .bind(symbol.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn candle_time(timestamp_ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .ok_or_else(|| format!("Invalid snapshot timestamp {}", timestamp_ms).into())
}

#[async_trait]
impl SnapshotStore for PostgresSnapshotStore {
    async fn latest(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
    ) -> Result<Option<FeatureSnapshot>> {
        let row = sqlx::query(
            r#"
            SELECT indicators
            FROM market_indicators
            WHERE symbol = $1 AND timeframe = $2
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(symbol.as_str())
        .bind(timeframe.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let indicators: serde_json::Value = row.get("indicators");
                Ok(Some(serde_json::from_value(indicators)?))
            }
            None => Ok(None),
        }
    }

    async fn save(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        snapshot: &FeatureSnapshot,
    ) -> Result<()> {
        let indicators = serde_json::to_value(snapshot)?;

        sqlx::query(
            r#"
            INSERT INTO market_indicators (symbol, timeframe, timestamp, indicators)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (symbol, timeframe, timestamp) DO UPDATE SET
                indicators = EXCLUDED.indicators,
                updated_at = NOW()
            "#,
        )
        .bind(symbol.as_str())
        .bind(timeframe.as_str())
        .bind(candle_time(snapshot.timestamp)?)
        .bind(indicators)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            symbol = %symbol,
            timeframe = %timeframe,
            timestamp = snapshot.timestamp,
            "Saved snapshot to Postgres"
        );

        Ok(())
    }
}
