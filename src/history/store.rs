use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow, SqliteSynchronous};
use sqlx::{Row, Sqlite, Transaction};
use tracing::{debug, info, instrument};

use crate::core::metrics::{Reading, Sample};
use crate::core::types::{ResolvedValue, ValueKind};
use crate::error::{Error, Result};
use crate::history::migrations;
use crate::query::aggregate::{aggregate, bucket_start};
use crate::traits::SampleStore;

const UNAVAILABLE: &str = "unavailable";

/// SQLite-backed durable history
///
/// WAL journaling lets queries read a consistent snapshot while the persistence task
/// writes; each batch is one transaction, so readers never see part of a sample.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and runs migrations
    #[instrument(skip(path), fields(db = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening history store");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::persistence_write(format!("failed to create directory {}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| Error::persistence_write(format!("failed to open {}: {e}", path.display())))?;

        migrations::run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn insert_samples(tx: &mut Transaction<'_, Sqlite>, samples: &[Sample], granularity: i64) -> Result<()> {
        for sample in samples {
            for (metric, reading) in &sample.values {
                let (kind, numeric, text) = encode(&reading.value);
                sqlx::query(
                    r#"
                    INSERT OR REPLACE INTO metric_points (timestamp, metric, kind, numeric, text, stale, granularity)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(sample.timestamp)
                .bind(metric)
                .bind(kind)
                .bind(numeric)
                .bind(text)
                .bind(reading.stale)
                .bind(granularity)
                .execute(&mut **tx)
                .await
                .map_err(|e| Error::persistence_write(e.to_string()))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SampleStore for SqliteStore {
    #[instrument(skip_all, fields(samples = batch.len()))]
    async fn append(&self, batch: &[Sample]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| Error::persistence_write(e.to_string()))?;
        Self::insert_samples(&mut tx, batch, 0).await?;
        tx.commit().await.map_err(|e| Error::persistence_write(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn range(&self, from: i64, to: i64) -> Result<Vec<Sample>> {
        let rows = sqlx::query(
            r#"
            SELECT timestamp, metric, kind, numeric, text, stale
            FROM metric_points
            WHERE timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp, metric
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::persistence_read(e.to_string()))?;

        group_rows(&rows)
    }

    #[instrument(skip(self))]
    async fn delete_before(&self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM metric_points WHERE timestamp < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::persistence_write(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// Only raw rows before the last bucket boundary at or below `before` are touched,
    /// so a bucket is never compacted while samples can still arrive for it, nor twice
    #[instrument(skip(self))]
    async fn compact(&self, before: i64, bucket_ms: i64) -> Result<u64> {
        let bucket_ms = bucket_ms.max(1);
        let boundary = bucket_start(before, bucket_ms);

        let mut tx = self.pool.begin().await.map_err(|e| Error::persistence_write(e.to_string()))?;
        let rows = sqlx::query(
            r#"
            SELECT timestamp, metric, kind, numeric, text, stale
            FROM metric_points
            WHERE granularity = 0 AND timestamp < ?
            ORDER BY timestamp, metric
            "#,
        )
        .bind(boundary)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| Error::persistence_read(e.to_string()))?;

        if rows.is_empty() {
            return Ok(0);
        }

        let samples = group_rows(&rows)?;
        let buckets: Vec<Sample> = aggregate(&samples, bucket_ms).into_iter().map(|b| b.into_sample()).collect();

        sqlx::query("DELETE FROM metric_points WHERE granularity = 0 AND timestamp < ?")
            .bind(boundary)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::persistence_write(e.to_string()))?;
        Self::insert_samples(&mut tx, &buckets, bucket_ms).await?;
        tx.commit().await.map_err(|e| Error::persistence_write(e.to_string()))?;

        debug!(raw_samples = samples.len(), buckets = buckets.len(), "compacted history");
        Ok(buckets.len() as u64)
    }
}

fn encode(value: &ResolvedValue) -> (&'static str, Option<f64>, Option<String>) {
    match value {
        ResolvedValue::Numeric(v) => (ValueKind::Numeric.as_str(), Some(*v), None),
        ResolvedValue::Text(s) => (ValueKind::Text.as_str(), None, Some(s.clone())),
        ResolvedValue::Structured(doc) => (ValueKind::Structured.as_str(), None, Some(doc.to_string())),
        ResolvedValue::Unavailable => (UNAVAILABLE, None, None),
    }
}

fn decode(kind: &str, numeric: Option<f64>, text: Option<String>) -> Result<ResolvedValue> {
    let corrupt = |what: &str| Error::persistence_read(format!("corrupt {kind} row: {what}"));
    match kind {
        "numeric" => numeric.map(ResolvedValue::Numeric).ok_or_else(|| corrupt("missing number")),
        "text" => text.map(ResolvedValue::Text).ok_or_else(|| corrupt("missing text")),
        "structured" => {
            let raw = text.ok_or_else(|| corrupt("missing document"))?;
            serde_json::from_str(&raw).map(ResolvedValue::Structured).map_err(|e| corrupt(&e.to_string()))
        }
        UNAVAILABLE => Ok(ResolvedValue::Unavailable),
        other => Err(Error::persistence_read(format!("unknown value kind {other:?}"))),
    }
}

/// Folds rows ordered by timestamp into samples
fn group_rows(rows: &[SqliteRow]) -> Result<Vec<Sample>> {
    let mut samples: Vec<Sample> = Vec::new();
    for row in rows {
        let timestamp: i64 = row.try_get("timestamp").map_err(read_error)?;
        let metric: String = row.try_get("metric").map_err(read_error)?;
        let kind: String = row.try_get("kind").map_err(read_error)?;
        let numeric: Option<f64> = row.try_get("numeric").map_err(read_error)?;
        let text: Option<String> = row.try_get("text").map_err(read_error)?;
        let stale: bool = row.try_get("stale").map_err(read_error)?;

        let reading = Reading { value: decode(&kind, numeric, text)?, stale };
        match samples.last_mut() {
            Some(sample) if sample.timestamp == timestamp => sample.insert(metric, reading),
            _ => samples.push(Sample { timestamp, values: BTreeMap::from([(metric, reading)]) }),
        }
    }
    Ok(samples)
}

fn read_error(e: sqlx::Error) -> Error {
    Error::persistence_read(e.to_string())
}
