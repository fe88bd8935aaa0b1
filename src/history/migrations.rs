//! Database migrations.

use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::error::{Error, Result};

const SCHEMA_VERSION: i64 = 2;

#[instrument(skip(pool))]
pub async fn run(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| Error::persistence_write(format!("migration failed: {e}")))?;

    let current_version: Option<i64> = sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
        .fetch_optional(pool)
        .await
        .map_err(|e| Error::persistence_read(format!("migration failed: {e}")))?;
    let current_version = current_version.unwrap_or(0);

    if current_version >= SCHEMA_VERSION {
        info!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    info!("Migrating database from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        migrate_to_v1(pool).await?;
    }

    if current_version < 2 {
        migrate_to_v2(pool).await?;
    }

    Ok(())
}

/// Long-format points table, one row per metric per sample
#[instrument(skip(pool))]
async fn migrate_to_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration to schema version 1");

    let mut tx = pool.begin().await.map_err(migration_error)?;
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS metric_points (
            timestamp INTEGER NOT NULL,
            metric TEXT NOT NULL,
            kind TEXT NOT NULL,
            numeric REAL,
            text TEXT,
            stale INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (timestamp, metric)
        ) WITHOUT ROWID
        "#,
    )
    .execute(&mut *tx)
    .await
    .map_err(migration_error)?;

    set_version(&mut tx, 1).await?;
    tx.commit().await.map_err(migration_error)?;
    Ok(())
}

/// Granularity column for compacted rows (0 = raw sample)
#[instrument(skip(pool))]
async fn migrate_to_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration to schema version 2");

    let mut tx = pool.begin().await.map_err(migration_error)?;
    sqlx::query("ALTER TABLE metric_points ADD COLUMN granularity INTEGER NOT NULL DEFAULT 0")
        .execute(&mut *tx)
        .await
        .map_err(migration_error)?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_metric_points_granularity ON metric_points (granularity, timestamp)")
        .execute(&mut *tx)
        .await
        .map_err(migration_error)?;

    set_version(&mut tx, 2).await?;
    tx.commit().await.map_err(migration_error)?;
    Ok(())
}

async fn set_version(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, version: i64) -> Result<()> {
    sqlx::query("DELETE FROM schema_version").execute(&mut **tx).await.map_err(migration_error)?;
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(&mut **tx)
        .await
        .map_err(migration_error)?;
    Ok(())
}

fn migration_error(e: sqlx::Error) -> Error {
    Error::persistence_write(format!("migration failed: {e}"))
}
