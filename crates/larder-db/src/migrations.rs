//! # Schema Migrations
//!
//! The schema ships inside the binary (`migrations/sqlite/NNN_*.sql`) and
//! is brought up to date every time a `Database` opens.
//!
//! New schema goes in a new numbered file. Existing files are never edited,
//! and no migration may delete ledger rows.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every migration not yet recorded in `_sqlx_migrations`.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let before = applied_versions(pool).await?;
    MIGRATOR.run(pool).await?;
    let after = applied_versions(pool).await?;

    if after.len() > before.len() {
        info!(
            applied = after.len() - before.len(),
            schema_version = after.last().copied().unwrap_or_default(),
            "Schema migrated"
        );
    } else {
        debug!(schema_version = after.last().copied().unwrap_or_default(), "Schema up to date");
    }
    Ok(())
}

/// Versions recorded as applied, ascending. Empty on a fresh file.
pub async fn applied_versions(pool: &SqlitePool) -> DbResult<Vec<i64>> {
    let table: Option<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_optional(pool)
    .await?;
    if table.is_none() {
        return Ok(Vec::new());
    }

    let versions = sqlx::query_scalar(
        "SELECT version FROM _sqlx_migrations WHERE success = 1 ORDER BY version",
    )
    .fetch_all(pool)
    .await?;
    Ok(versions)
}

/// Versions embedded in this build that the database has not applied.
pub async fn pending_versions(pool: &SqlitePool) -> DbResult<Vec<i64>> {
    let applied = applied_versions(pool).await?;
    Ok(MIGRATOR
        .iter()
        .map(|m| m.version)
        .filter(|v| !applied.contains(v))
        .collect())
}
