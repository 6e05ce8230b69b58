//! Versioned, additive-only schema for the durable store.
//!
//! The schema version lives in `PRAGMA user_version`. Each step runs in its
//! own transaction together with the version bump, so a failed step leaves
//! the database at the previous version with its data intact.

use sqlx::sqlite::SqlitePool;
use tracing::info;

use crate::{Error, Result};

/// Schema version this build reads and writes.
pub const SCHEMA_VERSION: i64 = 3;

const MIGRATIONS: &[(i64, &[&str])] = &[
    (
        1,
        &[
            r"
            CREATE TABLE IF NOT EXISTS donation_intents (
                id TEXT PRIMARY KEY NOT NULL,
                source_url TEXT NOT NULL,
                amount REAL,
                recurring INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            ",
            r"
            CREATE INDEX IF NOT EXISTS idx_intents_created
            ON donation_intents(created_at)
            ",
        ],
    ),
    (
        2,
        &[
            r"
            CREATE TABLE IF NOT EXISTS offline_donations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id TEXT NOT NULL UNIQUE,
                amount REAL,
                donation_type TEXT NOT NULL DEFAULT 'one_time',
                donor_email TEXT,
                payload TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'pending_online',
                created_at TEXT NOT NULL
            )
            ",
            r"
            CREATE INDEX IF NOT EXISTS idx_offline_created
            ON offline_donations(created_at)
            ",
            r"
            CREATE INDEX IF NOT EXISTS idx_offline_status
            ON offline_donations(status)
            ",
        ],
    ),
    (
        3,
        &[
            r"ALTER TABLE offline_donations ADD COLUMN attempts INTEGER NOT NULL DEFAULT 0",
            r"ALTER TABLE offline_donations ADD COLUMN last_error TEXT",
            r"ALTER TABLE offline_donations ADD COLUMN updated_at TEXT",
        ],
    ),
];

/// Reads the schema version stored in the database.
///
/// # Errors
///
/// Returns an error if the pragma cannot be read.
pub async fn current_version(pool: &SqlitePool) -> Result<i64> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

/// Upgrades the database to [`SCHEMA_VERSION`].
///
/// # Errors
///
/// Returns [`Error::Migration`] if a step fails or the database was written
/// by a newer build.
pub async fn migrate(pool: &SqlitePool) -> Result<i64> {
    migrate_to(pool, SCHEMA_VERSION).await
}

/// Upgrades the database to `target`, applying every missing step in order.
pub(crate) async fn migrate_to(pool: &SqlitePool, target: i64) -> Result<i64> {
    let current = current_version(pool).await?;
    if current > SCHEMA_VERSION {
        return Err(Error::Migration {
            version: current,
            reason: format!("database version {current} is newer than supported {SCHEMA_VERSION}"),
        });
    }

    for (version, statements) in MIGRATIONS
        .iter()
        .filter(|(v, _)| *v > current && *v <= target)
    {
        apply(pool, *version, statements)
            .await
            .map_err(|e| Error::Migration {
                version: *version,
                reason: e.to_string(),
            })?;
        info!(version, "Applied schema migration");
    }

    current_version(pool).await
}

async fn apply(pool: &SqlitePool, version: i64, statements: &[&str]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in statements {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    let bump = format!("PRAGMA user_version = {version}");
    sqlx::query(&bump).execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(())
}
