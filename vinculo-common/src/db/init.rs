//! Database initialization
//!
//! Creates the database file on first run and applies the schema. Every statement is
//! `IF NOT EXISTS`, so initialization is safe to repeat on an existing database.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (creating if needed) the database at `db_path` and apply the schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets report reads proceed while webhook inserts are in flight
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// In-memory database with the full schema
///
/// Limited to one connection: every SQLite `:memory:` connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Apply all table definitions
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_access_records_table(pool).await?;
    create_result_snapshots_table(pool).await?;
    create_analytics_events_table(pool).await?;
    create_leads_table(pool).await?;
    Ok(())
}

async fn create_access_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS access_records (
            guid TEXT PRIMARY KEY,
            session_id TEXT NOT NULL UNIQUE,
            email TEXT,
            tier TEXT NOT NULL CHECK (tier IN ('quick', 'deep')),
            status TEXT NOT NULL CHECK (status IN ('pending', 'paid', 'completed')),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_access_records_email ON access_records(email)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_result_snapshots_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS result_snapshots (
            guid TEXT PRIMARY KEY,
            submission_id TEXT NOT NULL UNIQUE,
            tier TEXT NOT NULL CHECK (tier IN ('quick', 'deep')),
            score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
            band TEXT NOT NULL,
            dimensions TEXT,
            answers TEXT NOT NULL,
            identity TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_analytics_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analytics_events (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            session_id TEXT NOT NULL,
            product TEXT,
            country TEXT,
            props TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_analytics_events_name ON analytics_events(name)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_leads_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS leads (
            guid TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            source TEXT,
            tier TEXT,
            score INTEGER,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
