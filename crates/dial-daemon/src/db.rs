//! Sqlite row store.
//!
//! Schema creation is idempotent (`CREATE TABLE IF NOT EXISTS`) and runs on
//! every open. Uniqueness rules live in the schema: votes, favorites and
//! reactions each carry a per-user unique index, which is also the only
//! backstop against racing writers.

use dial_core::Result;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

pub async fn open(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("initialized new database: {}", db_path.display());
    } else {
        info!("opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    // WAL keeps readers unblocked while the daemon writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    init_schema(&pool).await?;
    Ok(pool)
}

/// In-memory store for tests. A single connection keeps every query on the
/// same database.
pub async fn open_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    init_schema(&pool).await?;
    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_suggestions_table(pool).await?;
    create_suggestion_votes_table(pool).await?;
    create_favorites_table(pool).await?;
    create_reactions_table(pool).await?;
    create_comments_table(pool).await?;
    create_live_comments_table(pool).await?;
    Ok(())
}

async fn create_suggestions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS suggestions (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            stream_url TEXT NOT NULL,
            website TEXT NOT NULL DEFAULT '',
            logo_url TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL,
            contact_email TEXT NOT NULL,
            contact_phone TEXT NOT NULL,
            submitter_email TEXT NOT NULL,
            country TEXT NOT NULL,
            tags TEXT NOT NULL,
            language TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            sponsored INTEGER NOT NULL DEFAULT 0,
            votes INTEGER NOT NULL DEFAULT 0,
            slug TEXT NOT NULL,
            submitted_by TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_suggestions_status ON suggestions(status, created_at)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_suggestion_votes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS suggestion_votes (
            suggestion_id TEXT NOT NULL REFERENCES suggestions(id),
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (suggestion_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_favorites_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS favorites (
            user_id TEXT NOT NULL,
            station_id TEXT NOT NULL,
            added_at TEXT NOT NULL,
            UNIQUE (user_id, station_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_reactions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reactions (
            station_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (station_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_comments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            station_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_station ON comments(station_id, created_at)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_live_comments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS live_comments (
            id TEXT PRIMARY KEY,
            station_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            body TEXT NOT NULL,
            dedication TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_live_comments_station ON live_comments(station_id, created_at)",
    )
    .execute(pool)
    .await?;
    Ok(())
}
