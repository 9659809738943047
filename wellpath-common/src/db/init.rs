//! Database initialization
//!
//! Creates the SQLite database on first run and applies the schema
//! idempotently (`CREATE TABLE IF NOT EXISTS`), so opening an existing
//! database is always safe.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Open (creating if needed) the database and apply the schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    // WAL lets readers proceed while a protocol write is in flight
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Apply the schema to an already-open pool (used by in-memory test pools)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_candidate_items_table(pool).await?;
    create_candidate_contraindications_table(pool).await?;
    create_catalog_products_table(pool).await?;
    create_product_prices_table(pool).await?;
    create_protocol_items_table(pool).await?;
    create_recommendations_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_candidate_items_table(pool: &SqlitePool) -> Result<()> {
    // target_symptoms and time_of_day are JSON arrays
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS candidate_items (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            item_type TEXT NOT NULL DEFAULT 'other',
            description TEXT NOT NULL DEFAULT '',
            frequency TEXT,
            time_of_day TEXT NOT NULL DEFAULT '[]',
            target_symptoms TEXT NOT NULL DEFAULT '[]',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_candidate_contraindications_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS candidate_contraindications (
            candidate_id TEXT NOT NULL REFERENCES candidate_items(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            condition TEXT NOT NULL,
            severity TEXT NOT NULL,
            PRIMARY KEY (candidate_id, position)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_catalog_products_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            brand TEXT NOT NULL DEFAULT '',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_product_prices_table(pool: &SqlitePool) -> Result<()> {
    // Amounts are decimal strings; REAL would lose cents
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_prices (
            product_id TEXT NOT NULL REFERENCES catalog_products(id) ON DELETE CASCADE,
            currency TEXT NOT NULL,
            amount TEXT NOT NULL,
            PRIMARY KEY (product_id, currency)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_protocol_items_table(pool: &SqlitePool) -> Result<()> {
    // UNIQUE(user_id, dedup_key) is the authority for concurrent inserts
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS protocol_items (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            dedup_key TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL,
            item_type TEXT NOT NULL,
            frequency TEXT NOT NULL,
            time_of_day TEXT NOT NULL DEFAULT '[]',
            product_id TEXT,
            candidate_id TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (user_id, dedup_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_protocol_items_user ON protocol_items(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_recommendations_table(pool: &SqlitePool) -> Result<()> {
    // Older runs are kept with is_current = 0 rather than deleted
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recommendations (
            user_id TEXT NOT NULL,
            candidate_id TEXT NOT NULL,
            run_id TEXT NOT NULL,
            suitability INTEGER NOT NULL,
            applicability INTEGER NOT NULL,
            combined REAL NOT NULL,
            matched_symptoms TEXT NOT NULL DEFAULT '[]',
            flagged_contraindications TEXT NOT NULL DEFAULT '[]',
            priority_rank INTEGER NOT NULL,
            is_current INTEGER NOT NULL DEFAULT 1,
            generated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (run_id, candidate_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_recommendations_current ON recommendations(user_id, is_current)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
