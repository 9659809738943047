//! Database initialization tests

use sqlx::SqlitePool;
use tempfile::TempDir;
use wellpath_common::db::{init_database, SCHEMA_VERSION};

async fn table_names(pool: &SqlitePool) -> Vec<String> {
    sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_init_creates_database_and_tables() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("data").join("wellpath.db");

    let pool = init_database(&db_path).await.unwrap();

    assert!(db_path.exists());
    let tables = table_names(&pool).await;
    for expected in [
        "candidate_contraindications",
        "candidate_items",
        "catalog_products",
        "product_prices",
        "protocol_items",
        "recommendations",
        "schema_version",
    ] {
        assert!(tables.contains(&expected.to_string()), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("wellpath.db");

    let pool = init_database(&db_path).await.unwrap();
    pool.close().await;
    let pool = init_database(&db_path).await.unwrap();

    let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_version")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(versions, vec![SCHEMA_VERSION]);
}

#[tokio::test]
async fn test_protocol_items_unique_per_user_and_key() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("wellpath.db")).await.unwrap();

    let insert = "INSERT INTO protocol_items (guid, user_id, dedup_key, name, category, item_type, frequency)
                  VALUES (?, ?, ?, 'Magnesium Glycinate', 'foundation', 'supplement', 'daily')";

    sqlx::query(insert)
        .bind("g1")
        .bind("user-a")
        .bind("magnesium glycinate|supplement")
        .execute(&pool)
        .await
        .unwrap();

    // Same key for another user is allowed
    sqlx::query(insert)
        .bind("g2")
        .bind("user-b")
        .bind("magnesium glycinate|supplement")
        .execute(&pool)
        .await
        .unwrap();

    let duplicate = sqlx::query(insert)
        .bind("g3")
        .bind("user-a")
        .bind("magnesium glycinate|supplement")
        .execute(&pool)
        .await;
    assert!(duplicate.is_err());
}
