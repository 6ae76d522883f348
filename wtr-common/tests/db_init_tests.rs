//! Database initialization against real files
//!
//! Covers first-run creation, reopening, and upgrading a database created by
//! an older release that lacks the behavior columns.

use sqlx::SqlitePool;
use tempfile::TempDir;
use wtr_common::db::init::init_database;
use wtr_common::db::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};
use wtr_common::db::schema_sync::SchemaSync;
use wtr_common::db::settings;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("wtr.db");

    let pool = init_database(&db_path).await.expect("init failed");
    assert!(db_path.exists(), "Database file was not created");

    let version = get_schema_version(&pool).await.unwrap();
    assert_eq!(version, CURRENT_SCHEMA_VERSION);

    let tax: Option<u32> = settings::get_setting(&pool, settings::TAX_RATE_BPS)
        .await
        .unwrap();
    assert_eq!(tax, Some(0));
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("wtr.db");

    {
        let pool = init_database(&db_path).await.unwrap();
        settings::set_setting(&pool, settings::TAX_RATE_BPS, 825)
            .await
            .unwrap();
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    assert_eq!(settings::tax_rate_bps(&pool).await.unwrap(), 825);
}

#[tokio::test]
async fn test_legacy_database_is_upgraded() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("wtr.db");

    {
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePool::connect(&url).await.unwrap();
        sqlx::query(
            "CREATE TABLE leads (id TEXT PRIMARY KEY, email TEXT NOT NULL UNIQUE, \
             last_activity_at TEXT NOT NULL, created_at TEXT NOT NULL, updated_at TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO leads (id, email, last_activity_at, created_at, updated_at) \
             VALUES ('l1', '  Mixed@Example.COM ', '2024-01-01T00:00:00+00:00', \
             '2024-01-01T00:00:00+00:00', '2024-01-01T00:00:00+00:00')",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();

    let columns = SchemaSync::existing_columns(&pool, "leads").await.unwrap();
    for expected in ["lead_score", "emails_opened", "abandoned_checkout", "notes"] {
        assert!(
            columns.iter().any(|c| c == expected),
            "missing column {}",
            expected
        );
    }

    let email: String = sqlx::query_scalar("SELECT email FROM leads WHERE id = 'l1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(email, "mixed@example.com");
}
