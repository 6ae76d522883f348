//! Versioned schema migrations
//!
//! Phase 3 of initialization, for changes the column sync cannot express.
//! Each migration is idempotent and recorded in `schema_version`.
//!
//! Never modify an existing migration; add a new one and bump
//! [`CURRENT_SCHEMA_VERSION`].

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Increment when adding a migration
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Latest applied version (0 for a fresh database)
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    Ok(())
}

/// Migration v1: normalise lead emails
///
/// Older intake forms stored email as typed. The UNIQUE index only
/// deduplicates on the stored text, so rows are lowercased and trimmed.
/// Rows whose normalised form would collide with an existing lead are left
/// alone and reported.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    let updated = sqlx::query(
        r#"
        UPDATE leads
        SET email = lower(trim(email))
        WHERE email != lower(trim(email))
          AND NOT EXISTS (
              SELECT 1 FROM leads AS other
              WHERE other.email = lower(trim(leads.email)) AND other.id != leads.id
          )
        "#,
    )
    .execute(pool)
    .await?
    .rows_affected();

    let collisions: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM leads WHERE email != lower(trim(email))")
            .fetch_one(pool)
            .await?;

    info!("  Normalised {} lead email(s)", updated);
    if collisions > 0 {
        warn!(
            "  {} lead(s) have emails that collide after normalisation; merge manually",
            collisions
        );
    }
    Ok(())
}

/// Migration v2: analytics reporting indexes
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_analytics_name_time ON analytics_events(event_name, created_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_analytics_product ON analytics_events(product_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_analytics_lead ON analytics_events(lead_id)")
        .execute(pool)
        .await?;

    info!("  Created analytics indexes");
    Ok(())
}
