//! Database initialization
//!
//! Three phases, all idempotent:
//! 1. `CREATE TABLE IF NOT EXISTS` for every table
//! 2. Declarative column sync ([`crate::db::table_schemas`]), then indexes
//! 3. Versioned migrations ([`crate::db::migrations`])
//!
//! Default settings are ensured afterwards.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (creating if needed) the database at `db_path` and bring it up to date
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

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

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    // WAL lets the admin dashboard read while the email worker writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_tables(&pool).await?;
    crate::db::table_schemas::sync_all_table_schemas(&pool).await?;
    create_indexes(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;
    crate::db::settings::init_default_settings(&pool).await?;

    Ok(pool)
}

/// Phase 1: create every table that does not exist yet
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_leads_table(pool).await?;
    create_products_table(pool).await?;
    create_orders_table(pool).await?;
    create_analytics_events_table(pool).await?;
    create_email_jobs_table(pool).await?;
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

/// Runtime tunables (key/value)
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_leads_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS leads (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL UNIQUE,
            phone TEXT,
            county TEXT,
            conviction_type TEXT,
            conviction_year INTEGER,
            probation_status TEXT,
            urgency TEXT,
            reason TEXT,
            source TEXT,
            utm_source TEXT,
            utm_medium TEXT,
            utm_campaign TEXT,
            lead_score INTEGER NOT NULL DEFAULT 0,
            lead_segment TEXT NOT NULL DEFAULT 'cold',
            conversion_stage TEXT NOT NULL DEFAULT 'lead',
            has_paid INTEGER NOT NULL DEFAULT 0,
            amount_paid_cents INTEGER NOT NULL DEFAULT 0,
            unsubscribed INTEGER NOT NULL DEFAULT 0,
            abandoned_checkout INTEGER NOT NULL DEFAULT 0,
            visited_pricing INTEGER NOT NULL DEFAULT 0,
            emails_opened INTEGER NOT NULL DEFAULT 0,
            emails_clicked INTEGER NOT NULL DEFAULT 0,
            last_activity_at TEXT NOT NULL,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_products_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            description TEXT,
            kind TEXT NOT NULL,
            price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
            compare_at_cents INTEGER,
            status TEXT NOT NULL DEFAULT 'draft',
            stock INTEGER CHECK (stock IS NULL OR stock >= 0),
            views INTEGER NOT NULL DEFAULT 0,
            add_to_cart INTEGER NOT NULL DEFAULT 0,
            sales INTEGER NOT NULL DEFAULT 0,
            revenue_cents INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_orders_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            order_number TEXT NOT NULL UNIQUE,
            lead_id TEXT REFERENCES leads(id) ON DELETE SET NULL,
            customer_name TEXT NOT NULL,
            customer_email TEXT NOT NULL,
            customer_phone TEXT,
            items TEXT NOT NULL DEFAULT '[]',
            subtotal_cents INTEGER NOT NULL,
            discount_cents INTEGER NOT NULL DEFAULT 0,
            tax_cents INTEGER NOT NULL DEFAULT 0,
            total_cents INTEGER NOT NULL,
            promo_code TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            payment_status TEXT NOT NULL DEFAULT 'unpaid',
            timeline TEXT NOT NULL DEFAULT '[]',
            notes TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Append-only event log
async fn create_analytics_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analytics_events (
            id TEXT PRIMARY KEY,
            event_name TEXT NOT NULL,
            session_id TEXT,
            lead_id TEXT,
            product_id TEXT,
            order_id TEXT,
            page_url TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Durable delayed email sends
async fn create_email_jobs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS email_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lead_id TEXT NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
            sequence TEXT NOT NULL,
            step_index INTEGER NOT NULL,
            due_at_ms INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            created_at TEXT NOT NULL,
            sent_at TEXT,
            UNIQUE (lead_id, sequence, step_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Indexes reference synced columns, so they are created after phase 2
pub async fn create_indexes(pool: &SqlitePool) -> Result<()> {
    const INDEXES: &[&str] = &[
        "CREATE INDEX IF NOT EXISTS idx_leads_segment ON leads(lead_segment)",
        "CREATE INDEX IF NOT EXISTS idx_leads_stage ON leads(conversion_stage)",
        "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)",
        "CREATE INDEX IF NOT EXISTS idx_orders_lead ON orders(lead_id)",
        "CREATE INDEX IF NOT EXISTS idx_email_jobs_due ON email_jobs(status, due_at_ms)",
    ];

    for sql in INDEXES {
        sqlx::query(sql).execute(pool).await?;
    }
    Ok(())
}
