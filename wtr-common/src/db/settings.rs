//! Settings table access
//!
//! Key/value runtime tunables. Defaults are ensured on startup so operators
//! can edit them in place without a redeploy.

use crate::{Error, Result};
use sqlx::SqlitePool;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Sales tax in basis points applied at checkout
pub const TAX_RATE_BPS: &str = "tax_rate_bps";
pub const EMAIL_WORKER_POLL_SECS: &str = "email_worker_poll_secs";
pub const EMAIL_WORKER_BATCH_SIZE: &str = "email_worker_batch_size";
pub const EMAIL_MAX_ATTEMPTS: &str = "email_max_attempts";
pub const EMAIL_RETRY_BACKOFF_SECS: &str = "email_retry_backoff_secs";
pub const TRIGGER_SWEEP_INTERVAL_SECS: &str = "trigger_sweep_interval_secs";

/// Default values ensured on startup
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    (TAX_RATE_BPS, "0"),
    (EMAIL_WORKER_POLL_SECS, "15"),
    (EMAIL_WORKER_BATCH_SIZE, "25"),
    (EMAIL_MAX_ATTEMPTS, "3"),
    (EMAIL_RETRY_BACKOFF_SECS, "300"),
    (TRIGGER_SWEEP_INTERVAL_SECS, "3600"),
];

/// Insert defaults for missing keys and reset NULL values
pub async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    for (key, value) in DEFAULT_SETTINGS {
        ensure_setting(pool, key, value).await?;
    }
    Ok(())
}

/// Ensure `key` exists with a non-NULL value
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?;

    sqlx::query("UPDATE settings SET value = ? WHERE key = ? AND value IS NULL")
        .bind(default_value)
        .bind(key)
        .execute(pool)
        .await?;

    Ok(())
}

/// Read and parse a setting; `None` when the key is absent
pub async fn get_setting<T: FromStr>(pool: &SqlitePool, key: &str) -> Result<Option<T>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match value.flatten() {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("Setting '{}' has invalid value '{}'", key, raw))),
        None => Ok(None),
    }
}

/// Write a setting
pub async fn set_setting<T: Display>(pool: &SqlitePool, key: &str, value: T) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

async fn get_or<T: FromStr>(pool: &SqlitePool, key: &str, default: T) -> Result<T> {
    Ok(get_setting(pool, key).await?.unwrap_or(default))
}

/// Checkout tax rate in basis points (725 = 7.25%)
pub async fn tax_rate_bps(pool: &SqlitePool) -> Result<u32> {
    get_or(pool, TAX_RATE_BPS, 0).await
}

/// Email worker and automation sweep tunables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationSettings {
    pub poll_interval: Duration,
    pub batch_size: u32,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub sweep_interval: Duration,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            batch_size: 25,
            max_attempts: 3,
            retry_backoff: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

/// Load automation tunables, falling back to defaults per key
pub async fn automation_settings(pool: &SqlitePool) -> Result<AutomationSettings> {
    let defaults = AutomationSettings::default();
    Ok(AutomationSettings {
        poll_interval: Duration::from_secs(
            get_or(pool, EMAIL_WORKER_POLL_SECS, defaults.poll_interval.as_secs())
                .await?
                .max(1),
        ),
        batch_size: get_or(pool, EMAIL_WORKER_BATCH_SIZE, defaults.batch_size)
            .await?
            .max(1),
        max_attempts: get_or(pool, EMAIL_MAX_ATTEMPTS, defaults.max_attempts)
            .await?
            .max(1),
        retry_backoff: Duration::from_secs(
            get_or(pool, EMAIL_RETRY_BACKOFF_SECS, defaults.retry_backoff.as_secs()).await?,
        ),
        sweep_interval: Duration::from_secs(
            get_or(pool, TRIGGER_SWEEP_INTERVAL_SECS, defaults.sweep_interval.as_secs())
                .await?
                .max(60),
        ),
    })
}
