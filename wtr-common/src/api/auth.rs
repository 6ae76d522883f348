//! Admin request signing
//!
//! Admin requests carry two headers:
//! - `x-wtr-timestamp`: Unix epoch milliseconds
//! - `x-wtr-signature`: hex SHA-256 of `timestamp:METHOD:path:body:secret`
//!
//! The shared secret is an i64 stored in the settings table. A secret of 0
//! disables checking entirely (local development and tests).
//!
//! This module has no HTTP framework dependencies; the axum middleware lives
//! in the web crate.

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use thiserror::Error;

/// Header carrying the request timestamp
pub const TIMESTAMP_HEADER: &str = "x-wtr-timestamp";

/// Header carrying the request signature
pub const SIGNATURE_HEADER: &str = "x-wtr-signature";

/// Settings key holding the shared secret
pub const SHARED_SECRET_KEY: &str = "api_shared_secret";

/// Oldest accepted timestamp, relative to now
pub const MAX_PAST_MS: i64 = 30_000;

/// Newest accepted timestamp, relative to now (clock drift only)
pub const MAX_FUTURE_MS: i64 = 1_000;

#[derive(Debug, Clone, Error)]
pub enum ApiAuthError {
    #[error("Invalid timestamp: {reason}")]
    InvalidTimestamp {
        timestamp: i64,
        now: i64,
        reason: String,
    },

    #[error("Invalid signature")]
    InvalidSignature { provided: String, calculated: String },

    #[error("Missing {0} header")]
    MissingHeader(&'static str),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Load the shared secret, generating one on first use
pub async fn load_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    let stored: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(SHARED_SECRET_KEY)
            .fetch_optional(db)
            .await
            .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    match stored {
        Some(value) => value
            .trim()
            .parse::<i64>()
            .map_err(|e| ApiAuthError::DatabaseError(format!("Invalid i64: {}", e))),
        None => initialize_shared_secret(db).await,
    }
}

/// Generate and store a random non-zero secret
pub async fn initialize_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    let secret = {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        loop {
            let candidate = rng.gen::<i64>();
            if candidate != 0 {
                break candidate;
            }
        }
    };

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(SHARED_SECRET_KEY)
        .bind(secret.to_string())
        .execute(db)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(secret)
}

/// Check `timestamp` against the acceptance window around `now_ms`
///
/// # Examples
///
/// ```
/// use wtr_common::api::auth::validate_timestamp;
///
/// let now = 1_700_000_000_000;
/// assert!(validate_timestamp(now - 5_000, now).is_ok());
/// assert!(validate_timestamp(now - 60_000, now).is_err());
/// assert!(validate_timestamp(now + 5_000, now).is_err());
/// ```
pub fn validate_timestamp(timestamp: i64, now_ms: i64) -> Result<(), ApiAuthError> {
    let age = now_ms - timestamp;

    if age > MAX_PAST_MS {
        return Err(ApiAuthError::InvalidTimestamp {
            timestamp,
            now: now_ms,
            reason: format!("{}ms old (max {}ms)", age, MAX_PAST_MS),
        });
    }

    if -age > MAX_FUTURE_MS {
        return Err(ApiAuthError::InvalidTimestamp {
            timestamp,
            now: now_ms,
            reason: format!("{}ms in the future (max {}ms)", -age, MAX_FUTURE_MS),
        });
    }

    Ok(())
}

/// Hex SHA-256 over the canonical request string
pub fn calculate_signature(
    timestamp: i64,
    method: &str,
    path: &str,
    body: &[u8],
    secret: i64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b":");
    hasher.update(path.as_bytes());
    hasher.update(b":");
    hasher.update(body);
    hasher.update(b":");
    hasher.update(secret.to_string().as_bytes());

    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// Compare a provided signature with the expected one
pub fn validate_signature(
    provided: &str,
    timestamp: i64,
    method: &str,
    path: &str,
    body: &[u8],
    secret: i64,
) -> Result<(), ApiAuthError> {
    let calculated = calculate_signature(timestamp, method, path, body, secret);
    if constant_time_eq(provided.trim().to_ascii_lowercase().as_bytes(), calculated.as_bytes()) {
        Ok(())
    } else {
        Err(ApiAuthError::InvalidSignature {
            provided: provided.to_string(),
            calculated,
        })
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn test_timestamp_window_edges() {
        assert!(validate_timestamp(NOW, NOW).is_ok());
        assert!(validate_timestamp(NOW - MAX_PAST_MS, NOW).is_ok());
        assert!(validate_timestamp(NOW - MAX_PAST_MS - 1, NOW).is_err());
        assert!(validate_timestamp(NOW + MAX_FUTURE_MS, NOW).is_ok());
        assert!(validate_timestamp(NOW + MAX_FUTURE_MS + 1, NOW).is_err());
    }

    #[test]
    fn test_signature_is_hex_sha256() {
        let sig = calculate_signature(NOW, "get", "/api/admin/stats", b"", 42);
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(sig, calculate_signature(NOW, "GET", "/api/admin/stats", b"", 42));
    }

    #[test]
    fn test_signature_covers_every_component() {
        let base = calculate_signature(NOW, "PATCH", "/api/admin/leads/1", b"{}", 42);
        assert_ne!(base, calculate_signature(NOW + 1, "PATCH", "/api/admin/leads/1", b"{}", 42));
        assert_ne!(base, calculate_signature(NOW, "POST", "/api/admin/leads/1", b"{}", 42));
        assert_ne!(base, calculate_signature(NOW, "PATCH", "/api/admin/leads/2", b"{}", 42));
        assert_ne!(base, calculate_signature(NOW, "PATCH", "/api/admin/leads/1", b"[]", 42));
        assert_ne!(base, calculate_signature(NOW, "PATCH", "/api/admin/leads/1", b"{}", 43));
    }

    #[test]
    fn test_validate_signature() {
        let sig = calculate_signature(NOW, "GET", "/x", b"", 7);
        assert!(validate_signature(&sig, NOW, "GET", "/x", b"", 7).is_ok());
        assert!(validate_signature(&sig.to_uppercase(), NOW, "GET", "/x", b"", 7).is_ok());
        assert!(matches!(
            validate_signature("deadbeef", NOW, "GET", "/x", b"", 7),
            Err(ApiAuthError::InvalidSignature { .. })
        ));
    }

    #[tokio::test]
    async fn test_secret_generated_once_and_persisted() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query("CREATE TABLE settings (key TEXT PRIMARY KEY, value TEXT)")
            .execute(&pool)
            .await
            .unwrap();

        let first = load_shared_secret(&pool).await.unwrap();
        let second = load_shared_secret(&pool).await.unwrap();
        assert_ne!(first, 0);
        assert_eq!(first, second);
    }
}
