//! Durable scheduled email sends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::text_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EmailJobStatus {
    Pending,
    /// Claimed by a worker; reset to pending on restart
    Sending,
    Sent,
    Failed,
    Cancelled,
}

text_enum!(EmailJobStatus {
    Pending => "pending",
    Sending => "sending",
    Sent => "sent",
    Failed => "failed",
    Cancelled => "cancelled",
});

/// One step of one sequence for one lead
///
/// `(lead_id, sequence, step_index)` is unique, so re-enrolling a lead
/// never duplicates a send.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EmailJob {
    pub id: i64,
    pub lead_id: String,
    pub sequence: String,
    pub step_index: i64,
    pub due_at_ms: i64,
    pub status: EmailJobStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}
