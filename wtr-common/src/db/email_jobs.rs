//! Durable email job queue
//!
//! One row per (lead, sequence, step). Workers claim due rows with a single
//! conditional UPDATE, so a row is only ever handed to one sender.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::models::{EmailJob, EmailJobStatus};
use crate::{Error, Result};

/// Step to enqueue for a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedStep {
    pub step_index: i64,
    pub due_at_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: EmailJobStatus,
    pub count: i64,
}

/// Insert one job per step; steps already present are left untouched
///
/// Returns how many new jobs were created.
pub async fn enqueue(
    pool: &SqlitePool,
    lead_id: &str,
    sequence: &str,
    steps: &[PlannedStep],
    now: DateTime<Utc>,
) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for step in steps {
        inserted += sqlx::query(
            r#"
            INSERT OR IGNORE INTO email_jobs (lead_id, sequence, step_index, due_at_ms, status, created_at)
            VALUES (?, ?, ?, ?, 'pending', ?)
            "#,
        )
        .bind(lead_id)
        .bind(sequence)
        .bind(step.step_index)
        .bind(step.due_at_ms)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

/// True if the lead was ever enrolled in `sequence`
pub async fn is_enrolled(pool: &SqlitePool, lead_id: &str, sequence: &str) -> Result<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM email_jobs WHERE lead_id = ? AND sequence = ? LIMIT 1")
            .bind(lead_id)
            .bind(sequence)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

/// Claim up to `limit` due jobs (`pending` → `sending`, attempts + 1)
pub async fn claim_due(pool: &SqlitePool, now_ms: i64, limit: u32) -> Result<Vec<EmailJob>> {
    let mut jobs = sqlx::query_as::<_, EmailJob>(
        r#"
        UPDATE email_jobs
        SET status = 'sending', attempts = attempts + 1
        WHERE status = 'pending'
          AND id IN (
              SELECT id FROM email_jobs
              WHERE status = 'pending' AND due_at_ms <= ?
              ORDER BY due_at_ms, id
              LIMIT ?
          )
        RETURNING *
        "#,
    )
    .bind(now_ms)
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    jobs.sort_by_key(|job| (job.due_at_ms, job.id));
    Ok(jobs)
}

pub async fn mark_sent(pool: &SqlitePool, id: i64, now: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        "UPDATE email_jobs SET status = 'sent', sent_at = ?, last_error = NULL WHERE id = ? AND status = 'sending'",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a send failure
///
/// With `retry_at_ms` the job goes back to `pending` at that time, otherwise
/// it is marked `failed` for good.
pub async fn mark_failed(
    pool: &SqlitePool,
    id: i64,
    error: &str,
    retry_at_ms: Option<i64>,
) -> Result<()> {
    match retry_at_ms {
        Some(due_at_ms) => {
            sqlx::query(
                "UPDATE email_jobs SET status = 'pending', due_at_ms = ?, last_error = ? WHERE id = ? AND status = 'sending'",
            )
            .bind(due_at_ms)
            .bind(error)
            .bind(id)
            .execute(pool)
            .await?;
        }
        None => {
            sqlx::query(
                "UPDATE email_jobs SET status = 'failed', last_error = ? WHERE id = ? AND status = 'sending'",
            )
            .bind(error)
            .bind(id)
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}

/// Skip a claimed job whose sequence no longer applies
pub async fn mark_cancelled(pool: &SqlitePool, id: i64, reason: &str) -> Result<()> {
    sqlx::query(
        "UPDATE email_jobs SET status = 'cancelled', last_error = ? WHERE id = ? AND status IN ('pending', 'sending')",
    )
    .bind(reason)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Cancel a lead's pending jobs, optionally only in the given sequences
pub async fn cancel_pending_for_lead(
    pool: &SqlitePool,
    lead_id: &str,
    sequences: Option<&[&str]>,
    reason: &str,
) -> Result<u64> {
    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE email_jobs SET status = 'cancelled', last_error = ");
    qb.push_bind(reason.to_string())
        .push(" WHERE status = 'pending' AND lead_id = ")
        .push_bind(lead_id.to_string());

    if let Some(sequences) = sequences {
        if sequences.is_empty() {
            return Ok(0);
        }
        qb.push(" AND sequence IN (");
        let mut separated = qb.separated(", ");
        for sequence in sequences {
            separated.push_bind(sequence.to_string());
        }
        separated.push_unseparated(")");
    }

    Ok(qb.build().execute(pool).await?.rows_affected())
}

/// Return jobs stranded in `sending` (worker died mid-send) to the queue
pub async fn reset_stale_sending(pool: &SqlitePool) -> Result<u64> {
    Ok(
        sqlx::query("UPDATE email_jobs SET status = 'pending' WHERE status = 'sending'")
            .execute(pool)
            .await?
            .rows_affected(),
    )
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<EmailJob> {
    sqlx::query_as::<_, EmailJob>("SELECT * FROM email_jobs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Email job {}", id)))
}

fn push_status_filter(qb: &mut QueryBuilder<'_, Sqlite>, status: Option<EmailJobStatus>) {
    if let Some(status) = status {
        qb.push(" WHERE status = ").push_bind(status);
    }
}

pub async fn count(pool: &SqlitePool, status: Option<EmailJobStatus>) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM email_jobs");
    push_status_filter(&mut qb, status);
    Ok(qb.build_query_scalar::<i64>().fetch_one(pool).await?)
}

/// Soonest due first
pub async fn list(
    pool: &SqlitePool,
    status: Option<EmailJobStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<EmailJob>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM email_jobs");
    push_status_filter(&mut qb, status);
    qb.push(" ORDER BY due_at_ms, id LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    Ok(qb.build_query_as::<EmailJob>().fetch_all(pool).await?)
}

pub async fn list_for_lead(pool: &SqlitePool, lead_id: &str) -> Result<Vec<EmailJob>> {
    Ok(sqlx::query_as::<_, EmailJob>(
        "SELECT * FROM email_jobs WHERE lead_id = ? ORDER BY due_at_ms, id",
    )
    .bind(lead_id)
    .fetch_all(pool)
    .await?)
}

/// Requeue a failed or cancelled job to send at `now_ms` with a fresh attempt budget
pub async fn retry(pool: &SqlitePool, id: i64, now_ms: i64) -> Result<EmailJob> {
    let affected = sqlx::query(
        r#"
        UPDATE email_jobs
        SET status = 'pending', attempts = 0, due_at_ms = ?, last_error = NULL
        WHERE id = ? AND status IN ('failed', 'cancelled')
        "#,
    )
    .bind(now_ms)
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        let job = get(pool, id).await?;
        return Err(Error::Conflict(format!(
            "Email job {} is {} and cannot be retried",
            id, job.status
        )));
    }
    get(pool, id).await
}

/// Job counts per status (statuses with no jobs are omitted)
pub async fn counts_by_status(pool: &SqlitePool) -> Result<Vec<StatusCount>> {
    let rows: Vec<(EmailJobStatus, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM email_jobs GROUP BY status ORDER BY status")
            .fetch_all(pool)
            .await?;

    Ok(rows
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect())
}
