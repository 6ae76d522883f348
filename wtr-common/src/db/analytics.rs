//! Analytics event log

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{AnalyticsEvent, NewAnalyticsEvent};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct NameCount {
    pub event_name: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DayCount {
    /// `YYYY-MM-DD` (UTC)
    pub day: String,
    pub count: i64,
}

/// Event counts over a trailing window
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    pub since: DateTime<Utc>,
    pub total: i64,
    pub by_name: Vec<NameCount>,
    pub by_day: Vec<DayCount>,
}

/// Append an event
pub async fn insert(
    pool: &SqlitePool,
    event: &NewAnalyticsEvent,
    now: DateTime<Utc>,
) -> Result<AnalyticsEvent> {
    event.validate()?;

    let metadata = if event.metadata.is_null() {
        serde_json::json!({})
    } else {
        event.metadata.clone()
    };

    let stored = AnalyticsEvent {
        id: Uuid::new_v4().to_string(),
        event_name: event.event_name.clone(),
        session_id: event.session_id.clone(),
        lead_id: event.lead_id.clone(),
        product_id: event.product_id.clone(),
        order_id: event.order_id.clone(),
        page_url: event.page_url.clone(),
        metadata: Json(metadata),
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO analytics_events (
            id, event_name, session_id, lead_id, product_id, order_id, page_url, metadata, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&stored.id)
    .bind(&stored.event_name)
    .bind(&stored.session_id)
    .bind(&stored.lead_id)
    .bind(&stored.product_id)
    .bind(&stored.order_id)
    .bind(&stored.page_url)
    .bind(&stored.metadata)
    .bind(stored.created_at)
    .execute(pool)
    .await?;

    Ok(stored)
}

/// Events for one lead, newest first
pub async fn list_for_lead(pool: &SqlitePool, lead_id: &str, limit: i64) -> Result<Vec<AnalyticsEvent>> {
    Ok(sqlx::query_as::<_, AnalyticsEvent>(
        "SELECT * FROM analytics_events WHERE lead_id = ? ORDER BY created_at DESC LIMIT ?",
    )
    .bind(lead_id)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

/// Aggregate events created at or after `since`
pub async fn summary(pool: &SqlitePool, since: DateTime<Utc>) -> Result<AnalyticsSummary> {
    let by_name = sqlx::query_as::<_, NameCount>(
        r#"
        SELECT event_name, COUNT(*) AS count
        FROM analytics_events
        WHERE created_at >= ?
        GROUP BY event_name
        ORDER BY count DESC, event_name
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    let by_day = sqlx::query_as::<_, DayCount>(
        r#"
        SELECT substr(created_at, 1, 10) AS day, COUNT(*) AS count
        FROM analytics_events
        WHERE created_at >= ?
        GROUP BY day
        ORDER BY day
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    let total = by_name.iter().map(|row| row.count).sum();

    Ok(AnalyticsSummary {
        since,
        total,
        by_name,
        by_day,
    })
}
