//! Lead repository

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::models::analytics::names;
use crate::models::{ConversionStage, Lead, LeadInput, LeadSegment};
use crate::scoring::{self, LeadScoreInput};
use crate::{Error, Result};

/// Result of an intake submission
#[derive(Debug, Clone)]
pub struct CapturedLead {
    pub lead: Lead,
    /// False when an existing lead with the same email was refreshed
    pub is_new: bool,
}

/// Admin list filter
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub segment: Option<LeadSegment>,
    pub stage: Option<ConversionStage>,
    /// Substring match on email or name
    pub search: Option<String>,
}

/// Admin field edits; absent fields are unchanged
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct LeadUpdate {
    pub conversion_stage: Option<ConversionStage>,
    pub notes: Option<String>,
    pub unsubscribed: Option<bool>,
}

/// Lead before and after a mutation
#[derive(Debug, Clone)]
pub struct LeadChange {
    pub before: Lead,
    pub after: Lead,
}

/// Create a lead from the intake form, or refresh the lead with that email
///
/// Score and segment are computed from the stored (merged) fields.
pub async fn capture(
    pool: &SqlitePool,
    input: LeadInput,
    now: DateTime<Utc>,
    current_year: i32,
) -> Result<CapturedLead> {
    let input = input.normalized()?;

    if let Some(existing) = find_by_email(pool, &input.email).await? {
        let lead = refresh_from_intake(pool, &existing.id, &input, now, current_year).await?;
        return Ok(CapturedLead { lead, is_new: false });
    }

    match insert_from_intake(pool, &input, now, current_year).await {
        Ok(lead) => Ok(CapturedLead { lead, is_new: true }),
        Err(e) if e.is_unique_violation() => {
            // Concurrent submission with the same email won the insert
            debug!("Lead insert raced on email {}, refreshing instead", input.email);
            let existing = find_by_email(pool, &input.email)
                .await?
                .ok_or_else(|| Error::Internal("Lead vanished after unique violation".into()))?;
            let lead = refresh_from_intake(pool, &existing.id, &input, now, current_year).await?;
            Ok(CapturedLead { lead, is_new: false })
        }
        Err(e) => Err(e),
    }
}

async fn insert_from_intake(
    pool: &SqlitePool,
    input: &LeadInput,
    now: DateTime<Utc>,
    current_year: i32,
) -> Result<Lead> {
    let id = Uuid::new_v4().to_string();
    let score = scoring::evaluate(&LeadScoreInput::from(input), current_year);

    sqlx::query(
        r#"
        INSERT INTO leads (
            id, first_name, last_name, email, phone, county,
            conviction_type, conviction_year, probation_status, urgency, reason,
            source, utm_source, utm_medium, utm_campaign,
            lead_score, lead_segment, conversion_stage,
            last_activity_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(input.first_name.as_deref().unwrap_or(""))
    .bind(input.last_name.as_deref().unwrap_or(""))
    .bind(&input.email)
    .bind(&input.phone)
    .bind(&input.county)
    .bind(input.conviction_type)
    .bind(input.conviction_year)
    .bind(input.probation_status)
    .bind(input.urgency)
    .bind(input.reason)
    .bind(&input.source)
    .bind(&input.utm_source)
    .bind(&input.utm_medium)
    .bind(&input.utm_campaign)
    .bind(i64::from(score.score))
    .bind(score.segment)
    .bind(ConversionStage::Lead)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get(pool, &id).await
}

async fn refresh_from_intake(
    pool: &SqlitePool,
    id: &str,
    input: &LeadInput,
    now: DateTime<Utc>,
    current_year: i32,
) -> Result<Lead> {
    sqlx::query(
        r#"
        UPDATE leads SET
            first_name = COALESCE(?, first_name),
            last_name = COALESCE(?, last_name),
            phone = COALESCE(?, phone),
            county = COALESCE(?, county),
            conviction_type = COALESCE(?, conviction_type),
            conviction_year = COALESCE(?, conviction_year),
            probation_status = COALESCE(?, probation_status),
            urgency = COALESCE(?, urgency),
            reason = COALESCE(?, reason),
            source = COALESCE(source, ?),
            utm_source = COALESCE(utm_source, ?),
            utm_medium = COALESCE(utm_medium, ?),
            utm_campaign = COALESCE(utm_campaign, ?),
            last_activity_at = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.phone)
    .bind(&input.county)
    .bind(input.conviction_type)
    .bind(input.conviction_year)
    .bind(input.probation_status)
    .bind(input.urgency)
    .bind(input.reason)
    .bind(&input.source)
    .bind(&input.utm_source)
    .bind(&input.utm_medium)
    .bind(&input.utm_campaign)
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    rescore(pool, id, current_year).await
}

/// Recompute and store score/segment from the stored fields
pub async fn rescore(pool: &SqlitePool, id: &str, current_year: i32) -> Result<Lead> {
    let mut lead = get(pool, id).await?;
    let score = scoring::evaluate(&LeadScoreInput::from(&lead), current_year);

    sqlx::query("UPDATE leads SET lead_score = ?, lead_segment = ? WHERE id = ?")
        .bind(i64::from(score.score))
        .bind(score.segment)
        .bind(id)
        .execute(pool)
        .await?;

    lead.lead_score = i64::from(score.score);
    lead.lead_segment = score.segment;
    Ok(lead)
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Lead> {
    sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Lead {}", id)))
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Lead>> {
    Ok(
        sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE email = ?")
            .bind(email.trim().to_ascii_lowercase())
            .fetch_optional(pool)
            .await?,
    )
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &LeadFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(segment) = filter.segment {
        qb.push(" AND lead_segment = ").push_bind(segment);
    }
    if let Some(stage) = filter.stage {
        qb.push(" AND conversion_stage = ").push_bind(stage);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        qb.push(" AND (email LIKE ")
            .push_bind(pattern.clone())
            .push(" OR first_name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR last_name LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub async fn count(pool: &SqlitePool, filter: &LeadFilter) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM leads");
    push_filters(&mut qb, filter);
    Ok(qb.build_query_scalar::<i64>().fetch_one(pool).await?)
}

/// Newest first
pub async fn list(
    pool: &SqlitePool,
    filter: &LeadFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Lead>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM leads");
    push_filters(&mut qb, filter);
    qb.push(" ORDER BY created_at DESC, id LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    Ok(qb.build_query_as::<Lead>().fetch_all(pool).await?)
}

/// Direct admin edit (no funnel validation)
pub async fn update(
    pool: &SqlitePool,
    id: &str,
    update: &LeadUpdate,
    now: DateTime<Utc>,
) -> Result<LeadChange> {
    let before = get(pool, id).await?;

    sqlx::query(
        r#"
        UPDATE leads SET
            conversion_stage = COALESCE(?, conversion_stage),
            notes = COALESCE(?, notes),
            unsubscribed = COALESCE(?, unsubscribed),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(update.conversion_stage)
    .bind(&update.notes)
    .bind(update.unsubscribed)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    let after = get(pool, id).await?;
    Ok(LeadChange { before, after })
}

/// Opt the lead out of marketing email; returns false if already opted out
pub async fn unsubscribe(pool: &SqlitePool, id: &str, now: DateTime<Utc>) -> Result<bool> {
    let changed = sqlx::query(
        "UPDATE leads SET unsubscribed = 1, updated_at = ? WHERE id = ? AND unsubscribed = 0",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();

    if changed == 0 {
        // Distinguish "already unsubscribed" from "no such lead"
        get(pool, id).await?;
        return Ok(false);
    }
    Ok(true)
}

/// Apply an analytics event to the lead's behavior counters
///
/// Counters are changed with single-statement increments so concurrent
/// events never lose updates. Returns false if the lead does not exist.
pub async fn record_activity(
    pool: &SqlitePool,
    id: &str,
    event_name: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let counter_update = match event_name {
        names::EMAIL_OPENED => "emails_opened = emails_opened + 1, ",
        names::EMAIL_CLICKED => "emails_clicked = emails_clicked + 1, ",
        names::PRICING_VIEWED => "visited_pricing = 1, ",
        names::CHECKOUT_ABANDONED => "abandoned_checkout = 1, ",
        _ => "",
    };

    let sql = format!(
        "UPDATE leads SET {}last_activity_at = ?, updated_at = ? WHERE id = ?",
        counter_update
    );

    let affected = sqlx::query(&sql)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();

    Ok(affected > 0)
}

/// Mark a lead paid, add `amount_cents` and advance its stage
///
/// The stage never moves backwards. Returns `(old_stage, new_stage)`.
pub async fn record_payment(
    pool: &SqlitePool,
    id: &str,
    amount_cents: i64,
    stage_reached: Option<ConversionStage>,
    now: DateTime<Utc>,
) -> Result<(ConversionStage, ConversionStage)> {
    let mut tx = pool.begin().await?;
    let stages = apply_payment(&mut tx, id, amount_cents, stage_reached, now).await?;
    tx.commit().await?;
    Ok(stages)
}

/// [`record_payment`] on a caller's connection, so order and lead commit together
pub(crate) async fn apply_payment(
    conn: &mut SqliteConnection,
    id: &str,
    amount_cents: i64,
    stage_reached: Option<ConversionStage>,
    now: DateTime<Utc>,
) -> Result<(ConversionStage, ConversionStage)> {
    let current: ConversionStage =
        sqlx::query_scalar("SELECT conversion_stage FROM leads WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Lead {}", id)))?;

    let new_stage = stage_reached.map_or(current, |stage| stage.max(current));

    sqlx::query(
        r#"
        UPDATE leads SET
            has_paid = 1,
            abandoned_checkout = 0,
            amount_paid_cents = amount_paid_cents + ?,
            conversion_stage = ?,
            last_activity_at = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(amount_cents)
    .bind(new_stage)
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok((current, new_stage))
}

/// Leads the automation sweep should evaluate
pub async fn automation_candidates(pool: &SqlitePool) -> Result<Vec<String>> {
    Ok(sqlx::query_scalar(
        "SELECT id FROM leads WHERE unsubscribed = 0 AND conversion_stage != 'full_service' ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?)
}

/// Recipients of a promotional broadcast
pub async fn campaign_audience(
    pool: &SqlitePool,
    segment: Option<LeadSegment>,
) -> Result<Vec<String>> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT id FROM leads WHERE unsubscribed = 0 AND conversion_stage != 'full_service'",
    );
    if let Some(segment) = segment {
        qb.push(" AND lead_segment = ").push_bind(segment);
    }
    qb.push(" ORDER BY created_at");
    Ok(qb.build_query_scalar::<String>().fetch_all(pool).await?)
}
