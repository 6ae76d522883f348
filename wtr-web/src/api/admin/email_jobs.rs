//! Admin view of the email job queue

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;
use wtr_common::db::email_jobs;
use wtr_common::models::EmailJob;
use wtr_common::time;

use super::parse_filter;
use crate::pagination::{calculate_pagination, Page};
use crate::{ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    pub page: Option<i64>,
    pub status: Option<String>,
}

/// GET /api/admin/email-jobs?status=&page=
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> ApiResult<Json<Page<EmailJob>>> {
    let status = parse_filter("status", query.status.as_deref())?;

    let total = email_jobs::count(&state.db, status).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1));
    let rows = email_jobs::list(&state.db, status, pagination.page_size, pagination.offset).await?;

    Ok(Json(Page::new(pagination, rows)))
}

/// POST /api/admin/email-jobs/:id/retry
///
/// Only failed or cancelled jobs can be retried (409 otherwise). The job is
/// due immediately with a fresh attempt budget.
pub async fn retry_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<EmailJob>> {
    let job = email_jobs::retry(&state.db, id, time::now_ms()).await?;
    info!(job_id = id, sequence = %job.sequence, "Email job requeued");
    Ok(Json(job))
}
