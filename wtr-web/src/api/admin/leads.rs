//! Admin lead management

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use wtr_common::db::leads::{self, LeadFilter, LeadUpdate};
use wtr_common::db::{analytics, email_jobs};
use wtr_common::events::WtrEvent;
use wtr_common::models::{AnalyticsEvent, EmailJob, Lead};
use wtr_common::time;

use super::parse_filter;
use crate::automation;
use crate::extract::JsonBody;
use crate::pagination::{calculate_pagination, Page};
use crate::{ApiResult, AppState};

/// Recent events shown on the lead detail view
const RECENT_EVENT_LIMIT: i64 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct LeadListQuery {
    pub page: Option<i64>,
    pub segment: Option<String>,
    pub stage: Option<String>,
    pub search: Option<String>,
}

/// GET /api/admin/leads?page=&segment=&stage=&search=
pub async fn list_leads(
    State(state): State<AppState>,
    Query(query): Query<LeadListQuery>,
) -> ApiResult<Json<Page<Lead>>> {
    let filter = LeadFilter {
        segment: parse_filter("segment", query.segment.as_deref())?,
        stage: parse_filter("stage", query.stage.as_deref())?,
        search: query.search,
    };

    let total = leads::count(&state.db, &filter).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1));
    let rows = leads::list(&state.db, &filter, pagination.page_size, pagination.offset).await?;

    Ok(Json(Page::new(pagination, rows)))
}

#[derive(Debug, Serialize)]
pub struct LeadDetail {
    pub lead: Lead,
    pub email_jobs: Vec<EmailJob>,
    pub recent_events: Vec<AnalyticsEvent>,
}

/// GET /api/admin/leads/:id
pub async fn get_lead(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<LeadDetail>> {
    let lead = leads::get(&state.db, &id).await?;
    let email_jobs = email_jobs::list_for_lead(&state.db, &id).await?;
    let recent_events = analytics::list_for_lead(&state.db, &id, RECENT_EVENT_LIMIT).await?;

    Ok(Json(LeadDetail {
        lead,
        email_jobs,
        recent_events,
    }))
}

/// PATCH /api/admin/leads/:id
///
/// Direct edit of stage, notes and unsubscribe flag. Pending sequence
/// emails whose stop condition now holds are cancelled.
pub async fn update_lead(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(update): JsonBody<LeadUpdate>,
) -> ApiResult<Json<Lead>> {
    let now = time::now();
    let change = leads::update(&state.db, &id, &update, now).await?;
    let (before, after) = (&change.before, &change.after);

    if before.conversion_stage != after.conversion_stage {
        info!(
            lead_id = %id,
            from = %before.conversion_stage,
            to = %after.conversion_stage,
            "Admin changed lead stage"
        );
        state.events.emit_lossy(WtrEvent::LeadStageChanged {
            lead_id: id.clone(),
            old_stage: before.conversion_stage,
            new_stage: after.conversion_stage,
            timestamp: now,
        });
    }

    if !before.unsubscribed && after.unsubscribed {
        state.events.emit_lossy(WtrEvent::LeadUnsubscribed {
            lead_id: id.clone(),
            timestamp: now,
        });
    }

    automation::apply_stop_conditions(&state, after).await?;

    Ok(Json(change.after))
}
