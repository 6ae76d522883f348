//! Public lead intake and unsubscribe

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};
use wtr_common::db::leads;
use wtr_common::events::WtrEvent;
use wtr_common::models::{LeadInput, LeadSegment};
use wtr_common::time;

use crate::automation;
use crate::email::{spawn_send, templates, EmailMessage};
use crate::extract::JsonBody;
use crate::{ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct LeadCaptureResponse {
    pub id: String,
    pub lead_score: i64,
    pub lead_segment: LeadSegment,
    /// False when an existing lead with this email was updated
    pub is_new: bool,
    /// Sequence the lead was enrolled in by this submission
    pub enrolled_sequence: Option<&'static str>,
}

/// POST /api/leads
///
/// Captures (or refreshes) a lead, notifies operations about new leads and
/// evaluates the trigger rules. Email and trigger failures never fail the
/// submission.
pub async fn capture_lead(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<LeadInput>,
) -> ApiResult<(StatusCode, Json<LeadCaptureResponse>)> {
    let now = time::now();
    let captured = leads::capture(&state.db, input, now, time::current_year()).await?;
    let lead = &captured.lead;

    info!(
        lead_id = %lead.id,
        score = lead.lead_score,
        segment = %lead.lead_segment,
        is_new = captured.is_new,
        "Lead captured"
    );

    state.events.emit_lossy(WtrEvent::LeadCaptured {
        lead_id: lead.id.clone(),
        score: u32::try_from(lead.lead_score).unwrap_or(0),
        segment: lead.lead_segment,
        is_new: captured.is_new,
        timestamp: now,
    });

    if captured.is_new {
        if let Some(ops_email) = &state.site.ops_email {
            spawn_send(
                state.mailer.clone(),
                EmailMessage::new(
                    ops_email.clone(),
                    templates::new_lead_notification(lead, &state.site.base_url),
                ),
                "new_lead_notification",
            );
        }
    }

    let enrolled_sequence = match automation::evaluate_lead(&state, &lead.id, now).await {
        Ok(matched) => matched.map(|m| m.sequence),
        Err(e) => {
            warn!(lead_id = %lead.id, "Trigger evaluation failed: {}", e);
            None
        }
    };

    let status = if captured.is_new {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(LeadCaptureResponse {
            id: lead.id.clone(),
            lead_score: lead.lead_score,
            lead_segment: lead.lead_segment,
            is_new: captured.is_new,
            enrolled_sequence,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct UnsubscribeResponse {
    pub lead_id: String,
    pub unsubscribed: bool,
    /// Pending sequence emails cancelled by this request
    pub cancelled_jobs: u64,
}

/// GET /api/leads/:id/unsubscribe
///
/// Linked from every sequence email. Repeating it is harmless.
pub async fn unsubscribe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UnsubscribeResponse>> {
    let now = time::now();
    let changed = leads::unsubscribe(&state.db, &id, now).await?;

    let lead = leads::get(&state.db, &id).await?;
    let cancelled_jobs = automation::apply_stop_conditions(&state, &lead).await?;

    if changed {
        info!(lead_id = %id, cancelled_jobs, "Lead unsubscribed");
        state.events.emit_lossy(WtrEvent::LeadUnsubscribed {
            lead_id: id.clone(),
            timestamp: now,
        });
    }

    Ok(Json(UnsubscribeResponse {
        lead_id: id,
        unsubscribed: true,
        cancelled_jobs,
    }))
}
