//! Analytics event ingestion

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::{debug, warn};
use wtr_common::db::{analytics, leads, products};
use wtr_common::events::WtrEvent;
use wtr_common::models::NewAnalyticsEvent;
use wtr_common::time;

use crate::automation;
use crate::extract::JsonBody;
use crate::{ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub id: String,
}

/// POST /api/analytics
///
/// Appends the event, then bumps product and lead counters. An event that
/// references a lead re-evaluates that lead's triggers. Unknown product or
/// lead ids are stored but have no side effects.
pub async fn ingest_event(
    State(state): State<AppState>,
    JsonBody(event): JsonBody<NewAnalyticsEvent>,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    let now = time::now();
    let stored = analytics::insert(&state.db, &event, now).await?;

    if let Some(product_id) = &stored.product_id {
        if !products::record_event(&state.db, product_id, &stored.event_name).await? {
            debug!(product_id = %product_id, event = %stored.event_name, "No product counter changed");
        }
    }

    if let Some(lead_id) = &stored.lead_id {
        if leads::record_activity(&state.db, lead_id, &stored.event_name, now).await? {
            state.events.emit_lossy(WtrEvent::LeadActivity {
                lead_id: lead_id.clone(),
                event_name: stored.event_name.clone(),
                timestamp: now,
            });

            if let Err(e) = automation::evaluate_lead(&state, lead_id, now).await {
                warn!(lead_id = %lead_id, "Trigger evaluation failed: {}", e);
            }
        } else {
            debug!(lead_id = %lead_id, "Analytics event references unknown lead");
        }
    }

    Ok((StatusCode::ACCEPTED, Json(IngestResponse { id: stored.id })))
}
