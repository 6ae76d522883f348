//! Promotional broadcasts

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use wtr_common::db::leads;
use wtr_common::models::LeadSegment;
use wtr_common::time;

use crate::email::promo_sequences::find_campaign;
use crate::extract::JsonBody;
use crate::scheduler::enroll;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CampaignRequest {
    /// Restrict the audience to one segment
    pub segment: Option<LeadSegment>,
}

#[derive(Debug, Serialize)]
pub struct CampaignResponse {
    pub campaign: &'static str,
    pub audience: usize,
    /// Leads enrolled by this call (already-enrolled leads are skipped)
    pub enrolled: usize,
    pub jobs_created: u64,
}

/// POST /api/admin/promos/:campaign/send
///
/// Enrolls every subscribed lead below full service. Sending twice does not
/// duplicate emails.
pub async fn send_campaign(
    State(state): State<AppState>,
    Path(campaign): Path<String>,
    JsonBody(request): JsonBody<CampaignRequest>,
) -> ApiResult<Json<CampaignResponse>> {
    let sequence = find_campaign(&campaign)
        .ok_or_else(|| ApiError::NotFound(format!("Campaign {}", campaign)))?;

    let now = time::now();
    let audience = leads::campaign_audience(&state.db, request.segment).await?;

    let mut enrolled = 0;
    let mut jobs_created = 0;
    for lead_id in &audience {
        match enroll(&state.db, lead_id, sequence, now).await {
            Ok(0) => {}
            Ok(created) => {
                enrolled += 1;
                jobs_created += created;
            }
            Err(e) => warn!(lead_id = %lead_id, campaign = sequence.name, "Enrollment failed: {}", e),
        }
    }

    info!(
        campaign = sequence.name,
        audience = audience.len(),
        enrolled,
        jobs_created,
        "Campaign sent"
    );

    Ok(Json(CampaignResponse {
        campaign: sequence.name,
        audience: audience.len(),
        enrolled,
        jobs_created,
    }))
}
