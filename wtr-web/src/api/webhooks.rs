//! Payment provider webhook

use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use wtr_common::db::{leads, orders};
use wtr_common::events::WtrEvent;
use wtr_common::models::{OrderStatus, PaymentStatus};
use wtr_common::time;

use crate::automation;
use crate::extract::JsonBody;
use crate::{ApiError, ApiResult, AppState};

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Debug, Deserialize)]
pub struct PaymentNotification {
    pub order_id: String,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Serialize)]
pub struct PaymentWebhookResponse {
    pub order_id: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// False for a repeated notification
    pub changed: bool,
}

/// POST /api/webhooks/payment
///
/// A `paid` notification marks the linked lead paid and advances its stage
/// to the deepest product kind bought, in the same transaction as the order.
/// Sequences whose stop condition now holds are cancelled on every `paid`
/// delivery, so a redelivery finishes work an earlier failed attempt left.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(notification): JsonBody<PaymentNotification>,
) -> ApiResult<Json<PaymentWebhookResponse>> {
    check_secret(&state, &headers)?;

    let now = time::now();
    let outcome = orders::record_payment(
        &state.db,
        &notification.order_id,
        notification.payment_status,
        now,
    )
    .await?;
    let order = &outcome.order;

    if outcome.changed {
        state.events.emit_lossy(WtrEvent::PaymentRecorded {
            order_id: order.id.clone(),
            lead_id: order.lead_id.clone(),
            payment_status: order.payment_status,
            timestamp: now,
        });
    }

    if let (Some(lead_id), Some((old_stage, new_stage))) = (&order.lead_id, outcome.lead_stage) {
        if old_stage != new_stage {
            info!(lead_id = %lead_id, from = %old_stage, to = %new_stage, "Lead advanced");
            state.events.emit_lossy(WtrEvent::LeadStageChanged {
                lead_id: lead_id.clone(),
                old_stage,
                new_stage,
                timestamp: now,
            });
        }
    }

    if order.payment_status == PaymentStatus::Paid {
        if let Some(lead_id) = &order.lead_id {
            match leads::get(&state.db, lead_id).await {
                Ok(lead) => {
                    automation::apply_stop_conditions(&state, &lead).await?;
                }
                Err(wtr_common::Error::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(Json(PaymentWebhookResponse {
        order_id: order.id.clone(),
        status: order.status,
        payment_status: order.payment_status,
        changed: outcome.changed,
    }))
}

fn check_secret(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let Some(expected) = state.webhook_secret.as_deref() else {
        warn!("Payment webhook received but no webhook secret is configured");
        return Err(ApiError::Unauthorized("Webhook not configured".into()));
    };

    let provided = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", WEBHOOK_SECRET_HEADER)))?;

    if provided.trim() != expected {
        warn!("Payment webhook rejected: bad secret");
        return Err(ApiError::Unauthorized("Invalid webhook secret".into()));
    }
    Ok(())
}
