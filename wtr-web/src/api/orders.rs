//! Checkout

use axum::{extract::State, http::StatusCode, Json};
use tracing::info;
use wtr_common::db::{orders, settings};
use wtr_common::db::orders::CheckoutRequest;
use wtr_common::events::WtrEvent;
use wtr_common::models::Order;
use wtr_common::time;

use crate::email::{spawn_send, templates, EmailMessage};
use crate::extract::JsonBody;
use crate::{ApiResult, AppState};

/// POST /api/orders
///
/// Prices the cart, reserves stock and writes the order. The order stays
/// `pending`/`unpaid` until the payment webhook reports it paid.
pub async fn create_order(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let now = time::now();
    let tax_rate_bps = settings::tax_rate_bps(&state.db).await?;
    let order = orders::checkout(&state.db, &request, tax_rate_bps, now).await?;

    info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total_cents = order.total_cents,
        "Order created"
    );

    state.events.emit_lossy(WtrEvent::OrderCreated {
        order_id: order.id.clone(),
        order_number: order.order_number.clone(),
        lead_id: order.lead_id.clone(),
        total_cents: order.total_cents,
        timestamp: now,
    });

    spawn_send(
        state.mailer.clone(),
        EmailMessage::new(
            order.customer.email.clone(),
            templates::order_confirmation(&order, &state.site.base_url),
        ),
        "order_confirmation",
    );

    Ok((StatusCode::CREATED, Json(order)))
}
