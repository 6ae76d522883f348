//! Admin order management

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;
use wtr_common::db::orders;
use wtr_common::events::WtrEvent;
use wtr_common::models::{Order, OrderStatus};
use wtr_common::time;

use super::parse_filter;
use crate::extract::JsonBody;
use crate::pagination::{calculate_pagination, Page};
use crate::{ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub status: Option<String>,
}

/// GET /api/admin/orders?page=&status=
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<Json<Page<Order>>> {
    let status = parse_filter("status", query.status.as_deref())?;

    let total = orders::count(&state.db, status).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1));
    let rows = orders::list(&state.db, status, pagination.page_size, pagination.offset).await?;

    Ok(Json(Page::new(pagination, rows)))
}

/// GET /api/admin/orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    Ok(Json(orders::get(&state.db, &id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
    #[serde(default)]
    pub note: Option<String>,
}

/// PATCH /api/admin/orders/:id/status
///
/// Any status may follow any other; the change is appended to the timeline.
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(change): JsonBody<StatusChange>,
) -> ApiResult<Json<Order>> {
    let now = time::now();
    let (previous, order) =
        orders::update_status(&state.db, &id, change.status, change.note, now).await?;

    info!(order_id = %id, from = %previous, to = %order.status, "Order status changed");
    state.events.emit_lossy(WtrEvent::OrderStatusChanged {
        order_id: id,
        old_status: previous,
        new_status: order.status,
        timestamp: now,
    });

    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct NewNote {
    pub text: String,
    #[serde(default)]
    pub author: Option<String>,
}

/// POST /api/admin/orders/:id/notes
pub async fn add_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(note): JsonBody<NewNote>,
) -> ApiResult<Json<Order>> {
    let order = orders::add_note(&state.db, &id, &note.text, note.author, time::now()).await?;
    Ok(Json(order))
}
