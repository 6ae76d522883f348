//! Admin catalog management

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::info;
use wtr_common::db::products;
use wtr_common::models::{Product, ProductInput, ProductUpdate};
use wtr_common::time;

use crate::extract::JsonBody;
use crate::{ApiResult, AppState};

/// GET /api/admin/products
///
/// Every product in any status, with analytics counters.
pub async fn list_products(State(state): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(products::list(&state.db, false).await?))
}

/// POST /api/admin/products
///
/// Duplicate slugs are rejected with 409.
pub async fn create_product(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ProductInput>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let product = products::create(&state.db, &input, time::now()).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PATCH /api/admin/products/:id
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(changes): JsonBody<ProductUpdate>,
) -> ApiResult<Json<Product>> {
    Ok(Json(
        products::update(&state.db, &id, &changes, time::now()).await?,
    ))
}

#[derive(Debug, Serialize)]
pub struct RecomputeResponse {
    pub products_updated: u64,
}

/// POST /api/admin/products/recompute-analytics
///
/// Rebuilds views, add-to-cart, sales and revenue from the event log and
/// paid orders.
pub async fn recompute_analytics(
    State(state): State<AppState>,
) -> ApiResult<Json<RecomputeResponse>> {
    let products_updated = products::recompute_analytics(&state.db, time::now()).await?;
    info!(products_updated, "Recomputed product analytics");
    Ok(Json(RecomputeResponse { products_updated }))
}
