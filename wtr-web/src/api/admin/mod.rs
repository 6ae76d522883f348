//! Admin API (signed requests only)

pub mod campaigns;
pub mod email_jobs;
pub mod leads;
pub mod orders;
pub mod products;
pub mod reports;

use std::str::FromStr;

use axum::routing::{get, patch, post};
use axum::Router;

use crate::{ApiError, AppState};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/stats", get(reports::get_stats))
        .route("/api/admin/analytics/summary", get(reports::analytics_summary))
        .route("/api/admin/events", get(reports::event_stream))
        .route("/api/admin/leads", get(leads::list_leads))
        .route(
            "/api/admin/leads/:id",
            get(leads::get_lead).patch(leads::update_lead),
        )
        .route("/api/admin/orders", get(orders::list_orders))
        .route("/api/admin/orders/:id", get(orders::get_order))
        .route("/api/admin/orders/:id/status", patch(orders::update_status))
        .route("/api/admin/orders/:id/notes", post(orders::add_note))
        .route(
            "/api/admin/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/api/admin/products/recompute-analytics",
            post(products::recompute_analytics),
        )
        .route("/api/admin/products/:id", patch(products::update_product))
        .route("/api/admin/email-jobs", get(email_jobs::list_jobs))
        .route("/api/admin/email-jobs/:id/retry", post(email_jobs::retry_job))
        .route("/api/admin/promos/:campaign/send", post(campaigns::send_campaign))
}

/// Parse an optional enum query parameter; blank means "no filter"
pub(crate) fn parse_filter<T>(name: &str, value: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ApiError::BadRequest(format!("Invalid {}: {}", name, e))),
        None => Ok(None),
    }
}
