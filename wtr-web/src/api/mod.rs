//! HTTP API handlers for wtr-web

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod health;
pub mod leads;
pub mod orders;
pub mod products;
pub mod promo;
pub mod webhooks;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub use auth::auth_middleware;
pub use health::health_routes;

/// Storefront endpoints (no authentication)
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/leads", post(leads::capture_lead))
        .route("/api/leads/:id/unsubscribe", get(leads::unsubscribe))
        .route("/api/products", get(products::list_catalog))
        .route("/api/products/:slug", get(products::get_product))
        .route("/api/promo/validate", post(promo::validate_promo))
        .route("/api/orders", post(orders::create_order))
        .route("/api/analytics", post(analytics::ingest_event))
        .route("/api/webhooks/payment", post(webhooks::payment_webhook))
}
