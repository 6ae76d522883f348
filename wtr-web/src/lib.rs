//! wtr-web library - public intake, checkout and admin API
//!
//! Also owns outbound email: templates, sequences, trigger rules, the
//! durable job worker and the automation sweep.

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use wtr_common::config::SiteConfig;
use wtr_common::events::EventBus;

pub mod api;
pub mod automation;
pub mod email;
pub mod error;
pub mod extract;
pub mod pagination;
pub mod scheduler;

pub use crate::error::{ApiError, ApiResult};

use crate::email::Mailer;

/// Events buffered per SSE subscriber
const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared across HTTP handlers and background tasks
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub events: EventBus,
    pub mailer: Arc<dyn Mailer>,
    /// Admin request signing secret (0 disables checking)
    pub shared_secret: i64,
    pub site: Arc<SiteConfig>,
    /// Expected `x-webhook-secret`; None rejects every webhook
    pub webhook_secret: Option<Arc<str>>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, shared_secret: i64, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            db,
            events: EventBus::new(EVENT_BUS_CAPACITY),
            mailer,
            shared_secret,
            site: Arc::new(SiteConfig::default()),
            webhook_secret: None,
            startup_time: Utc::now(),
        }
    }

    pub fn with_site(mut self, site: SiteConfig) -> Self {
        self.site = Arc::new(site);
        self
    }

    pub fn with_webhook_secret(mut self, secret: Option<String>) -> Self {
        self.webhook_secret = secret
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(Arc::from);
        self
    }
}

/// Build application router
///
/// `/health` and the storefront endpoints are public; everything under
/// `/api/admin` requires a signed request.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    let admin = api::admin::admin_routes().layer(middleware::from_fn_with_state(
        state.clone(),
        api::auth_middleware,
    ));

    Router::new()
        .merge(api::health_routes())
        .merge(api::public_routes())
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
