//! Dashboards and the live event feed

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
    Json,
};
use chrono::Duration;
use futures::stream::Stream;
use serde::Deserialize;
use wtr_common::db::analytics::{self, AnalyticsSummary};
use wtr_common::db::stats::{load_stats, StoreStats};
use wtr_common::time;

use crate::{ApiResult, AppState};

const DEFAULT_SUMMARY_DAYS: i64 = 30;
const MAX_SUMMARY_DAYS: i64 = 365;

/// GET /api/admin/stats
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<StoreStats>> {
    Ok(Json(load_stats(&state.db, time::now()).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub days: Option<i64>,
}

/// GET /api/admin/analytics/summary?days=N
///
/// `days` defaults to 30 and is clamped to 1..=365.
pub async fn analytics_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<AnalyticsSummary>> {
    let days = query
        .days
        .unwrap_or(DEFAULT_SUMMARY_DAYS)
        .clamp(1, MAX_SUMMARY_DAYS);
    let since = time::now() - Duration::days(days);
    Ok(Json(analytics::summary(&state.db, since).await?))
}

/// GET /api/admin/events
///
/// Every domain event as it happens.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    wtr_common::sse::event_bus_sse_stream("wtr-web", &state.events)
}
