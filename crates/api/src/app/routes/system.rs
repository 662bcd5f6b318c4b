use std::sync::Arc;

use axum::{Json, Router, extract::Extension, http::StatusCode, routing::get};

use smartwh_events::ChannelStats;

use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/stats", get(stream_stats))
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /api/stream/stats
pub async fn stream_stats(Extension(services): Extension<Arc<AppServices>>) -> Json<ChannelStats> {
    Json(services.channel.stats())
}
