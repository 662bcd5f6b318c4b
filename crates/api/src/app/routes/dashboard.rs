use std::sync::Arc;

use axum::{Json, Router, extract::Extension, http::StatusCode, response::IntoResponse, routing::get};
use chrono::Utc;

use smartwh_infra::DashboardError;

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/current", get(current))
}

/// GET /api/dashboard/current
///
/// `{"robots":[..],"recent_scans":[..],"statistics":{..}}`, served from the
/// cache while no scan has arrived since the last build.
pub async fn current(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.dashboard.current(Utc::now()).await {
        Ok(view) => Json(view).into_response(),
        Err(DashboardError::Repository(e)) => {
            tracing::error!(error = %e, "dashboard build failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "repository_error", e.to_string())
        }
    }
}
