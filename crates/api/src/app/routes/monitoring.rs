use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use smartwh_core::RobotId;
use smartwh_infra::cache::{Cache, robot_key};
use smartwh_infra::repository::{RobotRecord, RobotRegistry};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/robots/status", get(all_robots_status))
        .route("/robots/:id", get(robot_status))
}

/// GET /api/monitoring/robots/status
///
/// Every registered robot with its cached live state. `avg_battery` covers
/// online robots only (0 when none are online).
pub async fn all_robots_status(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let records = match services.store.list_robots().await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "robot listing failed");
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "repository_error",
                e.to_string(),
            );
        }
    };

    let mut robots = Vec::with_capacity(records.len());
    for record in records {
        robots.push(live_status(&services, record).await);
    }

    let online: Vec<&dto::RobotStatusResponse> = robots.iter().filter(|r| r.online).collect();
    let avg_battery = match i32::try_from(online.len()) {
        Ok(n) if n > 0 => online.iter().map(|r| r.battery_level).sum::<i32>() / n,
        _ => 0,
    };

    Json(dto::RobotsStatusResponse {
        online_robots: online.len(),
        total_robots: robots.len(),
        avg_battery,
        robots,
    })
    .into_response()
}

/// GET /api/monitoring/robots/:id
///
/// Liveness comes from the cache: a robot is online while its `last_seen`
/// key has not expired.
pub async fn robot_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let robot_id = match RobotId::new(id) {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid robot id"),
    };

    let record = match services.store.find_robot(&robot_id).await {
        Ok(Some(r)) => r,
        Ok(None) => {
            return errors::json_error(
                StatusCode::NOT_FOUND,
                "not_found",
                format!("robot {robot_id} is not registered"),
            );
        }
        Err(e) => {
            tracing::error!(robot_id = %robot_id, error = %e, "robot lookup failed");
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "repository_error",
                e.to_string(),
            );
        }
    };

    Json(live_status(&services, record).await).into_response()
}

/// Liveness comes from the cache; the stored battery level is the fallback.
async fn live_status(services: &AppServices, record: RobotRecord) -> dto::RobotStatusResponse {
    let robot_id = record.id;
    let online = cached(services, &robot_key(&robot_id, "last_seen")).await.is_some();
    let battery_level = cached(services, &robot_key(&robot_id, "battery"))
        .await
        .and_then(|v| v.parse().ok())
        .unwrap_or(record.battery_level);
    let status = match cached(services, &robot_key(&robot_id, "status")).await {
        Some(s) if online => s,
        _ => "offline".to_string(),
    };

    dto::RobotStatusResponse {
        robot_id,
        online,
        battery_level,
        status,
    }
}

/// Cache read where failure counts as a miss.
async fn cached(services: &AppServices, key: &str) -> Option<String> {
    match services.cache.get(key).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(key, error = %e, "cache read failed");
            None
        }
    }
}
