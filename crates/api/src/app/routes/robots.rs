use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use smartwh_events::RobotScanEvent;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RobotContext;

pub fn router() -> Router {
    Router::new().route("/data", post(receive_scan))
}

/// POST /api/robots/data
pub async fn receive_scan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(robot): Extension<RobotContext>,
    body: Result<Json<RobotScanEvent>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    if &body.robot_id != robot.robot_id() {
        return errors::json_error(
            StatusCode::FORBIDDEN,
            "robot_mismatch",
            format!(
                "credential is for {} but the report is from {}",
                robot.robot_id(),
                body.robot_id
            ),
        );
    }

    match services.ingestor.ingest(body).await {
        Ok(receipt) => (
            StatusCode::OK,
            Json(dto::ScanReceivedResponse {
                status: "received",
                message_id: receipt.message_id,
                queued: receipt.queued,
            }),
        )
            .into_response(),
        Err(e) => errors::ingest_error_to_response(e),
    }
}
