use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use smartwh_ai::AiError;
use smartwh_infra::{IngestError, PredictionError};

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Unparseable or mistyped request bodies are a 400, whatever axum's default.
pub fn json_rejection(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_payload", rejection.body_text())
}

pub fn ingest_error_to_response(err: IngestError) -> axum::response::Response {
    match err {
        IngestError::UnknownRobot(id) => json_error(
            StatusCode::UNAUTHORIZED,
            "unknown_robot",
            format!("robot {id} is not registered"),
        ),
        IngestError::MalformedCheckpoint(e) => {
            json_error(StatusCode::BAD_REQUEST, "malformed_checkpoint", e.to_string())
        }
        IngestError::UnknownProduct(id) => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "unknown_product",
            format!("product {id} is not registered"),
        ),
        IngestError::Repository(msg) => {
            tracing::error!(error = %msg, "scan ingestion failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "repository_error", msg)
        }
    }
}

pub fn prediction_error_to_response(err: PredictionError) -> axum::response::Response {
    match err {
        PredictionError::InvalidRequest(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        PredictionError::UnknownProduct(id) => json_error(
            StatusCode::NOT_FOUND,
            "unknown_product",
            format!("product {id} is not registered"),
        ),
        PredictionError::Model(e) => {
            tracing::error!(error = %e, "forecast failed");
            let status = match e {
                AiError::Request(_) | AiError::Upstream { .. } | AiError::MalformedResponse(_) => {
                    StatusCode::BAD_GATEWAY
                }
                AiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            };
            json_error(status, "model_error", e.to_string())
        }
        PredictionError::Repository(msg) => {
            tracing::error!(error = %msg, "prediction persistence failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "repository_error", msg)
        }
    }
}
