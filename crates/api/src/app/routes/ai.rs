use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    response::IntoResponse,
    routing::post,
};

use smartwh_ai::PredictionRequest;

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/predict", post(predict))
}

/// POST /api/ai/predict
///
/// Returns `{"predictions":[..],"confidence":..,"generated_at":..}`. A fresh
/// batch is also pushed to the live dashboard; a cached one is not.
pub async fn predict(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<PredictionRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    match services.predictions.predict(body).await {
        Ok(batch) => Json(batch).into_response(),
        Err(e) => errors::prediction_error_to_response(e),
    }
}
