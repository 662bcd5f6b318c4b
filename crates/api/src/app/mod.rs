//! Axum application wiring.
//!
//! - `services.rs`: storage, cache, forecaster and event channel wiring
//! - `routes/`: HTTP routes and handlers, one file per area
//! - `dto.rs`: response bodies that are not domain types
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use smartwh_infra::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build services from `config` and the full router (entrypoint used by `main.rs`).
pub async fn build_app(config: AppConfig) -> anyhow::Result<(Router, Arc<AppServices>)> {
    let services = Arc::new(services::build_services(config).await?);
    Ok((router(services.clone()), services))
}

/// Full router over already-built services. Serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()` so the rate limiter
/// sees client addresses.
pub fn router(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest(
            "/api",
            routes::router(services.clone()).layer(axum::middleware::from_fn_with_state(
                services.clone(),
                middleware::rate_limit_middleware,
            )),
        )
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
