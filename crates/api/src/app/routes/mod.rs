use std::sync::Arc;

use axum::Router;

use crate::app::services::AppServices;
use crate::middleware;

pub mod ai;
pub mod dashboard;
pub mod dashboard_stream;
pub mod monitoring;
pub mod robots;
pub mod system;

/// Router for everything under `/api`.
pub fn router(services: Arc<AppServices>) -> Router {
    let robots = robots::router().route_layer(axum::middleware::from_fn_with_state(
        services,
        middleware::robot_middleware,
    ));

    Router::new()
        .nest("/robots", robots)
        .nest("/ai", ai::router())
        .nest("/dashboard", dashboard::router())
        .nest("/monitoring", monitoring::router())
        .nest("/stream", system::router())
        .nest("/ws", dashboard_stream::router())
}
