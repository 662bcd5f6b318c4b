use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use smartwh_core::RobotId;
use smartwh_infra::cache::Cache;
use smartwh_infra::repository::RobotRegistry;

use crate::app::errors::json_error;
use crate::app::services::AppServices;
use crate::context::RobotContext;

/// Robot credential check: `Authorization: Bearer <prefix>_<ROBOT_ID>`,
/// where the robot must be registered.
pub async fn robot_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let robot_id = extract_robot_id(req.headers())
        .map_err(|msg| json_error(StatusCode::UNAUTHORIZED, "unauthorized", msg))?;

    match services.store.robot_exists(&robot_id).await {
        Ok(true) => {}
        Ok(false) => {
            return Err(json_error(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                format!("robot with id={robot_id} does not exist"),
            ));
        }
        Err(err) => {
            tracing::error!(error = %err, "robot registry lookup failed");
            return Err(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "repository_error",
                "robot registry unavailable",
            ));
        }
    }

    req.extensions_mut().insert(RobotContext::new(robot_id));
    Ok(next.run(req).await)
}

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Fixed-window limit per client address and path, counted in the cache.
/// A cache failure lets the request through.
pub async fn rate_limit_middleware(
    State(services): State<Arc<AppServices>>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let limit = services.config.rate_limit_per_minute;
    if limit == 0 {
        return Ok(next.run(req).await);
    }

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = format!("rate:{}:{}", client_ip(req.headers(), peer), req.uri().path());

    match services.cache.incr(&key, RATE_WINDOW).await {
        Ok(count) if count > limit => {
            tracing::warn!(key = %key, count, "rate limit exceeded");
            return Err(json_error(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "too many requests; try again later",
            ));
        }
        Ok(_) => {}
        Err(err) => tracing::warn!(key = %key, error = %err, "rate limiter unavailable; allowing request"),
    }

    Ok(next.run(req).await)
}

/// First `X-Forwarded-For` hop, else the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

fn extract_robot_id(headers: &HeaderMap) -> Result<RobotId, &'static str> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or("empty auth header")?
        .to_str()
        .map_err(|_| "invalid auth header")?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or("expected a bearer credential")?
        .trim();

    let (_, id) = token.split_once('_').ok_or("malformed robot credential")?;
    RobotId::new(id).map_err(|_| "malformed robot credential")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(value).unwrap(),
        );
        h
    }

    #[test]
    fn extracts_robot_id_from_credential() {
        assert_eq!(
            extract_robot_id(&headers("Bearer robot_RB-001")).unwrap().as_str(),
            "RB-001"
        );
        assert_eq!(
            extract_robot_id(&headers("Bearer token_RB-002")).unwrap().as_str(),
            "RB-002"
        );
    }

    #[test]
    fn client_ip_prefers_forwarded_header() {
        let peer = Some(SocketAddr::from(([10, 0, 0, 7], 51000)));

        let mut h = HeaderMap::new();
        assert_eq!(client_ip(&h, peer), "10.0.0.7");
        assert_eq!(client_ip(&h, None), "unknown");

        h.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_ip(&h, peer), "203.0.113.9");
    }

    #[test]
    fn rejects_malformed_credentials() {
        assert!(extract_robot_id(&HeaderMap::new()).is_err());
        assert!(extract_robot_id(&headers("Basic robot_RB-001")).is_err());
        assert!(extract_robot_id(&headers("Bearer RB-001")).is_err());
        assert!(extract_robot_id(&headers("Bearer robot_")).is_err());
    }
}
