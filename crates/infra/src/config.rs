//! Process configuration read from environment variables.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use smartwh_events::DEFAULT_CAPACITY;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Chat-completions forecaster settings; all three variables must be set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiApiConfig {
    pub url: String,
    pub key: String,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub event_channel_capacity: NonZeroUsize,
    pub stream_ping_interval: Duration,
    pub stream_write_timeout: Duration,
    pub ai_api: Option<AiApiConfig>,
    pub ai_cache_ttl: Duration,
    pub robot_status_ttl: Duration,
    pub dashboard_cache_ttl: Duration,
    /// Requests per client address and path per minute; 0 disables the limiter.
    pub rate_limit_per_minute: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let capacity: usize = parse_or(&get, "EVENT_CHANNEL_CAPACITY", DEFAULT_CAPACITY)?;
        let event_channel_capacity = NonZeroUsize::new(capacity).ok_or(ConfigError::Invalid {
            key: "EVENT_CHANNEL_CAPACITY",
            value: capacity.to_string(),
        })?;

        let ai_api = match (get("AI_API_URL"), get("AI_API_KEY")) {
            (Some(url), Some(key)) => Some(AiApiConfig {
                url,
                key,
                model: get("AI_MODEL"),
            }),
            _ => None,
        };

        Ok(Self {
            bind_addr: parse_or(&get, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            database_url: get("DATABASE_URL"),
            redis_url: get("REDIS_URL"),
            event_channel_capacity,
            stream_ping_interval: Duration::from_millis(parse_or(
                &get,
                "STREAM_PING_INTERVAL_MS",
                1_000u64,
            )?),
            stream_write_timeout: Duration::from_millis(parse_or(
                &get,
                "STREAM_WRITE_TIMEOUT_MS",
                2_000u64,
            )?),
            ai_api,
            ai_cache_ttl: Duration::from_secs(parse_or(&get, "AI_CACHE_TTL_SECS", 3_600u64)?),
            robot_status_ttl: Duration::from_secs(parse_or(&get, "ROBOT_STATUS_TTL_SECS", 30u64)?),
            dashboard_cache_ttl: Duration::from_secs(parse_or(
                &get,
                "DASHBOARD_CACHE_TTL_SECS",
                30u64,
            )?),
            rate_limit_per_minute: parse_or(&get, "RATE_LIMIT_PER_MINUTE", 100u64)?,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
