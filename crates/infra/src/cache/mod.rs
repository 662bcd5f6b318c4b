//! Key/value cache with expiry, counters, and pub/sub.
//!
//! The cache is an accelerator only: callers treat every failure as a miss
//! (or a skipped write) and carry on.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use smartwh_core::RobotId;

pub use in_memory::InMemoryCache;
#[cfg(feature = "redis")]
pub use self::redis::RedisCache;

/// Cached dashboard aggregate; invalidated on every scan.
pub const DASHBOARD_KEY: &str = "dashboard:current";
/// Pub/sub channel announcing robot scans.
pub const ROBOT_UPDATES_CHANNEL: &str = "robot_updates";

const SUBSCRIPTION_BUFFER: usize = 64;

/// Messages published on one channel after [`Cache::subscribe`].
/// Dropping the receiver unsubscribes.
pub type Subscription = mpsc::Receiver<String>;

pub fn robot_key(id: &RobotId, field: &str) -> String {
    format!("robot:{id}:{field}")
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Add one to the counter at `key`, creating it with `ttl` when absent.
    /// The expiry is not extended by later increments.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, CacheError>;

    /// Returns the number of receivers that saw the message.
    async fn publish(&self, channel: &str, message: String) -> Result<usize, CacheError>;

    async fn subscribe(&self, channel: &str) -> Result<Subscription, CacheError>;
}

#[async_trait]
impl<C> Cache for Arc<C>
where
    C: Cache + ?Sized,
{
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        (**self).set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        (**self).delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        (**self).exists(key).await
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, CacheError> {
        (**self).incr(key, ttl).await
    }

    async fn publish(&self, channel: &str, message: String) -> Result<usize, CacheError> {
        (**self).publish(channel, message).await
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, CacheError> {
        (**self).subscribe(channel).await
    }
}
