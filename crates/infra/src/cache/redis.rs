//! Redis-backed cache (feature `redis`).

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tokio::sync::mpsc;

use super::{Cache, CacheError, SUBSCRIPTION_BUFFER, Subscription};

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        CacheError::Backend(value.to_string())
    }
}

/// Cache over one multiplexed async connection (cheap to clone).
/// Subscriptions open their own pub/sub connection.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(Self { client, conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        // Redis rejects a zero expiry.
        let secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, secs).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(key).await?)
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.incr(key, 1u64).await?;
        if count == 1 {
            let secs = i64::try_from(ttl.as_secs().max(1)).unwrap_or(i64::MAX);
            conn.expire::<_, ()>(key, secs).await?;
        }
        Ok(count)
    }

    async fn publish(&self, channel: &str, message: String) -> Result<usize, CacheError> {
        let mut conn = self.conn.clone();
        Ok(conn.publish(channel, message).await?)
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, CacheError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let channel = channel.to_string();
        tokio::spawn(async move {
            let mut messages = std::pin::pin!(pubsub.on_message());
            loop {
                let next = tokio::select! {
                    _ = tx.closed() => return,
                    next = messages.next() => next,
                };
                let Some(msg) = next else {
                    tracing::warn!(channel = %channel, "redis subscription ended");
                    return;
                };
                match msg.get_payload::<String>() {
                    Ok(payload) => {
                        if tx.send(payload).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => tracing::warn!(channel = %channel, error = %err, "unreadable pub/sub payload"),
                }
            }
        });

        Ok(rx)
    }
}
