use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{Cache, CacheError, SUBSCRIPTION_BUFFER, Subscription};

const PUBLISH_BUFFER: usize = 64;

/// Published message as seen by local observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub channel: String,
    pub message: String,
}

/// Process-local cache. Expired entries are dropped lazily on read.
#[derive(Debug)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    published: broadcast::Sender<Published>,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        let (published, _) = broadcast::channel(PUBLISH_BUFFER);
        Self {
            entries: Mutex::new(HashMap::new()),
            published,
        }
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe messages passed to [`Cache::publish`].
    pub fn observe(&self) -> broadcast::Receiver<Published> {
        self.published.subscribe()
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                entries.remove(key);
                None
            }
            Some((value, _)) => Some(value.clone()),
            None => None,
        }
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.live_value(key))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.live_value(key).is_some())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        match entries.get_mut(key) {
            Some((value, expires_at)) if *expires_at > now => {
                let count = value
                    .parse::<u64>()
                    .map_err(|_| CacheError::Backend(format!("{key} does not hold a counter")))?
                    + 1;
                *value = count.to_string();
                Ok(count)
            }
            _ => {
                entries.insert(key.to_string(), ("1".to_string(), now + ttl));
                Ok(1)
            }
        }
    }

    async fn publish(&self, channel: &str, message: String) -> Result<usize, CacheError> {
        // No observers is not an error.
        Ok(self
            .published
            .send(Published {
                channel: channel.to_string(),
                message,
            })
            .unwrap_or(0))
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, CacheError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let mut published = self.published.subscribe();
        let channel = channel.to_string();

        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = tx.closed() => return,
                    next = published.recv() => next,
                };
                match next {
                    Ok(p) if p.channel == channel => {
                        if tx.send(p.message).await.is_err() {
                            return;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(channel = %channel, skipped, "subscriber lagged");
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        });

        Ok(rx)
    }
}
