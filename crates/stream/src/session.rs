//! Per-connection stream session.
//!
//! ## State machine
//!
//! ```text
//! Active ──(loop fails / cancel / channel closed)──▶ Draining ──(both loops joined)──▶ Closed
//! ```
//!
//! Two loops share one transport:
//!
//! - **consumer**: waits on the event channel, classifies each event and
//!   writes the resulting alerts in order.
//! - **liveness**: sends a ping every `ping_interval`.
//! - **relay** (optional): forwards already-serialized notices, e.g. cache
//!   pub/sub messages, as text. A closed feed only stops the relay.
//!
//! Every write is bounded by `write_timeout`. The first loop to fail records
//! the [`EndReason`] and fires the shared `done` token; the other loop observes
//! it at its next suspension point. Both loops are joined before the transport
//! is returned, so nothing outlives [`StreamSession::run`].

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use smartwh_events::{ChannelConsumer, DomainEvent};
use smartwh_inventory::{Alert, InventoryLookup, classify_event};

use crate::transport::{LiveTransport, TransportError};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub ping_interval: Duration,
    pub write_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(1),
            write_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Draining,
    Closed,
}

/// What ended the session. Only the first cause is kept.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    ConsumerWriteFailed,
    RelayWriteFailed,
    LivenessFailed,
    Cancelled,
    ChannelClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub delivered_events: u64,
    pub sent_messages: u64,
    pub skipped_alerts: u64,
    pub relayed_messages: u64,
    pub end_reason: EndReason,
}

/// Result of a finished session; the transport goes back to its owner.
#[derive(Debug)]
pub struct SessionOutcome<T> {
    pub transport: T,
    pub report: SessionReport,
}

#[derive(Debug, Default)]
struct ConsumerCounters {
    delivered_events: u64,
    sent_messages: u64,
    skipped_alerts: u64,
}

pub struct StreamSession<L: ?Sized> {
    id: Uuid,
    lookup: Arc<L>,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    relay: Option<mpsc::Receiver<String>>,
}

impl<L> StreamSession<L>
where
    L: InventoryLookup + ?Sized,
{
    pub fn new(lookup: Arc<L>, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Active);
        Self {
            id: Uuid::now_v7(),
            lookup,
            config,
            state,
            relay: None,
        }
    }

    /// Also forward every message from `feed` to the transport.
    pub fn with_relay(mut self, feed: mpsc::Receiver<String>) -> Self {
        self.relay = Some(feed);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Drive the session until a write fails, the channel closes, or `cancel`
    /// fires. The consumer lease is released when this returns.
    pub async fn run<T>(
        mut self,
        consumer: ChannelConsumer,
        transport: T,
        cancel: CancellationToken,
    ) -> SessionOutcome<T>
    where
        T: LiveTransport,
    {
        tracing::info!(session_id = %self.id, "stream session started");

        let done = cancel.child_token();
        let end = OnceLock::new();
        let transport = Mutex::new(transport);

        let relay = self.relay.take();
        let (counters, (), relayed_messages) = tokio::join!(
            self.consume(consumer, &transport, &done, &end),
            self.keep_alive(&transport, &done, &end),
            async {
                match relay {
                    Some(feed) => self.relay(feed, &transport, &done, &end).await,
                    None => 0,
                }
            },
        );

        self.state.send_replace(SessionState::Closed);
        let report = SessionReport {
            session_id: self.id,
            delivered_events: counters.delivered_events,
            sent_messages: counters.sent_messages,
            skipped_alerts: counters.skipped_alerts,
            relayed_messages,
            end_reason: end.get().copied().unwrap_or(EndReason::Cancelled),
        };
        tracing::info!(
            session_id = %self.id,
            end_reason = ?report.end_reason,
            delivered_events = report.delivered_events,
            sent_messages = report.sent_messages,
            skipped_alerts = report.skipped_alerts,
            relayed_messages = report.relayed_messages,
            "stream session closed"
        );

        SessionOutcome {
            transport: transport.into_inner(),
            report,
        }
    }

    /// Record the first end reason and tell the other loop to stop.
    fn shut_down(&self, done: &CancellationToken, end: &OnceLock<EndReason>, reason: EndReason) {
        let _ = end.set(reason);
        self.state.send_if_modified(|state| {
            if *state == SessionState::Active {
                *state = SessionState::Draining;
                true
            } else {
                false
            }
        });
        done.cancel();
    }

    async fn consume<T>(
        &self,
        mut consumer: ChannelConsumer,
        transport: &Mutex<T>,
        done: &CancellationToken,
        end: &OnceLock<EndReason>,
    ) -> ConsumerCounters
    where
        T: LiveTransport,
    {
        let mut counters = ConsumerCounters::default();

        loop {
            let event = tokio::select! {
                biased;
                _ = done.cancelled() => {
                    self.shut_down(done, end, EndReason::Cancelled);
                    return counters;
                }
                event = consumer.recv() => event,
            };

            let Some(event) = event else {
                self.shut_down(done, end, EndReason::ChannelClosed);
                return counters;
            };
            counters.delivered_events += 1;

            // Lookups can stall; a dead peer must still release the lease.
            let (alerts, skipped) = tokio::select! {
                biased;
                _ = done.cancelled() => {
                    self.shut_down(done, end, EndReason::Cancelled);
                    return counters;
                }
                classified = self.alerts_for(&event) => classified,
            };
            counters.skipped_alerts += skipped;

            for alert in alerts {
                if done.is_cancelled() {
                    self.shut_down(done, end, EndReason::Cancelled);
                    return counters;
                }

                let text = match serde_json::to_string(&alert) {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::error!(session_id = %self.id, error = %err, "alert serialization failed");
                        continue;
                    }
                };

                let mut guard = transport.lock().await;
                let sent = self.bounded(guard.send_text(text)).await;
                drop(guard);

                if let Err(err) = sent {
                    tracing::warn!(
                        session_id = %self.id,
                        alert_kind = alert.kind(),
                        error = %err,
                        "consumer write failed; ending session"
                    );
                    self.shut_down(done, end, EndReason::ConsumerWriteFailed);
                    return counters;
                }
                counters.sent_messages += 1;
            }
        }
    }

    /// Alerts for one event plus the number of alerts skipped on lookup errors.
    async fn alerts_for(&self, event: &DomainEvent) -> (Vec<Alert>, u64) {
        match classify_event(&*self.lookup, event).await {
            Ok(classification) => {
                for err in &classification.skipped {
                    tracing::warn!(
                        session_id = %self.id,
                        event_kind = event.kind(),
                        error = %err,
                        "skipping alert"
                    );
                }
                let skipped = classification.skipped.len() as u64;
                (classification.alerts, skipped)
            }
            Err(err) => {
                tracing::error!(
                    session_id = %self.id,
                    event_kind = event.kind(),
                    error = %err,
                    "event could not be classified; dropping it"
                );
                (Vec::new(), 0)
            }
        }
    }

    async fn keep_alive<T>(
        &self,
        transport: &Mutex<T>,
        done: &CancellationToken,
        end: &OnceLock<EndReason>,
    ) where
        T: LiveTransport,
    {
        let period = self.config.ping_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = done.cancelled() => {
                    self.shut_down(done, end, EndReason::Cancelled);
                    return;
                }
                _ = ticker.tick() => {}
            }

            let mut guard = transport.lock().await;
            let pinged = self.bounded(guard.send_ping()).await;
            drop(guard);

            if let Err(err) = pinged {
                tracing::warn!(session_id = %self.id, error = %err, "ping failed; ending session");
                self.shut_down(done, end, EndReason::LivenessFailed);
                return;
            }
        }
    }

    async fn relay<T>(
        &self,
        mut feed: mpsc::Receiver<String>,
        transport: &Mutex<T>,
        done: &CancellationToken,
        end: &OnceLock<EndReason>,
    ) -> u64
    where
        T: LiveTransport,
    {
        let mut relayed = 0;

        loop {
            let text = tokio::select! {
                biased;
                _ = done.cancelled() => return relayed,
                text = feed.recv() => text,
            };
            let Some(text) = text else {
                tracing::debug!(session_id = %self.id, "relay feed closed");
                return relayed;
            };

            let mut guard = transport.lock().await;
            let sent = self.bounded(guard.send_text(text)).await;
            drop(guard);

            if let Err(err) = sent {
                tracing::warn!(session_id = %self.id, error = %err, "relay write failed; ending session");
                self.shut_down(done, end, EndReason::RelayWriteFailed);
                return relayed;
            }
            relayed += 1;
        }
    }

    async fn bounded<F>(&self, write: F) -> Result<(), TransportError>
    where
        F: std::future::Future<Output = Result<(), TransportError>>,
    {
        match tokio::time::timeout(self.config.write_timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::write(format!(
                "timed out after {:?}",
                self.config.write_timeout
            ))),
        }
    }
}
