//! Bounded, process-wide event channel (mechanics only).
//!
//! The channel decouples event production (HTTP request handlers) from event
//! consumption (the one live dashboard stream) without unbounded memory growth.
//!
//! ## Delivery Guarantees
//!
//! - **At-most-once, best-effort**: alerts are advisory. The authoritative
//!   record is already persisted before a producer pushes.
//! - **Never blocks producers**: when the queue is full the *newest* event
//!   (the one being pushed) is dropped and counted.
//! - **FIFO**: the consumer observes events in the order they were enqueued.
//! - **Single active consumer**: consumption is leased through
//!   [`EventChannel::try_attach`]; a second lease is refused until the first
//!   [`ChannelConsumer`] is dropped. Events left in the queue stay queued for
//!   the next consumer; nothing already consumed is replayed.
//!
//! ## Lifecycle
//!
//! One instance is created at startup and cloned (cheaply, it is an `Arc`)
//! into every producer and the stream factory. It is never closed while the
//! process runs.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::event::DomainEvent;

/// Queue capacity used by the live dashboard stream.
pub const DEFAULT_CAPACITY: usize = 100;

/// Informational result of [`EventChannel::push`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    Dropped,
}

/// Point-in-time counters for operators.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub capacity: usize,
    pub queued: usize,
    pub pushed: u64,
    pub dropped: u64,
    pub attached: bool,
}

/// Returned when a consumer is already attached.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("event channel already has an attached consumer")]
pub struct ChannelBusy;

#[derive(Debug)]
struct Inner {
    tx: mpsc::Sender<DomainEvent>,
    rx: Arc<Mutex<mpsc::Receiver<DomainEvent>>>,
    pushed: AtomicU64,
    dropped: AtomicU64,
}

/// Multiple-producer / single-active-consumer bounded queue of [`DomainEvent`]s.
#[derive(Debug, Clone)]
pub struct EventChannel {
    inner: Arc<Inner>,
}

impl EventChannel {
    pub fn new(capacity: NonZeroUsize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.get());
        Self {
            inner: Arc::new(Inner {
                tx,
                rx: Arc::new(Mutex::new(rx)),
                pushed: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.tx.max_capacity()
    }

    /// Non-blocking enqueue. A full queue drops `event`; nothing is returned
    /// to the caller as an error.
    pub fn push(&self, event: impl Into<DomainEvent>) -> PushOutcome {
        let event = event.into();
        self.inner.pushed.fetch_add(1, Ordering::Relaxed);

        match self.inner.tx.try_send(event) {
            Ok(()) => PushOutcome::Queued,
            Err(TrySendError::Full(event)) => {
                let dropped = self.inner.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    event_kind = event.kind(),
                    dropped,
                    "event channel full; dropping newest event"
                );
                PushOutcome::Dropped
            }
            Err(TrySendError::Closed(event)) => {
                // The channel owns its receiver, so this only happens during teardown.
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(event_kind = event.kind(), "event channel closed; dropping event");
                PushOutcome::Dropped
            }
        }
    }

    /// Lease the consuming end, failing fast if another consumer holds it.
    pub fn try_attach(&self) -> Result<ChannelConsumer, ChannelBusy> {
        let rx = self.inner.rx.clone().try_lock_owned().map_err(|_| ChannelBusy)?;
        Ok(ChannelConsumer { rx })
    }

    /// Lease the consuming end, waiting for the current consumer to detach.
    pub async fn attach(&self) -> ChannelConsumer {
        let rx = self.inner.rx.clone().lock_owned().await;
        ChannelConsumer { rx }
    }

    pub fn stats(&self) -> ChannelStats {
        let capacity = self.capacity();
        ChannelStats {
            capacity,
            queued: capacity - self.inner.tx.capacity(),
            pushed: self.inner.pushed.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
            attached: self.inner.rx.try_lock().is_err(),
        }
    }
}

const DEFAULT_NON_ZERO: NonZeroUsize = match NonZeroUsize::new(DEFAULT_CAPACITY) {
    Some(n) => n,
    None => panic!("DEFAULT_CAPACITY must be non-zero"),
};

impl Default for EventChannel {
    fn default() -> Self {
        Self::new(DEFAULT_NON_ZERO)
    }
}

/// Exclusive lease on the consuming end of an [`EventChannel`].
///
/// Dropping the consumer detaches it; queued events remain for the next one.
#[derive(Debug)]
pub struct ChannelConsumer {
    rx: OwnedMutexGuard<mpsc::Receiver<DomainEvent>>,
}

impl ChannelConsumer {
    /// Wait for the next event. Cancel-safe: no event is lost if the future
    /// is dropped before completing.
    pub async fn recv(&mut self) -> Option<DomainEvent> {
        self.rx.recv().await
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<DomainEvent> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use smartwh_core::{Location, RobotId};

    use crate::event::{PredictionBatchEvent, RobotScanEvent};

    fn channel(capacity: usize) -> EventChannel {
        EventChannel::new(NonZeroUsize::new(capacity).unwrap())
    }

    fn scan(battery_level: i32) -> DomainEvent {
        DomainEvent::RobotScan(RobotScanEvent {
            robot_id: RobotId::new("RB-001").unwrap(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 10, 9, 30, 0).unwrap(),
            location: Location::new("A", 3, 1),
            scan_results: vec![],
            battery_level,
            next_checkpoint: "A-4-2".to_string(),
        })
    }

    fn battery(event: &DomainEvent) -> i32 {
        match event {
            DomainEvent::RobotScan(s) => s.battery_level,
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn events_are_consumed_in_push_order() {
        let ch = channel(8);
        for level in [10, 20, 30] {
            assert_eq!(ch.push(scan(level)), PushOutcome::Queued);
        }

        let mut consumer = ch.try_attach().unwrap();
        let seen: Vec<i32> = std::iter::from_fn(|| consumer.try_recv())
            .map(|e| battery(&e))
            .collect();
        assert_eq!(seen, vec![10, 20, 30]);
    }

    #[test]
    fn full_queue_drops_newest_events() {
        let ch = channel(3);
        let outcomes: Vec<PushOutcome> = (1..=5).map(|i| ch.push(scan(i))).collect();

        assert_eq!(
            outcomes,
            vec![
                PushOutcome::Queued,
                PushOutcome::Queued,
                PushOutcome::Queued,
                PushOutcome::Dropped,
                PushOutcome::Dropped,
            ]
        );

        let stats = ch.stats();
        assert_eq!(stats.pushed, 5);
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.queued, 3);

        let mut consumer = ch.try_attach().unwrap();
        let kept: Vec<i32> = std::iter::from_fn(|| consumer.try_recv())
            .map(|e| battery(&e))
            .collect();
        assert_eq!(kept, vec![1, 2, 3]);
    }

    #[test]
    fn only_one_consumer_may_attach() {
        let ch = channel(4);
        let first = ch.try_attach().unwrap();
        assert!(ch.stats().attached);
        assert_eq!(ch.try_attach().unwrap_err(), ChannelBusy);

        drop(first);
        assert!(!ch.stats().attached);
        assert!(ch.try_attach().is_ok());
    }

    #[test]
    fn queued_events_survive_consumer_detach() {
        let ch = channel(4);
        ch.push(scan(1));
        ch.push(scan(2));

        {
            let mut first = ch.try_attach().unwrap();
            assert_eq!(battery(&first.try_recv().unwrap()), 1);
        }

        let mut second = ch.try_attach().unwrap();
        assert_eq!(battery(&second.try_recv().unwrap()), 2);
        assert!(second.try_recv().is_none());
    }

    #[tokio::test]
    async fn attach_waits_for_previous_consumer() {
        let ch = channel(4);
        let first = ch.try_attach().unwrap();

        let waiter = {
            let ch = ch.clone();
            tokio::spawn(async move {
                let mut consumer = ch.attach().await;
                consumer.recv().await
            })
        };

        ch.push(PredictionBatchEvent {
            predictions: vec![],
            overall_confidence: 0.5,
            generated_at: Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap(),
        });
        drop(first);

        let event = waiter.await.unwrap().unwrap();
        assert_eq!(event.kind(), "prediction_batch");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: without a consumer, exactly `pushed - capacity` events
            /// are dropped and the survivors are the oldest, in push order.
            #[test]
            fn drops_are_bounded_and_order_is_preserved(
                capacity in 1usize..32,
                pushes in 0i32..96,
            ) {
                let ch = channel(capacity);
                for i in 0..pushes {
                    ch.push(scan(i));
                }

                let expected_kept = (pushes as usize).min(capacity);
                let stats = ch.stats();
                prop_assert_eq!(stats.dropped as usize, pushes as usize - expected_kept);
                prop_assert_eq!(stats.queued, expected_kept);

                let mut consumer = ch.try_attach().unwrap();
                let seen: Vec<i32> = std::iter::from_fn(|| consumer.try_recv())
                    .map(|e| battery(&e))
                    .collect();
                let expected: Vec<i32> = (0..expected_kept as i32).collect();
                prop_assert_eq!(seen, expected);
            }
        }
    }
}
