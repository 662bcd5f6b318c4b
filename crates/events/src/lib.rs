//! Domain events and the live-update event channel.
//!
//! Producers (scan ingestion, AI prediction) push [`DomainEvent`]s after their
//! own persistence write succeeds; the single attached dashboard stream drains
//! them through a [`ChannelConsumer`].

pub mod channel;
pub mod event;

pub use channel::{
    ChannelBusy, ChannelConsumer, ChannelStats, DEFAULT_CAPACITY, EventChannel, PushOutcome,
};
pub use event::{DomainEvent, Prediction, PredictionBatchEvent, RobotScanEvent, ScanResult};
