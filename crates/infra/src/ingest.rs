//! Robot scan ingestion: persist, refresh the cache, then notify the live stream.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use smartwh_core::{DomainError, Location, ProductId, RobotId};
use smartwh_events::{EventChannel, PushOutcome, RobotScanEvent};

use crate::cache::{Cache, DASHBOARD_KEY, ROBOT_UPDATES_CHANNEL, robot_key};
use crate::repository::{RepositoryError, WarehouseStore};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unknown robot {0}")]
    UnknownRobot(RobotId),

    #[error(transparent)]
    MalformedCheckpoint(#[from] DomainError),

    #[error("unknown product {0}")]
    UnknownProduct(ProductId),

    #[error("repository error: {0}")]
    Repository(String),
}

impl From<RepositoryError> for IngestError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::UnknownRobot(id) => Self::UnknownRobot(id),
            RepositoryError::UnknownProduct(id) => Self::UnknownProduct(id),
            RepositoryError::Database(msg) => Self::Repository(msg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestReceipt {
    pub message_id: Uuid,
    /// False when the event channel was full and the live notification was dropped.
    pub queued: bool,
}

/// Published on [`ROBOT_UPDATES_CHANNEL`]; relayed verbatim to the dashboard socket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum RobotNotice<'a> {
    RobotStatus {
        robot_id: &'a RobotId,
        battery_level: i32,
        status: &'static str,
        online: bool,
        timestamp: String,
    },
}

#[derive(Clone)]
pub struct ScanIngestor {
    store: Arc<dyn WarehouseStore>,
    cache: Arc<dyn Cache>,
    channel: EventChannel,
    robot_status_ttl: Duration,
}

impl ScanIngestor {
    pub fn new(
        store: Arc<dyn WarehouseStore>,
        cache: Arc<dyn Cache>,
        channel: EventChannel,
        robot_status_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            channel,
            robot_status_ttl,
        }
    }

    pub async fn ingest(&self, scan: RobotScanEvent) -> Result<IngestReceipt, IngestError> {
        if !self.store.robot_exists(&scan.robot_id).await? {
            return Err(IngestError::UnknownRobot(scan.robot_id));
        }

        let next = Location::parse_checkpoint(&scan.next_checkpoint)?;
        self.store.record_scan(&scan, &next).await?;

        self.refresh_cache(&scan).await;

        let message_id = Uuid::now_v7();
        let queued = self.channel.push(scan.clone()) == PushOutcome::Queued;

        tracing::info!(
            robot_id = %scan.robot_id,
            %message_id,
            scanned = scan.scan_results.len(),
            queued,
            "robot scan ingested"
        );

        Ok(IngestReceipt { message_id, queued })
    }

    async fn refresh_cache(&self, scan: &RobotScanEvent) {
        let id = &scan.robot_id;
        let ttl = self.robot_status_ttl;
        let timestamp = scan.timestamp.to_rfc3339();

        let writes = [
            (robot_key(id, "last_seen"), timestamp.clone()),
            (robot_key(id, "battery"), scan.battery_level.to_string()),
            (robot_key(id, "status"), "active".to_string()),
        ];
        for (key, value) in writes {
            if let Err(err) = self.cache.set(&key, value, ttl).await {
                tracing::warn!(robot_id = %id, key = %key, error = %err, "cache write failed");
            }
        }

        if let Err(err) = self.cache.delete(DASHBOARD_KEY).await {
            tracing::warn!(error = %err, "dashboard cache invalidation failed");
        }

        let notice = RobotNotice::RobotStatus {
            robot_id: id,
            battery_level: scan.battery_level,
            status: "active",
            online: true,
            timestamp,
        };
        match serde_json::to_string(&notice) {
            Ok(message) => {
                if let Err(err) = self.cache.publish(ROBOT_UPDATES_CHANNEL, message).await {
                    tracing::warn!(robot_id = %id, error = %err, "robot update publish failed");
                }
            }
            Err(err) => tracing::warn!(robot_id = %id, error = %err, "robot notice not serializable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;

    use chrono::{TimeZone, Utc};
    use smartwh_core::StockStatus;
    use smartwh_events::{DomainEvent, ScanResult};

    use crate::cache::InMemoryCache;
    use crate::repository::{InMemoryWarehouseStore, RobotRegistry};

    struct Harness {
        store: Arc<InMemoryWarehouseStore>,
        cache: Arc<InMemoryCache>,
        channel: EventChannel,
        ingestor: ScanIngestor,
    }

    fn harness(capacity: usize) -> Harness {
        let store = Arc::new(InMemoryWarehouseStore::with_demo_fixtures().unwrap());
        let cache = Arc::new(InMemoryCache::new());
        let channel = EventChannel::new(NonZeroUsize::new(capacity).unwrap());
        let ingestor = ScanIngestor::new(
            store.clone(),
            cache.clone(),
            channel.clone(),
            Duration::from_secs(300),
        );
        Harness {
            store,
            cache,
            channel,
            ingestor,
        }
    }

    fn scan(robot: &str, product: &str, next_checkpoint: &str) -> RobotScanEvent {
        RobotScanEvent {
            robot_id: RobotId::new(robot).unwrap(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 10, 9, 30, 0).unwrap(),
            location: Location::new("A", 3, 1),
            scan_results: vec![ScanResult {
                product_id: ProductId::new(product).unwrap(),
                product_name: "Router".to_string(),
                quantity: 8,
                status: StockStatus::Critical,
            }],
            battery_level: 57,
            next_checkpoint: next_checkpoint.to_string(),
        }
    }

    #[tokio::test]
    async fn ingest_persists_caches_and_queues() {
        let h = harness(4);
        let mut notices = h.cache.observe();

        let receipt = h.ingestor.ingest(scan("RB-001", "TEL-4567", "A-4-2")).await.unwrap();
        assert!(receipt.queued);

        let history = h.store.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].quantity, 8);
        assert_eq!(history[0].location, Location::new("A", 3, 1));

        let robot = h
            .store
            .find_robot(&RobotId::new("RB-001").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(robot.battery_level, 57);
        assert_eq!(robot.location, Some(Location::new("A", 4, 2)));

        assert_eq!(
            h.cache.get("robot:RB-001:battery").await.unwrap().as_deref(),
            Some("57")
        );
        assert_eq!(
            h.cache.get("robot:RB-001:status").await.unwrap().as_deref(),
            Some("active")
        );
        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.channel, ROBOT_UPDATES_CHANNEL);
        let notice: serde_json::Value = serde_json::from_str(&notice.message).unwrap();
        assert_eq!(notice["type"], "robot_status");
        assert_eq!(notice["data"]["robot_id"], "RB-001");
        assert_eq!(notice["data"]["battery_level"], 57);
        assert_eq!(notice["data"]["online"], true);

        let mut consumer = h.channel.try_attach().unwrap();
        assert!(matches!(consumer.try_recv(), Some(DomainEvent::RobotScan(_))));
    }

    #[tokio::test]
    async fn ingest_invalidates_the_cached_dashboard() {
        let h = harness(4);
        h.cache
            .set(DASHBOARD_KEY, "{}".to_string(), Duration::from_secs(30))
            .await
            .unwrap();

        h.ingestor.ingest(scan("RB-001", "TEL-4567", "A-4-2")).await.unwrap();
        assert!(!h.cache.exists(DASHBOARD_KEY).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_robot_is_rejected_before_persisting() {
        let h = harness(4);
        let err = h
            .ingestor
            .ingest(scan("RB-999", "TEL-4567", "A-4-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::UnknownRobot(_)));
        assert!(h.store.history().is_empty());
        assert_eq!(h.channel.stats().pushed, 0);
    }

    #[tokio::test]
    async fn malformed_checkpoint_is_a_hard_error() {
        let h = harness(4);
        for checkpoint in ["A-4", "A-x-2", "A-4-2-9"] {
            let err = h
                .ingestor
                .ingest(scan("RB-001", "TEL-4567", checkpoint))
                .await
                .unwrap_err();
            assert!(matches!(err, IngestError::MalformedCheckpoint(_)), "{checkpoint}");
        }
        assert!(h.store.history().is_empty());
        assert_eq!(h.channel.stats().pushed, 0);
    }

    #[tokio::test]
    async fn unknown_product_fails_the_whole_scan() {
        let h = harness(4);
        let err = h
            .ingestor
            .ingest(scan("RB-001", "TEL-0000", "A-4-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::UnknownProduct(_)));
        assert!(h.store.history().is_empty());
    }

    #[tokio::test]
    async fn full_channel_still_accepts_the_scan() {
        let h = harness(1);
        assert!(h.ingestor.ingest(scan("RB-001", "TEL-4567", "A-4-2")).await.unwrap().queued);

        let receipt = h.ingestor.ingest(scan("RB-002", "TEL-4567", "B-6-4")).await.unwrap();
        assert!(!receipt.queued);
        assert_eq!(h.store.history().len(), 2);
        assert_eq!(h.channel.stats().dropped, 1);
    }
}
