//! Persistence ports and their adapters.
//!
//! The event channel only ever sees data that has already been written
//! through these ports.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use smartwh_ai::InventorySnapshot;
use smartwh_core::{Location, ProductId, RobotId};
use smartwh_events::{Prediction, RobotScanEvent};
use smartwh_inventory::{HistoryRecord, InventoryLookup, LookupError};

pub use in_memory::InMemoryWarehouseStore;
pub use postgres::PostgresWarehouseStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("unknown product {0}")]
    UnknownProduct(ProductId),

    #[error("unknown robot {0}")]
    UnknownRobot(RobotId),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(value: sqlx::Error) -> Self {
        Self::Database(value.to_string())
    }
}

impl From<RepositoryError> for LookupError {
    fn from(value: RepositoryError) -> Self {
        LookupError::backend(value.to_string())
    }
}

/// Last known state of a robot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RobotRecord {
    pub id: RobotId,
    pub status: String,
    pub battery_level: i32,
    pub location: Option<Location>,
    pub last_update: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait RobotRegistry: Send + Sync {
    async fn robot_exists(&self, id: &RobotId) -> Result<bool, RepositoryError>;

    async fn find_robot(&self, id: &RobotId) -> Result<Option<RobotRecord>, RepositoryError>;

    /// Every registered robot, ordered by id.
    async fn list_robots(&self) -> Result<Vec<RobotRecord>, RepositoryError>;
}

#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Persist one history row per scan result (at the scan's location) and
    /// move the robot to `next` with the reported battery level.
    ///
    /// All-or-nothing: an unknown product fails the whole scan.
    async fn record_scan(&self, scan: &RobotScanEvent, next: &Location)
    -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Thresholds and full history for `product_ids` (all products if empty).
    async fn inventory_snapshot(
        &self,
        product_ids: &[ProductId],
        as_of: DateTime<Utc>,
        period_days: u32,
    ) -> Result<InventorySnapshot, RepositoryError>;

    async fn save_predictions(
        &self,
        predictions: &[Prediction],
        generated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

/// Aggregate reads behind the dashboard.
#[async_trait]
pub trait DashboardStore: Send + Sync {
    /// Newest first.
    async fn recent_scans(&self, limit: usize) -> Result<Vec<HistoryRecord>, RepositoryError>;

    async fn count_scans_since(&self, since: DateTime<Utc>) -> Result<u64, RepositoryError>;

    /// Distinct products with at least one LOW_STOCK or CRITICAL scan.
    async fn count_flagged_products(&self) -> Result<u64, RepositoryError>;
}

/// Everything the service layer needs from storage.
pub trait WarehouseStore:
    RobotRegistry + ScanStore + PredictionStore + DashboardStore + InventoryLookup
{
}

impl<T> WarehouseStore for T where
    T: RobotRegistry + ScanStore + PredictionStore + DashboardStore + InventoryLookup
{
}

#[async_trait]
impl<S> RobotRegistry for Arc<S>
where
    S: RobotRegistry + ?Sized,
{
    async fn robot_exists(&self, id: &RobotId) -> Result<bool, RepositoryError> {
        (**self).robot_exists(id).await
    }

    async fn find_robot(&self, id: &RobotId) -> Result<Option<RobotRecord>, RepositoryError> {
        (**self).find_robot(id).await
    }

    async fn list_robots(&self) -> Result<Vec<RobotRecord>, RepositoryError> {
        (**self).list_robots().await
    }
}

#[async_trait]
impl<S> ScanStore for Arc<S>
where
    S: ScanStore + ?Sized,
{
    async fn record_scan(
        &self,
        scan: &RobotScanEvent,
        next: &Location,
    ) -> Result<(), RepositoryError> {
        (**self).record_scan(scan, next).await
    }
}

#[async_trait]
impl<S> PredictionStore for Arc<S>
where
    S: PredictionStore + ?Sized,
{
    async fn inventory_snapshot(
        &self,
        product_ids: &[ProductId],
        as_of: DateTime<Utc>,
        period_days: u32,
    ) -> Result<InventorySnapshot, RepositoryError> {
        (**self).inventory_snapshot(product_ids, as_of, period_days).await
    }

    async fn save_predictions(
        &self,
        predictions: &[Prediction],
        generated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        (**self).save_predictions(predictions, generated_at).await
    }
}

#[async_trait]
impl<S> DashboardStore for Arc<S>
where
    S: DashboardStore + ?Sized,
{
    async fn recent_scans(&self, limit: usize) -> Result<Vec<HistoryRecord>, RepositoryError> {
        (**self).recent_scans(limit).await
    }

    async fn count_scans_since(&self, since: DateTime<Utc>) -> Result<u64, RepositoryError> {
        (**self).count_scans_since(since).await
    }

    async fn count_flagged_products(&self) -> Result<u64, RepositoryError> {
        (**self).count_flagged_products().await
    }
}
