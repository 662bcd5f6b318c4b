//! Dashboard read model, cached under [`DASHBOARD_KEY`].
//!
//! Cache-aside: a hit is served as-is, a miss (or an unreadable entry) is
//! rebuilt from storage and written back with a short TTL. Scan ingestion
//! deletes the key, so the next read sees the new scan.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use smartwh_core::{ProductId, RobotId, StockStatus};
use smartwh_inventory::HistoryRecord;

use crate::cache::{Cache, DASHBOARD_KEY};
use crate::repository::{RepositoryError, RobotRecord, WarehouseStore};

pub const RECENT_SCANS_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardRobot {
    pub id: RobotId,
    pub status: String,
    pub battery_level: i32,
    pub last_update: Option<DateTime<Utc>>,
    pub current_zone: Option<String>,
    pub current_row: Option<i32>,
    pub current_shelf: Option<i32>,
}

impl From<RobotRecord> for DashboardRobot {
    fn from(r: RobotRecord) -> Self {
        let (current_zone, current_row, current_shelf) = match r.location {
            Some(l) => (Some(l.zone), Some(l.row), Some(l.shelf)),
            None => (None, None, None),
        };
        Self {
            id: r.id,
            status: r.status,
            battery_level: r.battery_level,
            last_update: r.last_update,
            current_zone,
            current_row,
            current_shelf,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentScan {
    pub robot_id: RobotId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    pub zone: String,
    pub row_number: i32,
    pub shelf_number: i32,
    pub status: StockStatus,
    pub scanned_at: DateTime<Utc>,
}

impl From<HistoryRecord> for RecentScan {
    fn from(h: HistoryRecord) -> Self {
        Self {
            robot_id: h.robot_id,
            product_id: h.product_id,
            product_name: h.product_name,
            quantity: h.quantity,
            zone: h.location.zone,
            row_number: h.location.row,
            shelf_number: h.location.shelf,
            status: h.status,
            scanned_at: h.scanned_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStatistics {
    pub active_robots: u64,
    pub total_robots: u64,
    pub items_checked_today: u64,
    pub critical_items: u64,
    /// Mean battery of active robots, truncated; 0 when none are active.
    pub avg_battery: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardView {
    pub robots: Vec<DashboardRobot>,
    pub recent_scans: Vec<RecentScan>,
    pub statistics: DashboardStatistics,
}

#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn WarehouseStore>,
    cache: Arc<dyn Cache>,
    cache_ttl: Duration,
}

impl DashboardService {
    pub fn new(store: Arc<dyn WarehouseStore>, cache: Arc<dyn Cache>, cache_ttl: Duration) -> Self {
        Self {
            store,
            cache,
            cache_ttl,
        }
    }

    /// Current aggregate; "today" is the UTC day containing `now`.
    pub async fn current(&self, now: DateTime<Utc>) -> Result<DashboardView, DashboardError> {
        match self.cache.get(DASHBOARD_KEY).await {
            Ok(Some(cached)) => match serde_json::from_str(&cached) {
                Ok(view) => return Ok(view),
                Err(err) => tracing::warn!(error = %err, "unreadable dashboard cache entry; rebuilding"),
            },
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %err, "dashboard cache read failed"),
        }

        let view = self.build(now).await?;

        match serde_json::to_string(&view) {
            Ok(json) => {
                if let Err(err) = self.cache.set(DASHBOARD_KEY, json, self.cache_ttl).await {
                    tracing::warn!(error = %err, "dashboard cache write failed");
                }
            }
            Err(err) => tracing::warn!(error = %err, "dashboard not serializable"),
        }

        Ok(view)
    }

    async fn build(&self, now: DateTime<Utc>) -> Result<DashboardView, DashboardError> {
        let start_of_day = now.date_naive().and_time(NaiveTime::MIN).and_utc();

        let robots = self.store.list_robots().await?;
        let recent_scans = self.store.recent_scans(RECENT_SCANS_LIMIT).await?;
        let items_checked_today = self.store.count_scans_since(start_of_day).await?;
        let critical_items = self.store.count_flagged_products().await?;

        let statistics = statistics(&robots, items_checked_today, critical_items);
        tracing::debug!(
            robots = robots.len(),
            recent_scans = recent_scans.len(),
            "dashboard rebuilt"
        );

        Ok(DashboardView {
            robots: robots.into_iter().map(DashboardRobot::from).collect(),
            recent_scans: recent_scans.into_iter().map(RecentScan::from).collect(),
            statistics,
        })
    }
}

fn statistics(robots: &[RobotRecord], items_checked_today: u64, critical_items: u64) -> DashboardStatistics {
    let active: Vec<&RobotRecord> = robots.iter().filter(|r| r.status == "active").collect();
    let avg_battery = match i32::try_from(active.len()) {
        Ok(n) if n > 0 => active.iter().map(|r| r.battery_level).sum::<i32>() / n,
        _ => 0,
    };

    DashboardStatistics {
        active_robots: active.len() as u64,
        total_robots: robots.len() as u64,
        items_checked_today,
        critical_items,
        avg_battery,
    }
}
