use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use smartwh_ai::{InventorySnapshot, ProductSnapshot, StockSample};
use smartwh_core::{Location, ProductId, RobotId, StockStatus};
use smartwh_events::{Prediction, RobotScanEvent};
use smartwh_inventory::{HistoryRecord, InventoryLookup, LookupError, ProductRecord};

use super::{
    DashboardStore, PredictionStore, RepositoryError, RobotRecord, RobotRegistry, ScanStore,
};

#[derive(Debug, Default)]
struct State {
    robots: HashMap<RobotId, RobotRecord>,
    products: BTreeMap<ProductId, ProductRecord>,
    history: Vec<HistoryRecord>,
    predictions: Vec<(Prediction, DateTime<Utc>)>,
}

/// Process-local warehouse store for dev and tests.
#[derive(Debug, Default)]
pub struct InMemoryWarehouseStore {
    inner: RwLock<State>,
}

const DEMO_PRODUCTS: [(&str, &str, &str); 5] = [
    ("TEL-4567", "Router RT-AC68U", "network"),
    ("TEL-8901", "Modem DSL-2640U", "network"),
    ("TEL-2345", "Switch SG-108", "network"),
    ("TEL-6789", "IP phone T46S", "voip"),
    ("TEL-3456", "UTP Cat6 cable", "cables"),
];

const DEMO_ZONES: [&str; 5] = ["A", "B", "C", "D", "E"];

fn fixture_error(e: smartwh_core::DomainError) -> RepositoryError {
    RepositoryError::Database(format!("bad fixture: {e}"))
}

pub(crate) fn demo_robots() -> Result<Vec<RobotRecord>, RepositoryError> {
    (1..=5)
        .zip(DEMO_ZONES)
        .map(|(n, zone)| {
            Ok(RobotRecord {
                id: RobotId::new(format!("RB-{n:03}")).map_err(fixture_error)?,
                status: "active".to_string(),
                battery_level: 100,
                location: Some(Location::new(zone, n * 3, n * 2)),
                last_update: None,
            })
        })
        .collect()
}

pub(crate) fn demo_products() -> Result<Vec<ProductRecord>, RepositoryError> {
    DEMO_PRODUCTS
        .iter()
        .map(|(code, name, category)| {
            Ok(ProductRecord {
                id: ProductId::new(*code).map_err(fixture_error)?,
                name: name.to_string(),
                category: category.to_string(),
                min_stock: 10,
                optimal_stock: 100,
            })
        })
        .collect()
}

impl InMemoryWarehouseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Robots `RB-001..RB-005` and the five demo products.
    pub fn with_demo_fixtures() -> Result<Self, RepositoryError> {
        let store = Self::new();
        for robot in demo_robots()? {
            store.insert_robot(robot);
        }
        for product in demo_products()? {
            store.insert_product(product);
        }
        Ok(store)
    }

    pub fn insert_robot(&self, robot: RobotRecord) {
        self.write().robots.insert(robot.id.clone(), robot);
    }

    pub fn insert_product(&self, product: ProductRecord) {
        self.write().products.insert(product.id.clone(), product);
    }

    pub fn history(&self) -> Vec<HistoryRecord> {
        self.read().history.clone()
    }

    pub fn predictions(&self) -> Vec<Prediction> {
        self.read().predictions.iter().map(|(p, _)| p.clone()).collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RobotRegistry for InMemoryWarehouseStore {
    async fn robot_exists(&self, id: &RobotId) -> Result<bool, RepositoryError> {
        Ok(self.read().robots.contains_key(id))
    }

    async fn find_robot(&self, id: &RobotId) -> Result<Option<RobotRecord>, RepositoryError> {
        Ok(self.read().robots.get(id).cloned())
    }

    async fn list_robots(&self) -> Result<Vec<RobotRecord>, RepositoryError> {
        let mut robots: Vec<RobotRecord> = self.read().robots.values().cloned().collect();
        robots.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(robots)
    }
}

#[async_trait]
impl ScanStore for InMemoryWarehouseStore {
    async fn record_scan(
        &self,
        scan: &RobotScanEvent,
        next: &Location,
    ) -> Result<(), RepositoryError> {
        let mut state = self.write();

        let mut rows = Vec::with_capacity(scan.scan_results.len());
        for result in &scan.scan_results {
            let product = state
                .products
                .get(&result.product_id)
                .ok_or_else(|| RepositoryError::UnknownProduct(result.product_id.clone()))?;
            rows.push(HistoryRecord {
                robot_id: scan.robot_id.clone(),
                product_id: result.product_id.clone(),
                product_name: product.name.clone(),
                quantity: result.quantity,
                location: scan.location.clone(),
                status: result.status,
                scanned_at: scan.timestamp,
            });
        }

        let robot = state
            .robots
            .get_mut(&scan.robot_id)
            .ok_or_else(|| RepositoryError::UnknownRobot(scan.robot_id.clone()))?;
        robot.status = "active".to_string();
        robot.battery_level = scan.battery_level;
        robot.location = Some(next.clone());
        robot.last_update = Some(scan.timestamp);

        state.history.extend(rows);
        Ok(())
    }
}

#[async_trait]
impl PredictionStore for InMemoryWarehouseStore {
    async fn inventory_snapshot(
        &self,
        product_ids: &[ProductId],
        as_of: DateTime<Utc>,
        period_days: u32,
    ) -> Result<InventorySnapshot, RepositoryError> {
        let state = self.read();

        let selected: Vec<&ProductRecord> = if product_ids.is_empty() {
            state.products.values().collect()
        } else {
            product_ids
                .iter()
                .map(|id| {
                    state
                        .products
                        .get(id)
                        .ok_or_else(|| RepositoryError::UnknownProduct(id.clone()))
                })
                .collect::<Result<_, _>>()?
        };

        let products = selected
            .into_iter()
            .map(|p| {
                let mut history: Vec<StockSample> = state
                    .history
                    .iter()
                    .filter(|h| h.product_id == p.id && h.scanned_at <= as_of)
                    .map(|h| StockSample {
                        at: h.scanned_at,
                        quantity: h.quantity,
                    })
                    .collect();
                history.sort_by_key(|s| s.at);

                ProductSnapshot {
                    product_id: p.id.clone(),
                    name: p.name.clone(),
                    min_stock: p.min_stock,
                    optimal_stock: p.optimal_stock,
                    history,
                }
            })
            .collect();

        Ok(InventorySnapshot {
            as_of,
            period_days,
            products,
        })
    }

    async fn save_predictions(
        &self,
        predictions: &[Prediction],
        generated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.write();
        if let Some(unknown) = predictions
            .iter()
            .find(|p| !state.products.contains_key(&p.product_id))
        {
            return Err(RepositoryError::UnknownProduct(unknown.product_id.clone()));
        }
        state
            .predictions
            .extend(predictions.iter().map(|p| (p.clone(), generated_at)));
        Ok(())
    }
}

#[async_trait]
impl DashboardStore for InMemoryWarehouseStore {
    async fn recent_scans(&self, limit: usize) -> Result<Vec<HistoryRecord>, RepositoryError> {
        // Newest first; among equal timestamps the later insert comes first.
        let mut history = self.read().history.clone();
        history.sort_by_key(|h| h.scanned_at);
        history.reverse();
        history.truncate(limit);
        Ok(history)
    }

    async fn count_scans_since(&self, since: DateTime<Utc>) -> Result<u64, RepositoryError> {
        Ok(self
            .read()
            .history
            .iter()
            .filter(|h| h.scanned_at >= since)
            .count() as u64)
    }

    async fn count_flagged_products(&self) -> Result<u64, RepositoryError> {
        let state = self.read();
        let flagged: std::collections::HashSet<&ProductId> = state
            .history
            .iter()
            .filter(|h| matches!(h.status, StockStatus::LowStock | StockStatus::Critical))
            .map(|h| &h.product_id)
            .collect();
        Ok(flagged.len() as u64)
    }
}

#[async_trait]
impl InventoryLookup for InMemoryWarehouseStore {
    async fn find_history_at(
        &self,
        scanned_at: DateTime<Utc>,
        product_id: &ProductId,
    ) -> Result<Option<HistoryRecord>, LookupError> {
        Ok(self
            .read()
            .history
            .iter()
            .rev()
            .find(|h| h.scanned_at == scanned_at && &h.product_id == product_id)
            .cloned())
    }

    async fn find_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<ProductRecord>, LookupError> {
        Ok(self.read().products.get(product_id).cloned())
    }

    async fn latest_quantity(&self, product_id: &ProductId) -> Result<Option<i64>, LookupError> {
        Ok(self
            .read()
            .history
            .iter()
            .filter(|h| &h.product_id == product_id)
            .max_by_key(|h| h.scanned_at)
            .map(|h| h.quantity))
    }
}
