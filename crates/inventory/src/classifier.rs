//! Alert classification.
//!
//! Classification is deterministic given the lookup results: calling it twice
//! with the same event against the same data yields the same alerts.
//!
//! - A scan yields exactly one [`RobotUpdate`] plus one scanned
//!   [`InventoryAlert`] per non-OK scan result.
//! - A prediction batch yields one predicted [`InventoryAlert`] per prediction
//!   whose stockout is at most [`ADVISORY_DAYS`] away.
//!
//! Missing history/product rows fail only the alert they belong to; those
//! failures are collected in `skipped` for the caller to log. A malformed
//! checkpoint fails the whole scan.

use chrono::{DateTime, Utc};
use thiserror::Error;

use smartwh_core::{DomainError, ProductId, StockStatus};
use smartwh_events::{DomainEvent, Prediction, PredictionBatchEvent, RobotScanEvent, ScanResult};

use crate::alert::{Alert, AlertOrigin, InventoryAlert, RobotUpdate};
use crate::lookup::{InventoryLookup, LookupError};

/// Stockouts this close (in days) are critical.
pub const CRITICAL_DAYS: i64 = 2;
/// Stockouts this close (in days) warrant an advisory alert.
pub const ADVISORY_DAYS: i64 = 7;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error(transparent)]
    Checkpoint(#[from] DomainError),

    #[error("no scan history for product {product_id} at {scanned_at}")]
    HistoryNotFound {
        product_id: ProductId,
        scanned_at: DateTime<Utc>,
    },

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Severity tier derived from days until stockout.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StockoutUrgency {
    Critical,
    Advisory,
}

impl StockoutUrgency {
    fn headline(self, days: i64) -> String {
        match self {
            StockoutUrgency::Critical => format!("CRITICAL LEVEL! Stock runs out in {days} days"),
            StockoutUrgency::Advisory => {
                format!("Replenishment recommended. Stock runs out in {days} days")
            }
        }
    }
}

/// `None` means stock is fine for now and no alert is due.
pub fn stockout_urgency(days_until_stockout: i64) -> Option<StockoutUrgency> {
    if days_until_stockout <= CRITICAL_DAYS {
        Some(StockoutUrgency::Critical)
    } else if days_until_stockout <= ADVISORY_DAYS {
        Some(StockoutUrgency::Advisory)
    } else {
        None
    }
}

/// Status of `current` stock against a product's thresholds.
///
/// `optimal_stock / 2` uses integer division.
pub fn stock_status(current: i64, min_stock: i64, optimal_stock: i64) -> StockStatus {
    if current <= min_stock {
        StockStatus::Critical
    } else if current <= optimal_stock / 2 {
        StockStatus::LowStock
    } else {
        StockStatus::Ok
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanClassification {
    pub robot_update: RobotUpdate,
    pub alerts: Vec<InventoryAlert>,
    pub skipped: Vec<ClassifyError>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredictionClassification {
    pub alerts: Vec<InventoryAlert>,
    pub skipped: Vec<ClassifyError>,
}

/// Alerts for one event in write order, plus the per-alert failures.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventClassification {
    pub alerts: Vec<Alert>,
    pub skipped: Vec<ClassifyError>,
}

impl From<ScanClassification> for EventClassification {
    fn from(value: ScanClassification) -> Self {
        let mut alerts = Vec::with_capacity(value.alerts.len() + 1);
        alerts.push(Alert::RobotUpdate(value.robot_update));
        alerts.extend(value.alerts.into_iter().map(Alert::InventoryAlert));
        Self {
            alerts,
            skipped: value.skipped,
        }
    }
}

impl From<PredictionClassification> for EventClassification {
    fn from(value: PredictionClassification) -> Self {
        Self {
            alerts: value.alerts.into_iter().map(Alert::InventoryAlert).collect(),
            skipped: value.skipped,
        }
    }
}

/// Dispatch on the event variant.
pub async fn classify_event<L>(
    lookup: &L,
    event: &DomainEvent,
) -> Result<EventClassification, ClassifyError>
where
    L: InventoryLookup + ?Sized,
{
    match event {
        DomainEvent::RobotScan(scan) => Ok(classify_scan(lookup, scan).await?.into()),
        DomainEvent::PredictionBatch(batch) => Ok(classify_prediction(lookup, batch).await.into()),
    }
}

pub async fn classify_scan<L>(
    lookup: &L,
    scan: &RobotScanEvent,
) -> Result<ScanClassification, ClassifyError>
where
    L: InventoryLookup + ?Sized,
{
    let robot_update = RobotUpdate::from_scan(scan)?;

    let mut alerts = Vec::new();
    let mut skipped = Vec::new();
    for result in scan.scan_results.iter().filter(|r| !r.status.is_ok()) {
        match scanned_alert(lookup, scan.timestamp, result).await {
            Ok(alert) => alerts.push(alert),
            Err(err) => skipped.push(err),
        }
    }

    Ok(ScanClassification {
        robot_update,
        alerts,
        skipped,
    })
}

async fn scanned_alert<L>(
    lookup: &L,
    scanned_at: DateTime<Utc>,
    result: &ScanResult,
) -> Result<InventoryAlert, ClassifyError>
where
    L: InventoryLookup + ?Sized,
{
    let history = lookup
        .find_history_at(scanned_at, &result.product_id)
        .await?
        .ok_or_else(|| ClassifyError::HistoryNotFound {
            product_id: result.product_id.clone(),
            scanned_at,
        })?;

    Ok(InventoryAlert {
        message: format!("{} stock! Replenishment required.", history.status),
        product_id: history.product_id,
        product_name: history.product_name,
        current_quantity: history.quantity,
        location: Some(history.location),
        status: history.status,
        origin: AlertOrigin::Scanned,
        timestamp: history.scanned_at,
    })
}

pub async fn classify_prediction<L>(
    lookup: &L,
    batch: &PredictionBatchEvent,
) -> PredictionClassification
where
    L: InventoryLookup + ?Sized,
{
    let mut out = PredictionClassification::default();

    for prediction in &batch.predictions {
        let Some(urgency) = stockout_urgency(prediction.days_until_stockout) else {
            tracing::debug!(
                product_id = %prediction.product_id,
                days_until_stockout = prediction.days_until_stockout,
                "stock level normal; no alert"
            );
            continue;
        };

        match predicted_alert(lookup, prediction, urgency, batch.generated_at).await {
            Ok(alert) => out.alerts.push(alert),
            Err(err) => out.skipped.push(err),
        }
    }

    out
}

async fn predicted_alert<L>(
    lookup: &L,
    prediction: &Prediction,
    urgency: StockoutUrgency,
    generated_at: DateTime<Utc>,
) -> Result<InventoryAlert, ClassifyError>
where
    L: InventoryLookup + ?Sized,
{
    let product = lookup
        .find_product(&prediction.product_id)
        .await?
        .ok_or_else(|| ClassifyError::ProductNotFound(prediction.product_id.clone()))?;
    let current = lookup
        .latest_quantity(&prediction.product_id)
        .await?
        .unwrap_or(0);

    let message = format!(
        "{}. Recommended order: {} units. Forecast confidence: {:.1}%",
        urgency.headline(prediction.days_until_stockout),
        prediction.recommended_order_qty,
        prediction.confidence_score * 100.0,
    );

    Ok(InventoryAlert {
        product_id: product.id,
        product_name: product.name,
        current_quantity: current,
        location: None,
        status: stock_status(current, product.min_stock, product.optimal_stock),
        origin: AlertOrigin::Predicted,
        timestamp: generated_at,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use smartwh_core::{Location, RobotId};

    use crate::lookup::{HistoryRecord, ProductRecord};

    #[derive(Default)]
    struct FixtureLookup {
        history: HashMap<(DateTime<Utc>, ProductId), HistoryRecord>,
        products: HashMap<ProductId, ProductRecord>,
        quantities: HashMap<ProductId, i64>,
        fail: bool,
    }

    #[async_trait]
    impl InventoryLookup for FixtureLookup {
        async fn find_history_at(
            &self,
            scanned_at: DateTime<Utc>,
            product_id: &ProductId,
        ) -> Result<Option<HistoryRecord>, LookupError> {
            if self.fail {
                return Err(LookupError::backend("connection refused"));
            }
            Ok(self.history.get(&(scanned_at, product_id.clone())).cloned())
        }

        async fn find_product(
            &self,
            product_id: &ProductId,
        ) -> Result<Option<ProductRecord>, LookupError> {
            if self.fail {
                return Err(LookupError::backend("connection refused"));
            }
            Ok(self.products.get(product_id).cloned())
        }

        async fn latest_quantity(
            &self,
            product_id: &ProductId,
        ) -> Result<Option<i64>, LookupError> {
            Ok(self.quantities.get(product_id).copied())
        }
    }

    fn pid(code: &str) -> ProductId {
        ProductId::new(code).unwrap()
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 9, 30, 0).unwrap()
    }

    fn scan_result(code: &str, quantity: i64, status: StockStatus) -> ScanResult {
        ScanResult {
            product_id: pid(code),
            product_name: format!("product {code}"),
            quantity,
            status,
        }
    }

    fn scan(results: Vec<ScanResult>) -> RobotScanEvent {
        RobotScanEvent {
            robot_id: RobotId::new("RB-001").unwrap(),
            timestamp: at(),
            location: Location::new("A", 3, 1),
            scan_results: results,
            battery_level: 60,
            next_checkpoint: "A-4-2".to_string(),
        }
    }

    fn lookup_with_history(results: &[ScanResult]) -> FixtureLookup {
        let mut lookup = FixtureLookup::default();
        for r in results {
            lookup.history.insert(
                (at(), r.product_id.clone()),
                HistoryRecord {
                    robot_id: RobotId::new("RB-001").unwrap(),
                    product_id: r.product_id.clone(),
                    product_name: r.product_name.clone(),
                    quantity: r.quantity,
                    location: Location::new("A", 3, 1),
                    status: r.status,
                    scanned_at: at(),
                },
            );
        }
        lookup
    }

    fn lookup_with_product(code: &str, current: Option<i64>, min: i64, optimal: i64) -> FixtureLookup {
        let mut lookup = FixtureLookup::default();
        lookup.products.insert(
            pid(code),
            ProductRecord {
                id: pid(code),
                name: "Modem DSL-2640U".to_string(),
                category: "network".to_string(),
                min_stock: min,
                optimal_stock: optimal,
            },
        );
        if let Some(q) = current {
            lookup.quantities.insert(pid(code), q);
        }
        lookup
    }

    fn prediction(code: &str, days: i64) -> Prediction {
        Prediction {
            product_id: pid(code),
            product_name: "Modem DSL-2640U".to_string(),
            predicted_date: NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
            days_until_stockout: days,
            recommended_order_qty: 40,
            confidence_score: 0.8,
        }
    }

    fn batch(predictions: Vec<Prediction>) -> PredictionBatchEvent {
        PredictionBatchEvent {
            predictions,
            overall_confidence: 0.8,
            generated_at: at(),
        }
    }

    #[test]
    fn urgency_boundaries() {
        assert_eq!(stockout_urgency(0), Some(StockoutUrgency::Critical));
        assert_eq!(stockout_urgency(2), Some(StockoutUrgency::Critical));
        assert_eq!(stockout_urgency(3), Some(StockoutUrgency::Advisory));
        assert_eq!(stockout_urgency(7), Some(StockoutUrgency::Advisory));
        assert_eq!(stockout_urgency(8), None);
    }

    #[test]
    fn stock_status_boundaries() {
        // min 10, optimal 50 -> half is 25
        assert_eq!(stock_status(10, 10, 50), StockStatus::Critical);
        assert_eq!(stock_status(11, 10, 50), StockStatus::LowStock);
        assert_eq!(stock_status(25, 10, 50), StockStatus::LowStock);
        assert_eq!(stock_status(26, 10, 50), StockStatus::Ok);
        // odd optimal rounds down
        assert_eq!(stock_status(25, 10, 51), StockStatus::LowStock);
        assert_eq!(stock_status(26, 10, 51), StockStatus::Ok);
    }

    #[tokio::test]
    async fn scan_yields_update_and_one_alert_per_non_ok_result() {
        let results = vec![
            scan_result("TEL-1", 5, StockStatus::LowStock),
            scan_result("TEL-2", 80, StockStatus::Ok),
            scan_result("TEL-3", 1, StockStatus::Critical),
        ];
        let lookup = lookup_with_history(&results);

        let out = classify_scan(&lookup, &scan(results)).await.unwrap();

        assert_eq!(out.robot_update.battery_level, 60);
        assert_eq!(
            (out.robot_update.zone.as_str(), out.robot_update.row, out.robot_update.shelf),
            ("A", 4, 2)
        );
        assert!(out.skipped.is_empty());

        let ids: Vec<&str> = out.alerts.iter().map(|a| a.product_id.as_str()).collect();
        assert_eq!(ids, vec!["TEL-1", "TEL-3"]);

        let first = &out.alerts[0];
        assert_eq!(first.status, StockStatus::LowStock);
        assert_eq!(first.origin, AlertOrigin::Scanned);
        assert_eq!(first.current_quantity, 5);
        assert_eq!(first.location, Some(Location::new("A", 3, 1)));
        assert_eq!(first.message, "LOW_STOCK stock! Replenishment required.");
    }

    #[tokio::test]
    async fn malformed_checkpoint_fails_the_scan() {
        let mut event = scan(vec![scan_result("TEL-1", 5, StockStatus::LowStock)]);
        event.next_checkpoint = "A-x-2".to_string();

        let err = classify_scan(&FixtureLookup::default(), &event).await.unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::Checkpoint(DomainError::MalformedCheckpoint { .. })
        ));
    }

    #[tokio::test]
    async fn missing_history_skips_only_that_alert() {
        let present = scan_result("TEL-1", 5, StockStatus::LowStock);
        let missing = scan_result("TEL-9", 0, StockStatus::Critical);
        let lookup = lookup_with_history(std::slice::from_ref(&present));

        let out = classify_scan(&lookup, &scan(vec![present, missing])).await.unwrap();

        assert_eq!(out.alerts.len(), 1);
        assert_eq!(
            out.skipped,
            vec![ClassifyError::HistoryNotFound {
                product_id: pid("TEL-9"),
                scanned_at: at(),
            }]
        );
    }

    #[tokio::test]
    async fn lookup_backend_failure_is_skipped_not_fatal() {
        let lookup = FixtureLookup {
            fail: true,
            ..FixtureLookup::default()
        };
        let out = classify_scan(&lookup, &scan(vec![scan_result("TEL-1", 5, StockStatus::LowStock)]))
            .await
            .unwrap();
        assert!(out.alerts.is_empty());
        assert!(matches!(out.skipped[0], ClassifyError::Lookup(_)));
    }

    #[tokio::test]
    async fn critical_prediction_message() {
        let lookup = lookup_with_product("TEL-8901", Some(12), 10, 50);
        let out = classify_prediction(&lookup, &batch(vec![prediction("TEL-8901", 2)])).await;

        assert!(out.skipped.is_empty());
        let alert = &out.alerts[0];
        assert_eq!(alert.origin, AlertOrigin::Predicted);
        assert_eq!(alert.location, None);
        assert_eq!(alert.current_quantity, 12);
        assert_eq!(alert.status, StockStatus::LowStock);
        assert_eq!(alert.timestamp, at());
        assert_eq!(
            alert.message,
            "CRITICAL LEVEL! Stock runs out in 2 days. Recommended order: 40 units. Forecast confidence: 80.0%"
        );
    }

    #[tokio::test]
    async fn advisory_and_normal_predictions() {
        let lookup = lookup_with_product("TEL-8901", None, 10, 50);
        let out = classify_prediction(
            &lookup,
            &batch(vec![prediction("TEL-8901", 7), prediction("TEL-8901", 8)]),
        )
        .await;

        assert_eq!(out.alerts.len(), 1);
        assert!(out.alerts[0].message.starts_with("Replenishment recommended. Stock runs out in 7 days"));
        // never scanned counts as zero stock
        assert_eq!(out.alerts[0].current_quantity, 0);
        assert_eq!(out.alerts[0].status, StockStatus::Critical);
    }

    #[tokio::test]
    async fn unknown_product_prediction_is_skipped() {
        let out = classify_prediction(&FixtureLookup::default(), &batch(vec![prediction("TEL-0", 1)])).await;
        assert!(out.alerts.is_empty());
        assert_eq!(out.skipped, vec![ClassifyError::ProductNotFound(pid("TEL-0"))]);
    }

    #[tokio::test]
    async fn event_dispatch_orders_robot_update_first() {
        let results = vec![scan_result("TEL-1", 5, StockStatus::LowStock)];
        let lookup = lookup_with_history(&results);

        let out = classify_event(&lookup, &DomainEvent::from(scan(results))).await.unwrap();
        let kinds: Vec<&str> = out.alerts.iter().map(Alert::kind).collect();
        assert_eq!(kinds, vec!["robot_update", "inventory_alert"]);

        let lookup = lookup_with_product("TEL-8901", Some(30), 10, 50);
        let out = classify_event(&lookup, &DomainEvent::from(batch(vec![prediction("TEL-8901", 5)])))
            .await
            .unwrap();
        let kinds: Vec<&str> = out.alerts.iter().map(Alert::kind).collect();
        assert_eq!(kinds, vec!["inventory_alert"]);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn block_on<F: std::future::Future>(f: F) -> F::Output {
            tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap()
                .block_on(f)
        }

        fn status_strategy() -> impl Strategy<Value = StockStatus> {
            prop_oneof![
                Just(StockStatus::Ok),
                Just(StockStatus::LowStock),
                Just(StockStatus::Critical),
            ]
        }

        proptest! {
            /// Property: same event + same lookup data => same alerts.
            #[test]
            fn scan_classification_is_idempotent(
                rows in prop::collection::vec((0i64..200, status_strategy()), 0..8),
            ) {
                let results: Vec<ScanResult> = rows
                    .iter()
                    .enumerate()
                    .map(|(i, (q, s))| scan_result(&format!("TEL-{i}"), *q, *s))
                    .collect();
                let non_ok = results.iter().filter(|r| !r.status.is_ok()).count();
                let lookup = lookup_with_history(&results);
                let event = scan(results);

                let first = block_on(classify_scan(&lookup, &event)).unwrap();
                let second = block_on(classify_scan(&lookup, &event)).unwrap();
                prop_assert_eq!(first.alerts.len(), non_ok);
                prop_assert_eq!(first, second);
            }

            /// Property: an alert is produced iff days <= 7, deterministically.
            #[test]
            fn prediction_classification_is_idempotent(
                days in prop::collection::vec(-3i64..30, 0..8),
                current in 0i64..120,
            ) {
                let lookup = lookup_with_product("TEL-8901", Some(current), 10, 50);
                let event = batch(days.iter().map(|d| prediction("TEL-8901", *d)).collect());

                let first = block_on(classify_prediction(&lookup, &event));
                let second = block_on(classify_prediction(&lookup, &event));
                prop_assert_eq!(first.alerts.len(), days.iter().filter(|d| **d <= ADVISORY_DAYS).count());
                prop_assert_eq!(first, second);
            }

            /// Property: status tiers are monotone in current stock.
            #[test]
            fn stock_status_is_monotone(
                min in 0i64..100,
                optimal in 0i64..400,
                current in -10i64..500,
            ) {
                let rank = |s: StockStatus| match s {
                    StockStatus::Critical => 0,
                    StockStatus::LowStock => 1,
                    StockStatus::Ok => 2,
                };
                prop_assert!(rank(stock_status(current, min, optimal)) <= rank(stock_status(current + 1, min, optimal)));
            }
        }
    }
}
