use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use smartwh_core::{Location, ProductId, RobotId, StockStatus};

/// One product observation inside a robot report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    pub status: StockStatus,
}

/// A robot's inventory report, as received from the robot and persisted.
///
/// `location` is where the scan happened; `next_checkpoint` is the raw
/// `"<zone>-<row>-<shelf>"` string the robot is heading to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotScanEvent {
    pub robot_id: RobotId,
    pub timestamp: DateTime<Utc>,
    pub location: Location,
    pub scan_results: Vec<ScanResult>,
    pub battery_level: i32,
    pub next_checkpoint: String,
}

/// Stockout forecast for a single product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub product_id: ProductId,
    pub product_name: String,
    #[serde(rename = "prediction_date")]
    pub predicted_date: NaiveDate,
    pub days_until_stockout: i64,
    #[serde(rename = "recommended_order")]
    pub recommended_order_qty: i64,
    pub confidence_score: f64,
}

/// A batch of forecasts produced by one prediction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionBatchEvent {
    pub predictions: Vec<Prediction>,
    #[serde(rename = "confidence")]
    pub overall_confidence: f64,
    pub generated_at: DateTime<Utc>,
}

/// Unit of work carried by the event channel.
///
/// Exactly one variant per event; consumers dispatch on the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    RobotScan(RobotScanEvent),
    PredictionBatch(PredictionBatchEvent),
}

impl DomainEvent {
    /// Stable name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::RobotScan(_) => "robot_scan",
            DomainEvent::PredictionBatch(_) => "prediction_batch",
        }
    }
}

impl From<RobotScanEvent> for DomainEvent {
    fn from(value: RobotScanEvent) -> Self {
        DomainEvent::RobotScan(value)
    }
}

impl From<PredictionBatchEvent> for DomainEvent {
    fn from(value: PredictionBatchEvent) -> Self {
        DomainEvent::PredictionBatch(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_report_deserializes_from_robot_payload() {
        let payload = serde_json::json!({
            "robot_id": "RB-001",
            "timestamp": "2025-01-10T09:30:00Z",
            "location": { "zone": "A", "row": 3, "shelf": 1 },
            "scan_results": [
                { "product_id": "TEL-4567", "product_name": "Router RT-AC68U", "quantity": 5, "status": "LOW_STOCK" }
            ],
            "battery_level": 60,
            "next_checkpoint": "A-4-2"
        });

        let scan: RobotScanEvent = serde_json::from_value(payload).unwrap();
        assert_eq!(scan.robot_id.as_str(), "RB-001");
        assert_eq!(scan.location, Location::new("A", 3, 1));
        assert_eq!(scan.scan_results[0].status, StockStatus::LowStock);
        assert_eq!(DomainEvent::from(scan).kind(), "robot_scan");
    }

    #[test]
    fn unknown_scan_status_is_rejected() {
        let payload = serde_json::json!({
            "product_id": "TEL-4567",
            "product_name": "Router",
            "quantity": 5,
            "status": "EMPTY"
        });
        assert!(serde_json::from_value::<ScanResult>(payload).is_err());
    }

    #[test]
    fn prediction_uses_wire_field_names() {
        let p = Prediction {
            product_id: ProductId::new("TEL-8901").unwrap(),
            product_name: "Modem DSL-2640U".to_string(),
            predicted_date: NaiveDate::from_ymd_opt(2025, 1, 14).unwrap(),
            days_until_stockout: 4,
            recommended_order_qty: 40,
            confidence_score: 0.8,
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["prediction_date"], "2025-01-14");
        assert_eq!(json["recommended_order"], 40);
    }
}
