//! Outbound dashboard messages.
//!
//! Written to the live connection as `{"type": "...", "data": {...}}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use smartwh_core::{DomainError, Location, ProductId, RobotId, StockStatus};
use smartwh_events::RobotScanEvent;

/// Robot position/battery update, derived 1:1 from a scan report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotUpdate {
    #[serde(rename = "id")]
    pub robot_id: RobotId,
    pub status: String,
    pub battery_level: i32,
    pub last_update: DateTime<Utc>,
    #[serde(rename = "current_zone")]
    pub zone: String,
    #[serde(rename = "current_row")]
    pub row: i32,
    #[serde(rename = "current_shelf")]
    pub shelf: i32,
}

impl RobotUpdate {
    pub const ACTIVE: &'static str = "active";

    /// Build the update from the robot's battery and *next* checkpoint.
    ///
    /// A malformed checkpoint is an error, never a defaulted position.
    pub fn from_scan(scan: &RobotScanEvent) -> Result<Self, DomainError> {
        let next = Location::parse_checkpoint(&scan.next_checkpoint)?;
        Ok(Self {
            robot_id: scan.robot_id.clone(),
            status: Self::ACTIVE.to_string(),
            battery_level: scan.battery_level,
            last_update: scan.timestamp,
            zone: next.zone,
            row: next.row,
            shelf: next.shelf,
        })
    }
}

/// Whether an alert came from a physical scan or from a forecast.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertOrigin {
    Scanned,
    Predicted,
}

/// A stock alert for one product.
///
/// Predicted alerts carry no shelf position, so `location` is omitted from
/// the wire form for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryAlert {
    pub product_id: ProductId,
    pub product_name: String,
    pub current_quantity: i64,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub status: StockStatus,
    #[serde(rename = "alert_type")]
    pub origin: AlertOrigin,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Message written to the live dashboard connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Alert {
    RobotUpdate(RobotUpdate),
    InventoryAlert(InventoryAlert),
}

impl Alert {
    pub fn kind(&self) -> &'static str {
        match self {
            Alert::RobotUpdate(_) => "robot_update",
            Alert::InventoryAlert(_) => "inventory_alert",
        }
    }
}

impl From<RobotUpdate> for Alert {
    fn from(value: RobotUpdate) -> Self {
        Alert::RobotUpdate(value)
    }
}

impl From<InventoryAlert> for Alert {
    fn from(value: InventoryAlert) -> Self {
        Alert::InventoryAlert(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scan(next_checkpoint: &str) -> RobotScanEvent {
        RobotScanEvent {
            robot_id: RobotId::new("RB-001").unwrap(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 10, 9, 30, 0).unwrap(),
            location: Location::new("A", 3, 1),
            scan_results: vec![],
            battery_level: 60,
            next_checkpoint: next_checkpoint.to_string(),
        }
    }

    #[test]
    fn robot_update_wire_shape() {
        let update = RobotUpdate::from_scan(&scan("A-4-2")).unwrap();
        let json = serde_json::to_value(Alert::from(update)).unwrap();

        assert_eq!(json["type"], "robot_update");
        assert_eq!(json["data"]["id"], "RB-001");
        assert_eq!(json["data"]["status"], "active");
        assert_eq!(json["data"]["battery_level"], 60);
        assert_eq!(json["data"]["current_zone"], "A");
        assert_eq!(json["data"]["current_row"], 4);
        assert_eq!(json["data"]["current_shelf"], 2);
    }

    #[test]
    fn robot_update_rejects_malformed_checkpoint() {
        assert!(matches!(
            RobotUpdate::from_scan(&scan("A-x-2")),
            Err(DomainError::MalformedCheckpoint { .. })
        ));
    }

    #[test]
    fn predicted_alert_omits_location() {
        let alert = InventoryAlert {
            product_id: ProductId::new("TEL-8901").unwrap(),
            product_name: "Modem DSL-2640U".to_string(),
            current_quantity: 12,
            location: None,
            status: StockStatus::LowStock,
            origin: AlertOrigin::Predicted,
            timestamp: Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap(),
            message: "m".to_string(),
        };
        let json = serde_json::to_value(Alert::from(alert.clone())).unwrap();

        assert_eq!(json["type"], "inventory_alert");
        assert_eq!(json["data"]["alert_type"], "predicted");
        assert_eq!(json["data"]["status"], "LOW_STOCK");
        assert!(json["data"].get("zone").is_none());

        let back: Alert = serde_json::from_value(json).unwrap();
        assert_eq!(back, Alert::InventoryAlert(alert));
    }

    #[test]
    fn scanned_alert_flattens_location() {
        let alert = InventoryAlert {
            product_id: ProductId::new("TEL-4567").unwrap(),
            product_name: "Router RT-AC68U".to_string(),
            current_quantity: 5,
            location: Some(Location::new("A", 3, 1)),
            status: StockStatus::Critical,
            origin: AlertOrigin::Scanned,
            timestamp: Utc.with_ymd_and_hms(2025, 1, 10, 9, 30, 0).unwrap(),
            message: "m".to_string(),
        };
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["zone"], "A");
        assert_eq!(json["row"], 3);
        assert_eq!(json["shelf"], 1);
    }
}
