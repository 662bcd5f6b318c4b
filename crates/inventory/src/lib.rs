//! Inventory alerting.
//!
//! Turns [`smartwh_events::DomainEvent`]s into dashboard [`Alert`]s. The only
//! IO is read-only, through the [`InventoryLookup`] port.

pub mod alert;
pub mod classifier;
pub mod lookup;

pub use alert::{Alert, AlertOrigin, InventoryAlert, RobotUpdate};
pub use classifier::{
    ADVISORY_DAYS, CRITICAL_DAYS, ClassifyError, EventClassification, PredictionClassification,
    ScanClassification, StockoutUrgency, classify_event,
    classify_prediction, classify_scan, stock_status, stockout_urgency,
};
pub use lookup::{HistoryRecord, InventoryLookup, LookupError, ProductRecord};
