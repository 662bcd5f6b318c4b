use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use smartwh_core::ProductId;

use crate::result::AiError;

/// Longest forecast horizon accepted, in days.
pub const MAX_PERIOD_DAYS: u32 = 365;

/// Prediction request as sent by the dashboard.
///
/// An empty `product_ids` list means "every product".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PredictionRequest {
    #[serde(default)]
    pub product_ids: Vec<ProductId>,
    pub period_days: u32,
}

impl PredictionRequest {
    pub fn validate(&self) -> Result<(), AiError> {
        if self.period_days == 0 || self.period_days > MAX_PERIOD_DAYS {
            return Err(AiError::invalid_input(format!(
                "period_days must be within 1..={MAX_PERIOD_DAYS}, got {}",
                self.period_days
            )));
        }
        Ok(())
    }
}

/// One historical stock reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSample {
    pub at: DateTime<Utc>,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub min_stock: i64,
    pub optimal_stock: i64,
    pub history: Vec<StockSample>,
}

impl ProductSnapshot {
    /// Latest reading, or zero when the product was never scanned.
    pub fn current_quantity(&self) -> i64 {
        self.history
            .iter()
            .max_by_key(|s| s.at)
            .map(|s| s.quantity)
            .unwrap_or(0)
    }
}

/// Model input: thresholds plus history for the requested products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub as_of: DateTime<Utc>,
    pub period_days: u32,
    pub products: Vec<ProductSnapshot>,
}

impl InventorySnapshot {
    pub fn product(&self, id: &ProductId) -> Option<&ProductSnapshot> {
        self.products.iter().find(|p| &p.product_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn product_ids_default_to_all() {
        let req: PredictionRequest = serde_json::from_str(r#"{"period_days":7}"#).unwrap();
        assert!(req.product_ids.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn period_must_be_positive_and_bounded() {
        let zero = PredictionRequest {
            product_ids: vec![],
            period_days: 0,
        };
        assert!(matches!(zero.validate(), Err(AiError::InvalidInput(_))));

        let huge = PredictionRequest {
            product_ids: vec![],
            period_days: MAX_PERIOD_DAYS + 1,
        };
        assert!(huge.validate().is_err());
    }

    #[test]
    fn current_quantity_is_latest_sample() {
        let snap = ProductSnapshot {
            product_id: ProductId::new("TEL-4567").unwrap(),
            name: "Router".to_string(),
            min_stock: 10,
            optimal_stock: 50,
            history: vec![
                StockSample {
                    at: Utc.with_ymd_and_hms(2025, 1, 3, 0, 0, 0).unwrap(),
                    quantity: 20,
                },
                StockSample {
                    at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                    quantity: 40,
                },
            ],
        };
        assert_eq!(snap.current_quantity(), 20);
    }
}
