use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use smartwh_core::ProductId;

use crate::request::InventorySnapshot;
use crate::result::AiError;

/// Stockout forecast for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub product_id: ProductId,
    pub predicted_date: NaiveDate,
    pub days_until_stockout: i64,
    pub recommended_order: i64,
    /// In \[0, 1\].
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastBatch {
    pub forecasts: Vec<Forecast>,
    pub confidence: f64,
}

/// A stockout forecaster.
///
/// Implementations must not mutate any state visible to the caller.
#[async_trait]
pub trait ForecastModel: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn forecast(&self, snapshot: &InventorySnapshot) -> Result<ForecastBatch, AiError>;
}
