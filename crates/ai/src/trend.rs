//! Deterministic linear-trend forecaster.
//!
//! Model:
//! - Consumption rate = (first quantity - last quantity) / elapsed days.
//! - Non-positive rate: no stockout foreseen within [`NO_STOCKOUT_DAYS`].
//! - Otherwise days until stockout = floor(current / rate).
//! - Recommended order tops up to optimal stock plus expected consumption
//!   over the requested period.
//! - Confidence grows with sample count: (n - 1) / (n + 1).

use async_trait::async_trait;
use chrono::Days;

use crate::model::{Forecast, ForecastBatch, ForecastModel};
use crate::request::{InventorySnapshot, ProductSnapshot};
use crate::result::AiError;

/// Horizon reported when stock is not being consumed.
pub const NO_STOCKOUT_DAYS: i64 = 365;

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Default, Copy, Clone)]
pub struct TrendForecaster;

impl TrendForecaster {
    pub fn new() -> Self {
        Self
    }

    pub fn forecast_now(&self, snapshot: &InventorySnapshot) -> Result<ForecastBatch, AiError> {
        if snapshot.period_days == 0 {
            return Err(AiError::invalid_input("period_days must be positive"));
        }

        let forecasts = snapshot
            .products
            .iter()
            .map(|p| forecast_product(snapshot, p))
            .collect::<Result<Vec<_>, _>>()?;

        let confidence = if forecasts.is_empty() {
            0.0
        } else {
            forecasts.iter().map(|f| f.confidence).sum::<f64>() / forecasts.len() as f64
        };

        Ok(ForecastBatch {
            forecasts,
            confidence,
        })
    }
}

#[async_trait]
impl ForecastModel for TrendForecaster {
    fn name(&self) -> &'static str {
        "local-trend"
    }

    async fn forecast(&self, snapshot: &InventorySnapshot) -> Result<ForecastBatch, AiError> {
        self.forecast_now(snapshot)
    }
}

/// Units consumed per day; zero when it cannot be estimated.
fn consumption_rate(product: &ProductSnapshot) -> f64 {
    let mut samples: Vec<_> = product.history.iter().collect();
    samples.sort_by_key(|s| s.at);

    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return 0.0;
    };

    let elapsed_days = (last.at - first.at).num_seconds() as f64 / SECONDS_PER_DAY;
    if elapsed_days <= 0.0 {
        return 0.0;
    }
    (first.quantity - last.quantity) as f64 / elapsed_days
}

fn forecast_product(
    snapshot: &InventorySnapshot,
    product: &ProductSnapshot,
) -> Result<Forecast, AiError> {
    let current = product.current_quantity();
    let rate = consumption_rate(product);

    let days_until_stockout = if current <= 0 {
        0
    } else if rate <= 0.0 {
        NO_STOCKOUT_DAYS
    } else {
        ((current as f64 / rate).floor() as i64).min(NO_STOCKOUT_DAYS)
    };

    let expected_use = (rate.max(0.0) * f64::from(snapshot.period_days)).ceil() as i64;
    let recommended_order = (product.optimal_stock - current + expected_use).max(0);

    let n = product.history.len() as f64;
    let confidence = if n == 0.0 { 0.0 } else { (n - 1.0) / (n + 1.0) };

    let predicted_date = snapshot
        .as_of
        .date_naive()
        .checked_add_days(Days::new(days_until_stockout as u64))
        .ok_or_else(|| AiError::invalid_input("forecast date out of range"))?;

    Ok(Forecast {
        product_id: product.product_id.clone(),
        predicted_date,
        days_until_stockout,
        recommended_order,
        confidence,
    })
}
