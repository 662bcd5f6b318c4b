//! `smartwh-ai`
//!
//! **Responsibility:** stockout forecasting boundary.
//!
//! This crate does not touch storage or the event channel:
//! - Callers hand in an [`InventorySnapshot`].
//! - A [`ForecastModel`] turns it into a [`ForecastBatch`].
//! - Persisting and publishing the result is the caller's job.

pub mod chat;
pub mod model;
pub mod request;
pub mod result;
pub mod trend;

pub use chat::{ChatCompletionConfig, ChatCompletionForecaster};
pub use model::{Forecast, ForecastBatch, ForecastModel};
pub use request::{InventorySnapshot, PredictionRequest, ProductSnapshot, StockSample};
pub use result::AiError;
pub use trend::TrendForecaster;
