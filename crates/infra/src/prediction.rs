//! Stockout prediction: snapshot, forecast, persist, cache, notify.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};
use thiserror::Error;

use smartwh_ai::{AiError, ForecastModel, PredictionRequest};
use smartwh_core::ProductId;
use smartwh_events::{EventChannel, Prediction, PredictionBatchEvent};

use crate::cache::Cache;
use crate::repository::{RepositoryError, WarehouseStore};

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("invalid prediction request: {0}")]
    InvalidRequest(String),

    #[error("unknown product {0}")]
    UnknownProduct(ProductId),

    #[error(transparent)]
    Model(AiError),

    #[error("repository error: {0}")]
    Repository(String),
}

impl From<AiError> for PredictionError {
    fn from(value: AiError) -> Self {
        match value {
            AiError::InvalidInput(msg) => Self::InvalidRequest(msg),
            other => Self::Model(other),
        }
    }
}

impl From<RepositoryError> for PredictionError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::UnknownProduct(id) => Self::UnknownProduct(id),
            other => Self::Repository(other.to_string()),
        }
    }
}

/// `ai:predict:<sha256 of product ids and period>:<period_days>`
pub fn cache_key(request: &PredictionRequest) -> String {
    let mut hasher = Sha256::new();
    for id in &request.product_ids {
        hasher.update(id.as_str().as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(request.period_days.to_be_bytes());
    format!("ai:predict:{:x}:{}", hasher.finalize(), request.period_days)
}

#[derive(Clone)]
pub struct PredictionService {
    store: Arc<dyn WarehouseStore>,
    model: Arc<dyn ForecastModel>,
    cache: Arc<dyn Cache>,
    channel: EventChannel,
    cache_ttl: Duration,
}

impl PredictionService {
    pub fn new(
        store: Arc<dyn WarehouseStore>,
        model: Arc<dyn ForecastModel>,
        cache: Arc<dyn Cache>,
        channel: EventChannel,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            model,
            cache,
            channel,
            cache_ttl,
        }
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    pub async fn predict(
        &self,
        request: PredictionRequest,
    ) -> Result<PredictionBatchEvent, PredictionError> {
        request.validate()?;

        let key = cache_key(&request);
        if let Some(batch) = self.cached(&key).await {
            tracing::debug!(key, "prediction served from cache");
            return Ok(batch);
        }

        let generated_at = Utc::now();
        let snapshot = self
            .store
            .inventory_snapshot(&request.product_ids, generated_at, request.period_days)
            .await?;

        let forecast = self.model.forecast(&snapshot).await?;

        let predictions = forecast
            .forecasts
            .into_iter()
            .map(|f| {
                let product = snapshot
                    .product(&f.product_id)
                    .ok_or_else(|| PredictionError::UnknownProduct(f.product_id.clone()))?;
                Ok(Prediction {
                    product_name: product.name.clone(),
                    product_id: f.product_id,
                    predicted_date: f.predicted_date,
                    days_until_stockout: f.days_until_stockout,
                    recommended_order_qty: f.recommended_order,
                    confidence_score: f.confidence,
                })
            })
            .collect::<Result<Vec<_>, PredictionError>>()?;

        self.store.save_predictions(&predictions, generated_at).await?;

        let batch = PredictionBatchEvent {
            predictions,
            overall_confidence: forecast.confidence,
            generated_at,
        };

        self.store_in_cache(&key, &batch).await;
        let outcome = self.channel.push(batch.clone());

        tracing::info!(
            model = self.model.name(),
            predictions = batch.predictions.len(),
            confidence = batch.overall_confidence,
            ?outcome,
            "prediction batch generated"
        );

        Ok(batch)
    }

    async fn cached(&self, key: &str) -> Option<PredictionBatchEvent> {
        let raw = match self.cache.get(key).await {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(key, error = %err, "prediction cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(batch) => Some(batch),
            Err(err) => {
                tracing::warn!(key, error = %err, "discarding unreadable cached prediction");
                None
            }
        }
    }

    async fn store_in_cache(&self, key: &str, batch: &PredictionBatchEvent) {
        let raw = match serde_json::to_string(batch) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "prediction batch not serializable");
                return;
            }
        };
        if let Err(err) = self.cache.set(key, raw, self.cache_ttl).await {
            tracing::warn!(key, error = %err, "prediction cache write failed");
        }
    }
}
