//! Read-only persistence lookups needed to classify events.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use smartwh_core::{Location, ProductId, RobotId, StockStatus};

/// One persisted scan observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub robot_id: RobotId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    pub location: Location,
    pub status: StockStatus,
    pub scanned_at: DateTime<Utc>,
}

/// Product catalogue entry with its stock thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub min_stock: i64,
    pub optimal_stock: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("lookup backend failure: {0}")]
    Backend(String),
}

impl LookupError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Read-only view over products and scan history.
///
/// `Ok(None)` means "not found"; `Err` is reserved for backend failures.
#[async_trait]
pub trait InventoryLookup: Send + Sync {
    /// History entry written for `product_id` by the scan taken at `scanned_at`.
    async fn find_history_at(
        &self,
        scanned_at: DateTime<Utc>,
        product_id: &ProductId,
    ) -> Result<Option<HistoryRecord>, LookupError>;

    async fn find_product(&self, product_id: &ProductId)
    -> Result<Option<ProductRecord>, LookupError>;

    /// Most recently scanned quantity, `None` if the product was never scanned.
    async fn latest_quantity(&self, product_id: &ProductId) -> Result<Option<i64>, LookupError>;
}

#[async_trait]
impl<L> InventoryLookup for Arc<L>
where
    L: InventoryLookup + ?Sized,
{
    async fn find_history_at(
        &self,
        scanned_at: DateTime<Utc>,
        product_id: &ProductId,
    ) -> Result<Option<HistoryRecord>, LookupError> {
        (**self).find_history_at(scanned_at, product_id).await
    }

    async fn find_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<ProductRecord>, LookupError> {
        (**self).find_product(product_id).await
    }

    async fn latest_quantity(&self, product_id: &ProductId) -> Result<Option<i64>, LookupError> {
        (**self).latest_quantity(product_id).await
    }
}
