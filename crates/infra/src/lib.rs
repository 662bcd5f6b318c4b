//! Infrastructure layer: config, persistence, cache and the services that
//! feed the event channel.

pub mod cache;
pub mod config;
pub mod dashboard;
pub mod ingest;
pub mod prediction;
pub mod repository;

pub use config::{AppConfig, ConfigError};
pub use dashboard::{DashboardError, DashboardService, DashboardView};
pub use ingest::{IngestError, IngestReceipt, ScanIngestor};
pub use prediction::{PredictionError, PredictionService};
