//! HTTP API: robot ingestion, predictions, monitoring and the live dashboard stream.

pub mod app;
pub mod context;
pub mod middleware;
