//! `smartwh-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! warehouse identifiers, the shelf `Location` value object and the domain
//! error model shared by every other crate.

pub mod error;
pub mod id;
pub mod value_object;

pub use error::{DomainError, DomainResult};
pub use id::{ProductId, RobotId};
pub use value_object::{Location, StockStatus};
