//! Value objects: equality by value, not identity.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// A shelf position inside the warehouse.
///
/// Robots report their next checkpoint as `"<zone>-<row>-<shelf>"`, e.g. `A-4-2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub zone: String,
    pub row: i32,
    pub shelf: i32,
}

impl Location {
    pub fn new(zone: impl Into<String>, row: i32, shelf: i32) -> Self {
        Self {
            zone: zone.into(),
            row,
            shelf,
        }
    }

    /// Parse a hyphen-delimited checkpoint.
    ///
    /// Exactly three segments are accepted; row and shelf must be integers.
    /// Anything else is a hard error, never a defaulted location.
    pub fn parse_checkpoint(checkpoint: &str) -> DomainResult<Self> {
        let segments: Vec<&str> = checkpoint.trim().split('-').collect();
        let [zone, row, shelf] = segments.as_slice() else {
            return Err(DomainError::malformed_checkpoint(
                checkpoint,
                "expected <zone>-<row>-<shelf>",
            ));
        };

        let zone = zone.trim();
        if zone.is_empty() {
            return Err(DomainError::malformed_checkpoint(checkpoint, "zone is empty"));
        }

        let row = row
            .trim()
            .parse::<i32>()
            .map_err(|_| DomainError::malformed_checkpoint(checkpoint, "row is not an integer"))?;
        let shelf = shelf
            .trim()
            .parse::<i32>()
            .map_err(|_| DomainError::malformed_checkpoint(checkpoint, "shelf is not an integer"))?;

        Ok(Self::new(zone, row, shelf))
    }
}

impl FromStr for Location {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_checkpoint(s)
    }
}

impl core::fmt::Display for Location {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}-{}-{}", self.zone, self.row, self.shelf)
    }
}

/// Stock level reported by a robot scan or derived from product thresholds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    Ok,
    LowStock,
    Critical,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::Ok => "OK",
            StockStatus::LowStock => "LOW_STOCK",
            StockStatus::Critical => "CRITICAL",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, StockStatus::Ok)
    }
}

impl core::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "OK" => Ok(StockStatus::Ok),
            "LOW_STOCK" => Ok(StockStatus::LowStock),
            "CRITICAL" => Ok(StockStatus::Critical),
            other => Err(DomainError::validation(format!("unknown stock status: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_checkpoint() {
        let loc = Location::parse_checkpoint("A-4-2").unwrap();
        assert_eq!(loc, Location::new("A", 4, 2));
    }

    #[test]
    fn non_numeric_row_is_rejected() {
        let err = Location::parse_checkpoint("A-x-2").unwrap_err();
        match err {
            DomainError::MalformedCheckpoint { checkpoint, reason } => {
                assert_eq!(checkpoint, "A-x-2");
                assert_eq!(reason, "row is not an integer");
            }
            other => panic!("expected MalformedCheckpoint, got {other:?}"),
        }
    }

    #[test]
    fn missing_segment_is_rejected() {
        assert!(matches!(
            Location::parse_checkpoint("A-4"),
            Err(DomainError::MalformedCheckpoint { .. })
        ));
    }

    #[test]
    fn extra_segment_is_rejected() {
        assert!(Location::parse_checkpoint("A-4-2-9").is_err());
    }

    #[test]
    fn stock_status_uses_wire_names() {
        assert_eq!(serde_json::to_string(&StockStatus::LowStock).unwrap(), "\"LOW_STOCK\"");
        assert_eq!("CRITICAL".parse::<StockStatus>().unwrap(), StockStatus::Critical);
        assert!("MISSING".parse::<StockStatus>().is_err());
    }

    #[test]
    fn empty_zone_is_rejected() {
        assert!(Location::parse_checkpoint("-4-2").is_err());
        assert!(Location::parse_checkpoint("").is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: a rendered location parses back to itself.
            #[test]
            fn display_is_parseable(
                zone in "[A-Z]{1,3}",
                row in 0i32..10_000,
                shelf in 0i32..10_000,
            ) {
                let loc = Location::new(zone, row, shelf);
                let parsed = Location::parse_checkpoint(&loc.to_string()).unwrap();
                prop_assert_eq!(parsed, loc);
            }
        }
    }
}
