//! Rectangular cell ranges and their traversal orders.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{CellRef, EvalError};

/// Order in which a range is read into a sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceMode {
    /// Start column, increasing row.
    #[default]
    Vertical,
    /// Start row, increasing column.
    Horizontal,
    /// Every cell of the rectangle, row-major.
    Matrix,
}

impl FromStr for SequenceMode {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vertical" => Ok(SequenceMode::Vertical),
            "horizontal" => Ok(SequenceMode::Horizontal),
            "matrix" => Ok(SequenceMode::Matrix),
            _ => Err(EvalError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for SequenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SequenceMode::Vertical => "vertical",
            SequenceMode::Horizontal => "horizontal",
            SequenceMode::Matrix => "matrix",
        })
    }
}

/// Inclusive pair of corners, as written (not normalized).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    pub fn new(start: CellRef, end: CellRef) -> CellRange {
        CellRange { start, end }
    }

    /// Addresses visited by `mode`, in order. A range whose end precedes its
    /// start along the walked axis visits nothing on that axis.
    pub fn cells(&self, mode: SequenceMode) -> Vec<CellRef> {
        let (start, end) = (self.start, self.end);
        match mode {
            SequenceMode::Vertical => (start.row..=end.row)
                .map(|row| CellRef::new(row, start.col))
                .collect(),
            SequenceMode::Horizontal => (start.col..=end.col)
                .map(|col| CellRef::new(start.row, col))
                .collect(),
            SequenceMode::Matrix => (start.row..=end.row)
                .flat_map(|row| (start.col..=end.col).map(move |col| CellRef::new(row, col)))
                .collect(),
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// Parse a range like "A1:B5". Both halves must be valid addresses.
pub fn parse_range(range: &str) -> Result<CellRange, EvalError> {
    let invalid = || EvalError::InvalidRange(range.to_string());
    let (start, end) = range.split_once(':').ok_or_else(invalid)?;
    let start = CellRef::from_str(start.trim()).ok_or_else(invalid)?;
    let end = CellRef::from_str(end.trim()).ok_or_else(invalid)?;
    Ok(CellRange::new(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(
            parse_range("A1:B5"),
            Ok(CellRange::new(CellRef::new(0, 0), CellRef::new(4, 1)))
        );
        assert_eq!(
            parse_range("B2:D10").unwrap().to_string(),
            "B2:D10"
        );
    }

    #[test]
    fn test_parse_range_rejects_bad_input() {
        for bad in ["A1", "invalid", "A1:", ":B2", "A1:b2", "A1:B2:C3"] {
            assert_eq!(parse_range(bad), Err(EvalError::InvalidRange(bad.to_string())), "{bad}");
        }
    }

    #[test]
    fn test_traversal_orders() {
        let range = parse_range("A1:B2").unwrap();
        let labels = |mode| {
            range
                .cells(mode)
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(labels(SequenceMode::Vertical), ["A1", "A2"]);
        assert_eq!(labels(SequenceMode::Horizontal), ["A1", "B1"]);
        assert_eq!(labels(SequenceMode::Matrix), ["A1", "B1", "A2", "B2"]);
    }

    #[test]
    fn test_reversed_range_is_empty() {
        let range = parse_range("A4:A1").unwrap();
        assert!(range.cells(SequenceMode::Vertical).is_empty());
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("Horizontal".parse::<SequenceMode>(), Ok(SequenceMode::Horizontal));
        assert!("diagonal".parse::<SequenceMode>().is_err());
    }
}
