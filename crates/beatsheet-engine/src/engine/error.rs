//! Formula evaluation errors.
//!
//! Every failure inside a single formula is an [`EvalError`]. The grid engine
//! catches them at the cell boundary and stores a [`CellError`] in place of
//! the cell's value, so a bad formula never aborts a pass.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::CellRef;

/// Broad category of an evaluation failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Bad arity, literal, mode, quality, note name or range syntax.
    Parse,
    /// Out-of-bounds, malformed or circular address.
    Reference,
    /// Division by zero or a non-numeric operand.
    Arithmetic,
    /// Nested builtin calls deeper than the limit.
    RecursionLimit,
    /// Reported by the script host.
    External,
}

/// Errors raised while evaluating one formula.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Empty formula")]
    EmptyFormula,

    #[error("{0}")]
    Arity(String),

    #[error("Invalid range format. Expected \"A1:B2\", got \"{0}\"")]
    InvalidRange(String),

    #[error("Invalid sequence mode: {0}. Expected one of: vertical, horizontal, matrix")]
    InvalidMode(String),

    #[error("Invalid note name: {0}")]
    InvalidNoteName(String),

    #[error("Invalid chord quality: {0}. Valid qualities: {valid}", valid = crate::music::quality_names().join(", "))]
    InvalidChordQuality(String),

    #[error("Invalid oscillator reference")]
    InvalidOscillator,

    #[error("Second argument must be a beat or sequence cell")]
    InvalidTrigger,

    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    #[error("Cell reference out of bounds (exceeds grid size): {0}")]
    OutOfBounds(CellRef),

    #[error("Circular reference detected at {0}")]
    CircularReference(CellRef),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid arithmetic operand: {0}")]
    InvalidOperand(String),

    #[error("Malformed expression: {0}")]
    MalformedExpression(String),

    #[error("Maximum recursion depth exceeded")]
    MaxRecursionDepth,

    /// An operand that is itself an error value; keeps the upstream message.
    #[error("{}", .0.message)]
    Referenced(CellError),

    #[error("{0}")]
    External(String),
}

impl EvalError {
    pub fn arity(message: impl Into<String>) -> EvalError {
        EvalError::Arity(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::EmptyFormula
            | EvalError::Arity(_)
            | EvalError::InvalidRange(_)
            | EvalError::InvalidMode(_)
            | EvalError::InvalidNoteName(_)
            | EvalError::InvalidChordQuality(_)
            | EvalError::InvalidOscillator
            | EvalError::InvalidTrigger
            | EvalError::MalformedExpression(_) => ErrorKind::Parse,
            EvalError::InvalidAddress(_)
            | EvalError::OutOfBounds(_)
            | EvalError::CircularReference(_) => ErrorKind::Reference,
            EvalError::DivisionByZero | EvalError::InvalidOperand(_) => ErrorKind::Arithmetic,
            EvalError::MaxRecursionDepth => ErrorKind::RecursionLimit,
            EvalError::Referenced(upstream) => upstream.kind,
            EvalError::External(_) => ErrorKind::External,
        }
    }
}

/// The error value stored in a cell whose formula failed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CellError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> CellError {
        CellError {
            kind,
            message: message.into(),
        }
    }
}

impl From<EvalError> for CellError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Referenced(upstream) => upstream,
            other => CellError::new(other.kind(), other.to_string()),
        }
    }
}
