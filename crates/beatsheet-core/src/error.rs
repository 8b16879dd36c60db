//! Error types for Beatsheet core.

use thiserror::Error;

use beatsheet_engine::engine::EvalError;

/// Errors that can occur while editing, loading or saving a sheet
#[derive(Error, Debug)]
pub enum BeatsheetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No file path set")]
    NoFilePath,

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid tempo: {0}")]
    InvalidTempo(f64),

    #[error("{0}")]
    Reference(#[from] EvalError),

    #[error("Rhai compile error: {0}")]
    RhaiCompile(String),
}

pub type Result<T> = std::result::Result<T, BeatsheetError>;
