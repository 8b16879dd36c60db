//! JSON sheet format: `{ "grid": [[...]], "globalTempo": 120 }`.

use crate::error::{BeatsheetError, Result};
use beatsheet_engine::engine::DEFAULT_TEMPO;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_tempo() -> f64 {
    DEFAULT_TEMPO
}

/// Persisted form of a sheet: raw cell text plus the global tempo.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredSheet {
    pub grid: Vec<Vec<String>>,
    #[serde(rename = "globalTempo", default = "default_tempo")]
    pub global_tempo: f64,
}

/// Parse and validate a sheet from JSON text.
pub fn parse_sheet(content: &str) -> Result<StoredSheet> {
    let sheet: StoredSheet = serde_json::from_str(content)?;
    if sheet.grid.is_empty() {
        return Err(BeatsheetError::InvalidGrid("grid has no rows".to_string()));
    }
    if !sheet.global_tempo.is_finite() || sheet.global_tempo <= 0.0 {
        return Err(BeatsheetError::InvalidTempo(sheet.global_tempo));
    }
    Ok(sheet)
}

/// Read a sheet file.
pub fn read_sheet(path: &Path) -> Result<StoredSheet> {
    let content = fs::read_to_string(path)?;
    parse_sheet(&content)
}

/// Write a sheet file (pretty-printed, trailing newline).
pub fn write_sheet(path: &Path, sheet: &StoredSheet) -> Result<()> {
    let mut content = serde_json::to_string_pretty(sheet)?;
    content.push('\n');
    fs::write(path, content)?;
    Ok(())
}
