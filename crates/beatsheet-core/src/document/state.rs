use crate::error::Result;
use beatsheet_engine::engine::Sheet;
use beatsheet_engine::script::RhaiScriptHost;
use std::path::PathBuf;
use std::sync::Arc;

/// Rows of a new document.
pub const DEFAULT_ROWS: usize = 20;
/// Columns of a new document.
pub const DEFAULT_COLS: usize = 10;

/// UI-agnostic document state for the sheet.
///
/// Every edit is followed by one complete evaluation pass before the call
/// returns, so callers never observe a half-evaluated grid.
pub struct Document {
    /// Raw grid, evaluation state and playback context
    pub sheet: Sheet,
    /// Current file path
    pub file_path: Option<PathBuf>,
    /// Whether the grid has been modified since the last load or save
    pub modified: bool,
    /// Paths to custom Rhai functions files
    pub functions_files: Vec<PathBuf>,
    /// Custom functions script content (concatenated from all files)
    pub custom_functions: Option<String>,
}

impl Document {
    /// Create a new document state.
    ///
    /// This constructor is side-effect free: it does not touch the filesystem.
    pub fn new() -> Self {
        let mut sheet = Sheet::with_script_host(
            DEFAULT_ROWS,
            DEFAULT_COLS,
            Arc::new(RhaiScriptHost::new()),
        );
        sheet.evaluate_all_cells();

        Document {
            sheet,
            file_path: None,
            modified: false,
            functions_files: Vec::new(),
            custom_functions: None,
        }
    }

    /// Create a new document and load a file if provided.
    pub fn with_file(path: Option<PathBuf>, functions_files: Vec<PathBuf>) -> Result<Self> {
        let mut doc = Self::new();

        for func_path in &functions_files {
            doc.load_functions(func_path)?;
        }

        if let Some(p) = path {
            if p.exists() {
                doc.load_file(&p)?;
            } else {
                doc.file_path = Some(p);
                doc.modified = false;
            }
        }
        Ok(doc)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
