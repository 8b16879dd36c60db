use super::Document;
use crate::error::{BeatsheetError, Result};
use crate::storage::{StoredSheet, read_sheet, write_markdown, write_sheet};
use beatsheet_engine::script::RhaiScriptHost;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const MAX_FUNCTION_FILE_BYTES: u64 = 1_048_576; // 1 MiB

fn read_functions_file(path: &Path) -> Result<String> {
    let meta = std::fs::metadata(path)?;
    if meta.len() > MAX_FUNCTION_FILE_BYTES {
        return Err(BeatsheetError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "Refusing to read {}: functions file too large ({} bytes, max {})",
                path.display(),
                meta.len(),
                MAX_FUNCTION_FILE_BYTES
            ),
        )));
    }
    Ok(std::fs::read_to_string(path)?)
}

impl Document {
    /// Load custom Rhai functions from a file (appends to existing functions)
    /// and re-evaluate. Returns the canonical path loaded.
    pub fn load_functions(&mut self, path: &Path) -> Result<PathBuf> {
        let path_buf = std::fs::canonicalize(path)?;
        let content = read_functions_file(&path_buf)?;

        if self.functions_files.contains(&path_buf) {
            // Already loaded: keep current compiled state unchanged.
            return Ok(path_buf);
        }

        let merged = match &self.custom_functions {
            Some(existing) => format!("{}\n\n{}", existing, content),
            None => content,
        };

        // Compile before committing so a bad file leaves the document as is.
        let host = RhaiScriptHost::with_functions(&merged).map_err(BeatsheetError::RhaiCompile)?;

        self.functions_files.push(path_buf.clone());
        self.custom_functions = Some(merged);
        self.sheet.set_script_host(Arc::new(host));
        self.recalculate();

        info!(path = %path_buf.display(), "loaded functions");
        Ok(path_buf)
    }

    /// Save to current file path.
    /// Returns the path saved to.
    pub fn save_file(&mut self) -> Result<PathBuf> {
        let Some(path) = self.file_path.clone() else {
            return Err(BeatsheetError::NoFilePath);
        };
        write_sheet(&path, &self.stored_sheet())?;
        self.modified = false;
        debug!(path = %path.display(), "saved");
        Ok(path)
    }

    /// Save to `path` and make it the current file path.
    pub fn save_as(&mut self, path: &Path) -> Result<PathBuf> {
        self.file_path = Some(path.to_path_buf());
        self.save_file()
    }

    /// Load from file. Tempo is applied before the grid is evaluated.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let stored = read_sheet(path)?;

        self.sheet.set_tempo(stored.global_tempo);
        self.sheet.replace_grid(stored.grid, true);

        self.file_path = Some(path.to_path_buf());
        self.modified = false;
        info!(
            path = %path.display(),
            rows = self.sheet.rows(),
            cols = self.sheet.cols(),
            "loaded sheet"
        );
        Ok(())
    }

    /// Export the evaluated grid as a markdown table.
    pub fn export_markdown(&self, path: &Path) -> Result<()> {
        write_markdown(path, self)?;
        Ok(())
    }

    fn stored_sheet(&self) -> StoredSheet {
        StoredSheet {
            grid: self.sheet.raw_grid().to_vec(),
            global_tempo: self.sheet.tempo(),
        }
    }
}
