//! Markdown export functionality

use crate::document::Document;
use beatsheet_engine::engine::CellRef;
use std::fmt::Write as _;
use std::path::Path;

/// Write the evaluated grid to a markdown file
pub fn write_markdown(path: &Path, doc: &Document) -> std::io::Result<()> {
    std::fs::write(path, markdown_content(doc))
}

/// Render the evaluated grid as a markdown table, trimmed to the cells that
/// hold any raw text.
pub fn markdown_content(doc: &Document) -> String {
    let mut out = String::from("# Sheet\n\n");

    let Some((max_row, max_col)) = find_grid_bounds(doc) else {
        out.push_str("*Empty spreadsheet*\n");
        return out;
    };

    // Header with column letters
    out.push_str("|   |");
    for col in 0..=max_col {
        let _ = write!(out, " {} |", CellRef::column_label(col));
    }
    out.push('\n');

    out.push_str("|---|");
    for _ in 0..=max_col {
        out.push_str("---|");
    }
    out.push('\n');

    for row in 0..=max_row {
        let _ = write!(out, "| {} |", row + 1); // 1-based row numbers
        for col in 0..=max_col {
            let display = doc.display(&CellRef::new(row, col));
            let _ = write!(out, " {} |", escape_markdown(&display));
        }
        out.push('\n');
    }

    out
}

/// Last row and column holding raw text, if any.
fn find_grid_bounds(doc: &Document) -> Option<(usize, usize)> {
    let mut bounds: Option<(usize, usize)> = None;
    for (row, cells) in doc.sheet.raw_grid().iter().enumerate() {
        for (col, raw) in cells.iter().enumerate() {
            if raw.is_empty() {
                continue;
            }
            bounds = Some(match bounds {
                Some((r, c)) => (r.max(row), c.max(col)),
                None => (row, col),
            });
        }
    }
    bounds
}

/// Escape special markdown characters in cell content
fn escape_markdown(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ").replace('\r', "")
}
