//! File formats: JSON sheets and Markdown export.

pub mod json;
pub mod md;

pub use json::{StoredSheet, parse_sheet, read_sheet, write_sheet};
pub use md::{markdown_content, write_markdown};
