//! beatsheet-core - UI-agnostic document model + storage.

pub mod document;
pub mod error;
pub mod storage;

pub use document::Document;
pub use error::{BeatsheetError, Result};

pub use beatsheet_engine::engine::{CellRef, CellValue};
