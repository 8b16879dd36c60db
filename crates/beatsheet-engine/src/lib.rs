//! beatsheet-engine - formula evaluation for a music-oriented spreadsheet.

pub mod builtins;
pub mod engine;
pub mod music;
pub mod script;
