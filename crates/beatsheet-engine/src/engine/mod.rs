//! Formula and grid evaluation engine.
//!
//! - [`CellRef`], [`CellRange`] - A1 addresses and ranges
//! - [`tokenize`], [`split_arguments`] - Formula tokenizer and argument splitter
//! - [`CellValue`], [`StructuredCell`] - Evaluated values
//! - [`TriggerBus`], [`Trigger`] - Publish/subscribe for beat and sequence cells
//! - [`Sheet`] - The grid: raw text, lazy memoized evaluation, passes
//! - [`format_value`] - Display strings

mod arith;
mod cell_ref;
mod error;
mod eval;
mod format;
mod range;
mod resolve;
mod sheet;
mod tokenize;
mod trigger;
pub mod value;

pub use cell_ref::{CellRef, is_cell_reference};
pub use error::{CellError, ErrorKind, EvalError};
pub use eval::MAX_RECURSION_DEPTH;
pub use format::{format_number, format_value, to_text};
pub use range::{CellRange, SequenceMode, parse_range};
pub use resolve::parse_float_prefix;
pub use sheet::{DEFAULT_TEMPO, EvalContext, MAX_SCRIPT_PASSES, Sheet};
pub use tokenize::{bare_tokens, split_arguments, tokenize};
pub use trigger::{Listener, Trigger, TriggerBus};
pub use value::{CellValue, StructuredCell};

pub(crate) use resolve::unquote;
