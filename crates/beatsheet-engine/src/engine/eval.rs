//! Formula evaluation: builtin dispatch with an explicit nesting depth.
//!
//! `depth` counts nested builtin invocations inside one formula. A cell
//! formula starts at 0; each handler runs one level deeper than its caller,
//! and a nested call found while resolving an argument runs one level deeper
//! again. Following a cell reference starts that cell's formula back at 0.

use tracing::trace;

use super::tokenize::tokenize;
use super::{CellRef, CellValue, EvalError, Sheet};
use crate::builtins::{Call, find_builtin};

/// Deepest allowed builtin nesting within one formula.
pub const MAX_RECURSION_DEPTH: usize = 10;

impl Sheet {
    /// Evaluate a formula body (the text after `=`) on behalf of `caller`.
    pub(crate) fn evaluate_formula(
        &mut self,
        body: &str,
        caller: CellRef,
        depth: usize,
    ) -> Result<CellValue, EvalError> {
        let depth = depth + 1;
        if depth > MAX_RECURSION_DEPTH {
            return Err(EvalError::MaxRecursionDepth);
        }

        let tokens = tokenize(body);
        let Some(name) = tokens.first() else {
            return Err(EvalError::EmptyFormula);
        };

        match find_builtin(name) {
            Some(builtin) => {
                trace!(cell = %caller, builtin = builtin.name, depth, "dispatching builtin");
                let trimmed = body.trim_start();
                let source = trimmed.get(name.len()..).unwrap_or_default();
                let call = Call {
                    tokens: &tokens[1..],
                    source,
                    caller,
                    depth,
                };
                (builtin.handler)(self, &call)
            }
            None => self
                .evaluate_arithmetic(&tokens, caller, depth)
                .map(CellValue::Number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested_metronome(levels: usize) -> String {
        let mut formula = "METRONOME(90)".to_string();
        for _ in 1..levels {
            formula = format!("METRONOME({formula})");
        }
        formula
    }

    #[test]
    fn test_ten_levels_succeed() {
        let mut sheet = Sheet::new(1, 1);
        let value = sheet.evaluate_formula(&nested_metronome(10), CellRef::new(0, 0), 0);
        assert!(matches!(value, Ok(CellValue::Structured(_))), "{value:?}");
    }

    #[test]
    fn test_eleven_levels_fail() {
        let mut sheet = Sheet::new(1, 1);
        let value = sheet.evaluate_formula(&nested_metronome(11), CellRef::new(0, 0), 0);
        assert_eq!(value, Err(EvalError::MaxRecursionDepth));
    }

    #[test]
    fn test_empty_formula() {
        let mut sheet = Sheet::new(1, 1);
        assert_eq!(
            sheet.evaluate_formula("  ", CellRef::new(0, 0), 0),
            Err(EvalError::EmptyFormula)
        );
    }

    #[test]
    fn test_builtin_names_are_case_insensitive() {
        let mut sheet = Sheet::new(1, 1);
        let value = sheet.evaluate_formula("metronome()", CellRef::new(0, 0), 0);
        assert!(matches!(value, Ok(CellValue::Structured(_))));
    }
}
