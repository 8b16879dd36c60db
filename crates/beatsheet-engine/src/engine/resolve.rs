//! Argument resolution.
//!
//! An argument string is classified, in this order, as:
//! 1. a cell reference (`^[A-Z]+\d+$`), resolved through the grid;
//! 2. a number containing a decimal point, parsed as a float;
//! 3. text whose leading numeric prefix is integral, parsed as an integer;
//! 4. a nested builtin call, evaluated one level deeper;
//! 5. anything else, a string literal with `"` removed.
//!
//! Rule 2 needs the decimal point, so `"-3"` only resolves through rule 3,
//! and `- 3` (how the tokenizer hands a negative literal to a builtin) is a
//! plain string.

use regex::Regex;
use std::sync::OnceLock;

use super::cell_ref::is_cell_reference;
use super::{CellRef, CellValue, EvalError, Sheet};
use crate::builtins::find_builtin;

fn float_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?")
            .expect("float prefix regex must compile")
    })
}

fn int_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[+-]?\d+").expect("int prefix regex must compile"))
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^(?<name>[A-Za-z]+)\s*\(.*\)$").expect("call regex must compile")
    })
}

/// Value of the longest numeric prefix of `text`, ignoring leading
/// whitespace (`"12abc"` is 12, `"abc"` has none).
pub fn parse_float_prefix(text: &str) -> Option<f64> {
    let m = float_prefix_re().find(text)?;
    m.as_str().trim().parse::<f64>().ok()
}

fn parse_int_prefix(text: &str) -> Option<f64> {
    let m = int_prefix_re().find(text)?;
    m.as_str().trim().parse::<f64>().ok()
}

/// Rule 2: the whole argument is a number and contains a decimal point.
pub(crate) fn parse_decimal(arg: &str) -> Option<f64> {
    if !arg.contains('.') {
        return None;
    }
    arg.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Rule 3: the leading numeric prefix is a whole number. The integer value
/// is read from the leading digits only, so `"1e3"` resolves to 1.
pub(crate) fn parse_integer(arg: &str) -> Option<f64> {
    let prefix = parse_float_prefix(arg)?;
    if !prefix.is_finite() || prefix.fract() != 0.0 {
        return None;
    }
    Some(parse_int_prefix(arg).unwrap_or(prefix))
}

/// Rule 4: `NAME ( ... )` where NAME is a builtin.
pub(crate) fn is_builtin_call(arg: &str) -> bool {
    call_re()
        .captures(arg)
        .is_some_and(|caps| find_builtin(&caps["name"]).is_some())
}

/// Strip every double quote, as for a string literal argument.
pub(crate) fn unquote(arg: &str) -> String {
    arg.replace('"', "")
}

impl Sheet {
    /// Resolve one argument of a builtin evaluated at handler `depth`.
    pub(crate) fn resolve_argument(
        &mut self,
        arg: &str,
        caller: CellRef,
        depth: usize,
    ) -> Result<CellValue, EvalError> {
        if is_cell_reference(arg) {
            return self.get_evaluated_cell_value_text(arg);
        }
        if let Some(n) = parse_decimal(arg) {
            return Ok(CellValue::Number(n));
        }
        if let Some(n) = parse_integer(arg) {
            return Ok(CellValue::Number(n));
        }
        if is_builtin_call(arg) {
            return self.evaluate_formula(arg, caller, depth);
        }
        Ok(CellValue::String(unquote(arg)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float_prefix("12abc"), Some(12.0));
        assert_eq!(parse_float_prefix("  -1.5x"), Some(-1.5));
        assert_eq!(parse_float_prefix(".5"), Some(0.5));
        assert_eq!(parse_float_prefix("2e3"), Some(2000.0));
        assert_eq!(parse_float_prefix("abc"), None);
        assert_eq!(parse_float_prefix("- 3"), None);
        assert_eq!(parse_float_prefix(""), None);
    }

    #[test]
    fn test_decimal_requires_point() {
        assert_eq!(parse_decimal("1.5"), Some(1.5));
        assert_eq!(parse_decimal("-0.25"), Some(-0.25));
        assert_eq!(parse_decimal("3"), None);
        assert_eq!(parse_decimal("1.2.3"), None);
        assert_eq!(parse_decimal("\"1.5\""), None);
    }

    #[test]
    fn test_integer_reads_leading_digits() {
        assert_eq!(parse_integer("440"), Some(440.0));
        assert_eq!(parse_integer("-3"), Some(-3.0));
        assert_eq!(parse_integer("12abc"), Some(12.0));
        assert_eq!(parse_integer("1e3"), Some(1.0));
        assert_eq!(parse_integer("1.5abc"), None);
        assert_eq!(parse_integer("- 3"), None);
        assert_eq!(parse_integer("sine"), None);
    }

    #[test]
    fn test_builtin_call_shape() {
        assert!(is_builtin_call("OSC ( \"sine\" , 440 , 0 , 1 )"));
        assert!(is_builtin_call("metronome ( )"));
        assert!(!is_builtin_call("foo ( 1 )"));
        assert!(!is_builtin_call("\"OSC(1)\""));
        assert!(!is_builtin_call("OSC"));
    }

    #[test]
    fn test_resolve_argument_classification() {
        let mut sheet = Sheet::new(2, 2);
        sheet.replace_grid(vec![vec!["5".into(), "=A1*2".into()]], true);
        let origin = CellRef::new(0, 0);

        assert_eq!(
            sheet.resolve_argument("B1", origin, 1),
            Ok(CellValue::Number(10.0))
        );
        assert_eq!(
            sheet.resolve_argument("A1", origin, 1),
            Ok(CellValue::String("5".into()))
        );
        assert_eq!(sheet.resolve_argument("0.5", origin, 1), Ok(CellValue::Number(0.5)));
        assert_eq!(sheet.resolve_argument("7", origin, 1), Ok(CellValue::Number(7.0)));
        assert_eq!(
            sheet.resolve_argument("\"sine\"", origin, 1),
            Ok(CellValue::String("sine".into()))
        );
        assert_eq!(
            sheet.resolve_argument("- 3", origin, 1),
            Ok(CellValue::String("- 3".into()))
        );
        assert_eq!(
            sheet.resolve_argument("C9", origin, 1),
            Err(EvalError::OutOfBounds(CellRef::new(8, 2)))
        );
    }
}
