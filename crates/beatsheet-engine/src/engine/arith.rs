//! Arithmetic fallback for formulas that do not start with a builtin name.
//!
//! Two-stack operator precedence evaluation over `+ - * /`, left
//! associative, with parentheses for grouping and a prefix minus.

use super::cell_ref::is_cell_reference;
use super::resolve::parse_float_prefix;
use super::{CellRef, CellValue, EvalError, Sheet};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Open,
}

impl Op {
    fn binary(token: &str) -> Option<Op> {
        match token {
            "+" => Some(Op::Add),
            "-" => Some(Op::Sub),
            "*" => Some(Op::Mul),
            "/" => Some(Op::Div),
            _ => None,
        }
    }

    fn precedence(self) -> u8 {
        match self {
            Op::Open => 0,
            Op::Add | Op::Sub => 1,
            Op::Mul | Op::Div => 2,
            Op::Neg => 3,
        }
    }
}

fn apply(operands: &mut Vec<f64>, op: Op) -> Result<(), EvalError> {
    let missing = || EvalError::MalformedExpression("operator is missing an operand".to_string());

    if op == Op::Neg {
        let value = operands.pop().ok_or_else(missing)?;
        operands.push(-value);
        return Ok(());
    }

    let b = operands.pop().ok_or_else(missing)?;
    let a = operands.pop().ok_or_else(missing)?;
    let result = match op {
        Op::Add => a + b,
        Op::Sub => a - b,
        Op::Mul => a * b,
        Op::Div => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            a / b
        }
        Op::Neg | Op::Open => unreachable!("not a binary operator"),
    };
    operands.push(result);
    Ok(())
}

/// Numeric reading of an arithmetic operand.
fn operand_number(value: CellValue) -> Result<f64, EvalError> {
    match value {
        CellValue::Null => Ok(0.0),
        CellValue::Number(n) => Ok(n),
        CellValue::String(s) => {
            parse_float_prefix(&s).ok_or_else(|| EvalError::InvalidOperand(s))
        }
        CellValue::Error(upstream) => Err(EvalError::Referenced(upstream)),
        CellValue::Structured(cell) => {
            Err(EvalError::InvalidOperand(format!("<{}>", cell.type_name())))
        }
    }
}

impl Sheet {
    fn arithmetic_operand(
        &mut self,
        token: &str,
        caller: CellRef,
        depth: usize,
    ) -> Result<f64, EvalError> {
        let value = match self.resolve_argument(token, caller, depth)? {
            // A quoted address such as "A1" resolves to its text first.
            CellValue::String(s) if is_cell_reference(&s) => {
                self.get_evaluated_cell_value_text(&s)?
            }
            other => other,
        };
        operand_number(value)
    }

    pub(crate) fn evaluate_arithmetic(
        &mut self,
        tokens: &[String],
        caller: CellRef,
        depth: usize,
    ) -> Result<f64, EvalError> {
        if tokens.is_empty() {
            return Err(EvalError::EmptyFormula);
        }

        let mut operands: Vec<f64> = Vec::new();
        let mut operators: Vec<Op> = Vec::new();
        let mut expect_operand = true;

        for token in tokens {
            match token.as_str() {
                "(" if expect_operand => operators.push(Op::Open),
                "(" => {
                    return Err(EvalError::MalformedExpression(
                        "unexpected \"(\" after an operand".to_string(),
                    ));
                }
                ")" => {
                    if expect_operand {
                        return Err(EvalError::MalformedExpression(
                            "unexpected \")\"".to_string(),
                        ));
                    }
                    loop {
                        match operators.pop() {
                            Some(Op::Open) => break,
                            Some(op) => apply(&mut operands, op)?,
                            None => {
                                return Err(EvalError::MalformedExpression(
                                    "unbalanced \")\"".to_string(),
                                ));
                            }
                        }
                    }
                }
                "-" if expect_operand => operators.push(Op::Neg),
                "+" if expect_operand => {}
                text => {
                    if let Some(op) = Op::binary(text) {
                        if expect_operand {
                            return Err(EvalError::MalformedExpression(format!(
                                "operator \"{text}\" is missing its left operand"
                            )));
                        }
                        while let Some(&top) = operators.last() {
                            if top.precedence() < op.precedence() {
                                break;
                            }
                            operators.pop();
                            apply(&mut operands, top)?;
                        }
                        operators.push(op);
                        expect_operand = true;
                        continue;
                    }

                    if !expect_operand {
                        return Err(EvalError::MalformedExpression(format!(
                            "missing operator before \"{text}\""
                        )));
                    }
                    operands.push(self.arithmetic_operand(text, caller, depth)?);
                    expect_operand = false;
                    continue;
                }
            }
            expect_operand = token == "(" || token == "-" || token == "+";
        }

        if expect_operand {
            return Err(EvalError::MalformedExpression(
                "expression ends with an operator".to_string(),
            ));
        }
        while let Some(op) = operators.pop() {
            if op == Op::Open {
                return Err(EvalError::MalformedExpression("unbalanced \"(\"".to_string()));
            }
            apply(&mut operands, op)?;
        }

        match operands.as_slice() {
            [result] => Ok(*result),
            _ => Err(EvalError::MalformedExpression(
                "expression does not reduce to one value".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tokenize;

    fn eval(sheet: &mut Sheet, body: &str) -> Result<f64, EvalError> {
        sheet.evaluate_arithmetic(&tokenize(body), CellRef::new(0, 0), 1)
    }

    #[test]
    fn test_precedence_and_associativity() {
        let mut sheet = Sheet::new(1, 1);
        assert_eq!(eval(&mut sheet, "2+3*4"), Ok(14.0));
        assert_eq!(eval(&mut sheet, "10-4-3"), Ok(3.0));
        assert_eq!(eval(&mut sheet, "8/4/2"), Ok(1.0));
        assert_eq!(eval(&mut sheet, "1.5*2"), Ok(3.0));
    }

    #[test]
    fn test_grouping_and_negation() {
        let mut sheet = Sheet::new(1, 1);
        assert_eq!(eval(&mut sheet, "(2+3)*4"), Ok(20.0));
        assert_eq!(eval(&mut sheet, "-3+5"), Ok(2.0));
        assert_eq!(eval(&mut sheet, "2*-3"), Ok(-6.0));
        assert_eq!(eval(&mut sheet, "-(1+1)"), Ok(-2.0));
    }

    #[test]
    fn test_division_by_zero() {
        let mut sheet = Sheet::new(1, 1);
        assert_eq!(eval(&mut sheet, "10/0"), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn test_malformed_expressions() {
        let mut sheet = Sheet::new(1, 1);
        for body in ["1+", "*2", "(1+2", "1+2)", "1 2", "()"] {
            assert!(
                matches!(eval(&mut sheet, body), Err(EvalError::MalformedExpression(_))),
                "{body}"
            );
        }
        assert_eq!(eval(&mut sheet, ""), Err(EvalError::EmptyFormula));
    }

    #[test]
    fn test_operands_from_cells() {
        let mut sheet = Sheet::new(1, 4);
        sheet.replace_grid(
            vec![vec!["".into(), "12abc".into(), "x".into(), "=OSC(\"sine\", 1, 0, 1)".into()]],
            true,
        );
        assert_eq!(eval(&mut sheet, "A1+1"), Ok(1.0));
        assert_eq!(eval(&mut sheet, "B1*2"), Ok(24.0));
        assert_eq!(eval(&mut sheet, "\"B1\"+1"), Ok(13.0));
        assert_eq!(
            eval(&mut sheet, "C1+1"),
            Err(EvalError::InvalidOperand("x".into()))
        );
        assert_eq!(
            eval(&mut sheet, "D1+1"),
            Err(EvalError::InvalidOperand("<oscillator>".into()))
        );
    }

    #[test]
    fn test_error_operand_propagates_upstream_message() {
        let mut sheet = Sheet::new(1, 2);
        sheet.replace_grid(vec![vec!["=1/0".into(), "=A1+1".into()]], true);
        let err = eval(&mut sheet, "A1+1").unwrap_err();
        assert_eq!(err.to_string(), "Division by zero");
    }
}
