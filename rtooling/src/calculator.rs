//! Restricted arithmetic evaluator used by the `calculate` tool.
//!
//! Expressions are reduced textually: the innermost parenthesized group (optionally prefixed
//! by `sqrt`, `sin` or `cos`) is evaluated and substituted back, then the flat remainder is
//! reduced left to right in two passes, `*`/`/` first and `+`/`-` second. Intermediate
//! results are written back in shortest `%g` notation, so large or tiny intermediates take
//! exponent form exactly as the reducer sees them.
//!
//! ```rust
//! use rtooling::Calculator;
//!
//! let calculator = Calculator::new().expect("patterns compile");
//! assert_eq!(calculator.evaluate("(2 + 3) * 4").unwrap(), 20.0);
//! assert_eq!(calculator.evaluate("sqrt(16) + 1").unwrap(), 5.0);
//! ```

use regex::{Captures, Regex};

use crate::ToolError;

const NUMBER: &str = r"-?[0-9]+(?:\.[0-9]+)?";
const MAX_REDUCTIONS: usize = 512;

#[derive(Debug, Clone)]
pub struct Calculator {
    group: Regex,
    product: Regex,
    sum: Regex,
}

impl Calculator {
    pub fn new() -> Result<Self, ToolError> {
        Ok(Self {
            group: compile(r"(sqrt|sin|cos)?\(([^()]+)\)")?,
            product: compile(&format!("({NUMBER})([*/])({NUMBER})"))?,
            sum: compile(&format!("({NUMBER})([+-])({NUMBER})"))?,
        })
    }

    pub fn evaluate(&self, expression: &str) -> Result<f64, ToolError> {
        let mut expr: String = expression.chars().filter(|ch| !ch.is_whitespace()).collect();
        let mut budget = MAX_REDUCTIONS;

        while let Some(captures) = self.group.captures(&expr) {
            spend(&mut budget)?;
            let inner = self.evaluate_flat(&captures[2], &mut budget)?;
            let value = match captures.get(1).map(|function| function.as_str()) {
                Some("sqrt") => inner.sqrt(),
                Some("sin") => inner.sin(),
                Some("cos") => inner.cos(),
                _ => inner,
            };
            expr = substitute(&expr, &captures, value);
        }

        self.evaluate_flat(&expr, &mut budget)
    }

    fn evaluate_flat(&self, expr: &str, budget: &mut usize) -> Result<f64, ToolError> {
        let mut expr = expr.to_string();

        while let Some(captures) = self.product.captures(&expr) {
            spend(budget)?;
            let (left, right) = operands(&captures)?;
            let value = if &captures[2] == "*" {
                left * right
            } else {
                if right == 0.0 {
                    return Err(ToolError::division_by_zero());
                }
                left / right
            };
            expr = substitute(&expr, &captures, value);
        }

        while let Some(captures) = self.sum.captures(&expr) {
            spend(budget)?;
            let (left, right) = operands(&captures)?;
            let value = if &captures[2] == "+" {
                left + right
            } else {
                left - right
            };
            expr = substitute(&expr, &captures, value);
        }

        parse_number(&expr)
    }
}

/// Formats like Go's `%g` with shortest precision: exponent form when the decimal exponent
/// is below -4 or at least 6, with a signed two-digit minimum exponent.
pub fn format_general(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if value == 0.0 {
        return value.to_string();
    }

    let scientific = format!("{value:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return value.to_string();
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return value.to_string();
    };

    if exponent < -4 || exponent >= 6 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    } else {
        value.to_string()
    }
}

fn compile(pattern: &str) -> Result<Regex, ToolError> {
    Regex::new(pattern)
        .map_err(|error| ToolError::execution(format!("invalid calculator pattern: {error}")))
}

fn spend(budget: &mut usize) -> Result<(), ToolError> {
    *budget = budget
        .checked_sub(1)
        .ok_or_else(|| ToolError::invalid_expression("expression is too complex"))?;
    Ok(())
}

fn operands(captures: &Captures<'_>) -> Result<(f64, f64), ToolError> {
    Ok((parse_number(&captures[1])?, parse_number(&captures[3])?))
}

fn substitute(expr: &str, captures: &Captures<'_>, value: f64) -> String {
    let Some(range) = captures.get(0).map(|whole| whole.range()) else {
        return expr.to_string();
    };
    let mut next = String::with_capacity(expr.len());
    next.push_str(&expr[..range.start]);
    next.push_str(&format_general(value));
    next.push_str(&expr[range.end..]);
    next
}

fn parse_number(text: &str) -> Result<f64, ToolError> {
    text.parse::<f64>()
        .map_err(|_| ToolError::invalid_expression(format!("cannot evaluate '{text}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolErrorKind;

    fn eval(expression: &str) -> Result<f64, ToolError> {
        Calculator::new()
            .expect("patterns compile")
            .evaluate(expression)
    }

    #[test]
    fn evaluates_grouped_expressions_innermost_first() {
        assert_eq!(eval("(2+3)*4").expect("valid"), 20.0);
        assert_eq!(eval("((1 + 2) * (3 + 4)) / 7").expect("valid"), 3.0);
        assert_eq!(eval("2 * -3").expect("valid"), -6.0);
        assert_eq!(eval("  42 ").expect("valid"), 42.0);
    }

    #[test]
    fn multiplication_pass_runs_before_addition_pass() {
        assert_eq!(eval("2+3*4").expect("valid"), 14.0);
        assert_eq!(eval("10-4-3").expect("valid"), 3.0);
        assert_eq!(eval("8/2/2").expect("valid"), 2.0);
    }

    #[test]
    fn applies_unary_functions() {
        assert_eq!(eval("sqrt(16)").expect("valid"), 4.0);
        assert_eq!(eval("sqrt(9)+sqrt(16)").expect("valid"), 7.0);
        assert_eq!(eval("cos(0)").expect("valid"), 1.0);
        assert_eq!(eval("sin(0)*5").expect("valid"), 0.0);
        assert!(eval("sqrt(-1)").expect("nan is a value").is_nan());
    }

    #[test]
    fn division_by_zero_is_typed() {
        let error = eval("10/0").expect_err("must fail");
        assert_eq!(error.kind, ToolErrorKind::DivisionByZero);

        let error = eval("1/(2-2)").expect_err("must fail");
        assert_eq!(error.kind, ToolErrorKind::DivisionByZero);
    }

    #[test]
    fn unsupported_input_is_an_invalid_expression() {
        for expression in ["", "2^3", "abc", "()", "(1+2"] {
            let error = eval(expression).expect_err(expression);
            assert_eq!(error.kind, ToolErrorKind::InvalidExpression, "{expression}");
        }
    }

    #[test]
    fn general_format_matches_shortest_g_notation() {
        assert_eq!(format_general(20.0), "20");
        assert_eq!(format_general(2.5), "2.5");
        assert_eq!(format_general(-0.25), "-0.25");
        assert_eq!(format_general(123456.0), "123456");
        assert_eq!(format_general(1_000_000.0), "1e+06");
        assert_eq!(format_general(1_234_567.0), "1.234567e+06");
        assert_eq!(format_general(0.0001), "0.0001");
        assert_eq!(format_general(0.00001), "1e-05");
        assert_eq!(format_general(f64::INFINITY), "+Inf");
        assert_eq!(format_general(f64::NAN), "NaN");
    }
}
