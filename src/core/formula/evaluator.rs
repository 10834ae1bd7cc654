//! Expression-tree evaluator
//!
//! Evaluates an [`Expr`] bottom-up against one row of a table. Column
//! references resolve to the current row's stored value; aggregates range
//! over every row.

use super::functions::{compare_loose, date_diff, Aggregate, CompareOp};
use super::parser::Expr;
use crate::types::{format_number, parse_number, CellValue, Column, Row};

/// Value type that can be returned from evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    Null,
}

impl Value {
    /// Numeric view; empty values count as zero
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) if s.trim().is_empty() => Some(0.0),
            Value::Text(s) => parse_number(s),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Null => Some(0.0),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Null => String::new(),
        }
    }

    /// Truthiness of an IF condition that is not a comparison
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => !s.is_empty() && !s.eq_ignore_ascii_case("false"),
            Value::Null => false,
        }
    }
}

impl From<&CellValue> for Value {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Null => Value::Null,
            CellValue::Bool(b) => Value::Boolean(*b),
            CellValue::Number(n) => Value::Number(*n),
            CellValue::Text(s) => Value::Text(s.clone()),
            CellValue::List(_) => Value::Text(value.as_text()),
        }
    }
}

/// The row being evaluated plus the table it belongs to
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub current_row: &'a Row,
    pub all_rows: &'a [Row],
    pub columns: &'a [Column],
    /// Today's date as `YYYY-MM-DD`
    pub today: &'a str,
}

impl<'a> RowContext<'a> {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

/// Error during evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Eval error: {}", self.message)
    }
}

impl std::error::Error for EvalError {}

/// Evaluate an expression in the given row context
pub fn evaluate(expr: &Expr, ctx: &RowContext<'_>) -> Result<Value, EvalError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),

        Expr::Text(s) => Ok(Value::Text(s.clone())),

        Expr::Column(name) => Ok(resolve_column(name, ctx)),

        Expr::FunctionCall { name, args } => evaluate_function(name, args, ctx),

        Expr::BinaryOp { op, left, right } => {
            let left_val = evaluate(left, ctx)?;
            let right_val = evaluate(right, ctx)?;
            evaluate_binary_op(op, &left_val, &right_val)
        }

        Expr::UnaryOp { op, operand } => {
            let n = number_operand(&evaluate(operand, ctx)?)?;
            match op.as_str() {
                "-" => Ok(Value::Number(-n)),
                "+" => Ok(Value::Number(n)),
                _ => Err(EvalError::new(format!("Unknown unary operator: {}", op))),
            }
        }
    }
}

/// A known column reads the current row; anything else is its own literal text
fn resolve_column(name: &str, ctx: &RowContext<'_>) -> Value {
    if ctx.has_column(name) {
        return Value::from(ctx.current_row.get(name));
    }
    match name {
        "TRUE" => Value::Boolean(true),
        "FALSE" => Value::Boolean(false),
        _ => Value::Text(name.to_string()),
    }
}

fn number_operand(value: &Value) -> Result<f64, EvalError> {
    value
        .as_number()
        .ok_or_else(|| EvalError::new(format!("'{}' is not a number", value.as_text())))
}

fn evaluate_binary_op(op: &str, left: &Value, right: &Value) -> Result<Value, EvalError> {
    if let Some(compare) = CompareOp::from_symbol(op) {
        return Ok(Value::Boolean(compare_loose(
            &left.as_text(),
            compare,
            &right.as_text(),
        )));
    }

    let l = number_operand(left)?;
    let r = number_operand(right)?;
    let result = match op {
        "+" => l + r,
        "-" => l - r,
        "*" => l * r,
        "/" => {
            if r == 0.0 {
                return Err(EvalError::new("Division by zero"));
            }
            l / r
        }
        "^" => l.powf(r),
        _ => return Err(EvalError::new(format!("Unknown operator: {}", op))),
    };

    if result.is_finite() {
        Ok(Value::Number(result))
    } else {
        Err(EvalError::new("Result is not a finite number"))
    }
}

fn evaluate_function(name: &str, args: &[Expr], ctx: &RowContext<'_>) -> Result<Value, EvalError> {
    if let Some(aggregate) = Aggregate::from_name(name) {
        require_args(name, args, 1)?;
        let column = aggregate_column(&args[0], ctx)?;
        return Ok(Value::Number(aggregate.apply(&column, ctx.all_rows)));
    }

    match name {
        "IF" => {
            if args.len() != 2 && args.len() != 3 {
                return Err(EvalError::new(format!(
                    "IF expects 2 or 3 arguments, got {}",
                    args.len()
                )));
            }
            let branch = if evaluate(&args[0], ctx)?.is_truthy() {
                evaluate(&args[1], ctx)?
            } else if let Some(otherwise) = args.get(2) {
                evaluate(otherwise, ctx)?
            } else {
                Value::Boolean(false)
            };
            Ok(numeric_if_possible(branch))
        }

        "CONCATENATE" | "CONCAT" => {
            let mut joined = String::new();
            for arg in args {
                joined.push_str(&evaluate(arg, ctx)?.as_text());
            }
            Ok(Value::Text(joined))
        }

        "DATEDIFF" => {
            require_args(name, args, 2)?;
            let first = evaluate(&args[0], ctx)?.as_text();
            let second = evaluate(&args[1], ctx)?.as_text();
            Ok(Value::Number(date_diff(&first, &second)))
        }

        "TODAY" => {
            require_args(name, args, 0)?;
            Ok(Value::Text(ctx.today.to_string()))
        }

        _ => Err(EvalError::new(format!("Unknown function: {}", name))),
    }
}

/// Aggregates take a column name, bare, bracketed or quoted
fn aggregate_column(arg: &Expr, ctx: &RowContext<'_>) -> Result<String, EvalError> {
    match arg {
        Expr::Column(name) | Expr::Text(name) if ctx.has_column(name) => Ok(name.clone()),
        Expr::Column(name) | Expr::Text(name) => {
            Err(EvalError::new(format!("Unknown column: {}", name)))
        }
        _ => Err(EvalError::new("Aggregate argument must be a column")),
    }
}

fn numeric_if_possible(value: Value) -> Value {
    match value {
        Value::Text(s) => match parse_number(&s) {
            Some(n) => Value::Number(n),
            None => Value::Text(s),
        },
        other => other,
    }
}

fn require_args(name: &str, args: &[Expr], expected: usize) -> Result<(), EvalError> {
    if args.len() != expected {
        return Err(EvalError::new(format!(
            "{} expects {} argument(s), got {}",
            name,
            expected,
            args.len()
        )));
    }
    Ok(())
}

/// Evaluate a purely numeric expression (no column, no function)
pub fn evaluate_arithmetic(expr: &Expr) -> Result<f64, EvalError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::UnaryOp { op, operand } => {
            let n = evaluate_arithmetic(operand)?;
            match op.as_str() {
                "-" => Ok(-n),
                "+" => Ok(n),
                _ => Err(EvalError::new(format!("Unknown unary operator: {}", op))),
            }
        }
        Expr::BinaryOp { op, left, right } => {
            let l = Value::Number(evaluate_arithmetic(left)?);
            let r = Value::Number(evaluate_arithmetic(right)?);
            match evaluate_binary_op(op, &l, &r)? {
                Value::Number(n) => Ok(n),
                _ => Err(EvalError::new("Comparison is not arithmetic")),
            }
        }
        _ => Err(EvalError::new("Only numbers and operators are allowed")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::formula::parser::parse_formula;
    use crate::types::ColumnType;

    fn table() -> (Vec<Column>, Vec<Row>) {
        let columns = vec![
            Column::new("qty", ColumnType::Number),
            Column::new("Unit Price", ColumnType::Currency),
            Column::new("name", ColumnType::Text),
        ];
        let rows = vec![
            Row::new("r1")
                .with("qty", 15.0)
                .with("Unit Price", 2.5)
                .with("name", "bolt"),
            Row::new("r2").with("qty", 5.0).with("name", "nut"),
        ];
        (columns, rows)
    }

    fn eval(formula: &str, row: usize) -> Result<Value, EvalError> {
        let (columns, rows) = table();
        let ctx = RowContext {
            current_row: &rows[row],
            all_rows: &rows,
            columns: &columns,
            today: "2026-10-19",
        };
        let expr = parse_formula(formula).map_err(|e| EvalError::new(e.message))?;
        evaluate(&expr, &ctx)
    }

    #[test]
    fn test_arithmetic_with_columns() {
        assert_eq!(eval("qty * [Unit Price]", 0).unwrap(), Value::Number(37.5));
        // absent value counts as zero
        assert_eq!(eval("qty + [Unit Price]", 1).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn test_nested_if_sum() {
        assert_eq!(
            eval("IF(SUM(qty) > 10, \"many\", \"few\")", 1).unwrap(),
            Value::Text("many".to_string())
        );
    }

    #[test]
    fn test_if_numeric_branch() {
        assert_eq!(eval("IF(qty >= 10, \"1.5\", 0)", 0).unwrap(), Value::Number(1.5));
    }

    #[test]
    fn test_concatenate_and_literal_fallback() {
        assert_eq!(
            eval("CONCATENATE(name, \"-\", qty)", 0).unwrap(),
            Value::Text("bolt-15".to_string())
        );
    }

    #[test]
    fn test_today_and_datediff() {
        assert_eq!(
            eval("TODAY()", 0).unwrap(),
            Value::Text("2026-10-19".to_string())
        );
        assert_eq!(
            eval("DATEDIFF(TODAY(), \"2026-10-01\")", 0).unwrap(),
            Value::Number(18.0)
        );
    }

    #[test]
    fn test_errors() {
        assert!(eval("qty / 0", 0).is_err());
        assert!(eval("name * 2", 0).is_err());
        assert!(eval("SUM(missing)", 0).is_err());
        assert!(eval("SUM(qty + 1)", 0).is_err());
        assert!(eval("LOOKUP(qty)", 0).is_err());
    }

    #[test]
    fn test_evaluate_arithmetic_rejects_references() {
        let expr = parse_formula("(1 + 2) * 3").unwrap();
        assert_eq!(evaluate_arithmetic(&expr).unwrap(), 9.0);
        let expr = parse_formula("a + 1").unwrap();
        assert!(evaluate_arithmetic(&expr).is_err());
    }
}
