//! Formula evaluation for formula columns
//!
//! A formula is evaluated against one row and the full row collection. The
//! evaluator never fails: every error path yields the configured error
//! marker.
//!
//! # Example
//!
//! ```
//! use gridforge::core::formula::{FormulaEvaluator, FormulaResult};
//! use gridforge::types::{Column, ColumnType, Row};
//!
//! let columns = vec![Column::new("qty", ColumnType::Number)];
//! let rows = vec![Row::new("a").with("qty", 15.0), Row::new("b").with("qty", 5.0)];
//!
//! let evaluator = FormulaEvaluator::default();
//! let result = evaluator.evaluate("=IF(qty>10,\"big\",\"small\")", &rows[0], &rows, &columns);
//! assert_eq!(result, FormulaResult::Text("big".to_string()));
//! ```

mod compat;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod tokenizer;

use crate::config::{FormulaConfig, FormulaMode};
use crate::types::{format_number, CellValue, Column, Row};
use chrono::{Local, NaiveDate};
use evaluator::{evaluate, EvalError, RowContext, Value};
use std::fmt;
use tracing::debug;

/// Outcome of evaluating a formula
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaResult {
    Number(f64),
    Text(String),
    /// The error marker configured for the call site
    Error(String),
}

impl FormulaResult {
    pub fn is_error(&self) -> bool {
        matches!(self, FormulaResult::Error(_))
    }

    /// Convert to a cell value; errors become their marker text
    pub fn to_cell_value(&self) -> CellValue {
        match self {
            FormulaResult::Number(n) => CellValue::Number(*n),
            FormulaResult::Text(s) | FormulaResult::Error(s) => CellValue::Text(s.clone()),
        }
    }
}

impl fmt::Display for FormulaResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaResult::Number(n) => write!(f, "{}", format_number(*n)),
            FormulaResult::Text(s) | FormulaResult::Error(s) => write!(f, "{}", s),
        }
    }
}

/// Evaluates formula text against table rows
#[derive(Debug, Clone)]
pub struct FormulaEvaluator {
    mode: FormulaMode,
    error_marker: String,
    /// Fixed "today" for reproducible results; the local date when unset
    today: Option<NaiveDate>,
}

impl Default for FormulaEvaluator {
    fn default() -> Self {
        Self::new(&FormulaConfig::default())
    }
}

impl FormulaEvaluator {
    pub fn new(config: &FormulaConfig) -> Self {
        Self {
            mode: config.mode,
            error_marker: config.error_marker.clone(),
            today: None,
        }
    }

    pub fn with_mode(mut self, mode: FormulaMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_error_marker(mut self, marker: impl Into<String>) -> Self {
        self.error_marker = marker.into();
        self
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn mode(&self) -> FormulaMode {
        self.mode
    }

    pub fn error_marker(&self) -> &str {
        &self.error_marker
    }

    fn today_iso(&self) -> String {
        self.today
            .unwrap_or_else(|| Local::now().date_naive())
            .format("%Y-%m-%d")
            .to_string()
    }

    /// Evaluate `formula` for `current_row`. Never fails: errors come back as
    /// [`FormulaResult::Error`] carrying the error marker.
    pub fn evaluate(
        &self,
        formula: &str,
        current_row: &Row,
        all_rows: &[Row],
        columns: &[Column],
    ) -> FormulaResult {
        let today = self.today_iso();
        let ctx = RowContext {
            current_row,
            all_rows,
            columns,
            today: &today,
        };

        let outcome = match self.mode {
            FormulaMode::Compatibility => {
                let body = formula.trim();
                let body = body.strip_prefix('=').unwrap_or(body);
                let body = body.replace("TODAY()", &format!("\"{}\"", today));
                compat::dispatch(&body, &ctx)
            }
            FormulaMode::Structured => evaluate_structured(formula, &ctx),
        };

        match outcome {
            Ok(FormulaResult::Number(n)) if !n.is_finite() => {
                debug!(formula, row = %current_row.id, "formula produced a non-finite number");
                FormulaResult::Error(self.error_marker.clone())
            }
            Ok(result) => result,
            Err(e) => {
                debug!(formula, row = %current_row.id, error = %e, "formula evaluation failed");
                FormulaResult::Error(self.error_marker.clone())
            }
        }
    }
}

fn evaluate_structured(formula: &str, ctx: &RowContext<'_>) -> Result<FormulaResult, EvalError> {
    let expr = parser::parse_formula(formula).map_err(|e| EvalError::new(e.to_string()))?;
    Ok(match evaluate(&expr, ctx)? {
        Value::Number(n) => FormulaResult::Number(n),
        other => FormulaResult::Text(other.as_text()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnType;

    fn fixed() -> FormulaEvaluator {
        FormulaEvaluator::default().with_today(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
    }

    #[test]
    fn test_today_in_both_modes() {
        let row = Row::new("a");
        for mode in [FormulaMode::Compatibility, FormulaMode::Structured] {
            let result = fixed().with_mode(mode).evaluate("=TODAY()", &row, &[], &[]);
            assert_eq!(result, FormulaResult::Text("2026-10-19".to_string()));
        }
    }

    #[test]
    fn test_custom_error_marker() {
        let columns = vec![Column::new("qty", ColumnType::Number)];
        let row = Row::new("a").with("qty", 1.0);
        let evaluator = fixed().with_error_marker("計算エラー");
        assert_eq!(
            evaluator.evaluate("=qty / 0", &row, &[], &columns),
            FormulaResult::Error("計算エラー".to_string())
        );
    }

    #[test]
    fn test_result_display_and_cell_value() {
        assert_eq!(FormulaResult::Number(4.0).to_string(), "4");
        assert_eq!(
            FormulaResult::Error("#ERROR".to_string()).to_cell_value(),
            CellValue::Text("#ERROR".to_string())
        );
    }
}
