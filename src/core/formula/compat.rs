//! Fixed-priority formula dispatch
//!
//! The formula text is tested by substring containment, in this order:
//! SUM, AVERAGE/AVG, COUNT, MAX/MIN, IF, CONCATENATE/CONCAT, DATEDIFF, and
//! finally column substitution followed by arithmetic. The first matching
//! form decides the result, so `IF(SUM(x)>0, ...)` is a SUM.

use super::evaluator::{evaluate_arithmetic, EvalError, RowContext};
use super::functions::{
    compare_loose, date_diff, split_arguments, split_condition, strip_quotes, Aggregate,
};
use super::parser::parse_formula;
use super::FormulaResult;
use crate::types::{format_number, parse_number};
use regex::Regex;
use std::sync::{Mutex, OnceLock, PoisonError};

/// Characters allowed in a formula once every column has been substituted
const ARITHMETIC_PATTERN: &str = r"^[0-9+\-*/().\s]+$";

static ARITHMETIC: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

/// Last compiled column-name pattern, keyed by its source
static COLUMN_PATTERN: Mutex<Option<(String, Regex)>> = Mutex::new(None);

/// Evaluate a formula whose `=` prefix is already removed and whose
/// `TODAY()` calls are already replaced
pub(super) fn dispatch(body: &str, ctx: &RowContext<'_>) -> Result<FormulaResult, EvalError> {
    if body.contains("SUM(") {
        return aggregate(body, "SUM", Aggregate::Sum, ctx);
    }
    if body.contains("AVERAGE(") {
        return aggregate(body, "AVERAGE", Aggregate::Average, ctx);
    }
    if body.contains("AVG(") {
        return aggregate(body, "AVG", Aggregate::Average, ctx);
    }
    if body.contains("COUNT(") {
        return aggregate(body, "COUNT", Aggregate::Count, ctx);
    }
    if body.contains("MAX(") {
        return aggregate(body, "MAX", Aggregate::Max, ctx);
    }
    if body.contains("MIN(") {
        return aggregate(body, "MIN", Aggregate::Min, ctx);
    }
    if body.contains("IF(") {
        return conditional(body, ctx);
    }
    if body.contains("CONCATENATE(") {
        return concatenate(body, "CONCATENATE", ctx);
    }
    if body.contains("CONCAT(") {
        return concatenate(body, "CONCAT", ctx);
    }
    if body.contains("DATEDIFF(") {
        return datediff(body, ctx);
    }
    if let Some(literal) = single_literal(body) {
        return Ok(FormulaResult::Text(literal.to_string()));
    }
    arithmetic(body, ctx)
}

/// Text between `NAME(` and its matching `)`
fn call_arguments<'a>(body: &'a str, name: &str) -> Result<&'a str, EvalError> {
    let open = format!("{}(", name);
    let start = body
        .find(&open)
        .map(|i| i + open.len())
        .ok_or_else(|| EvalError::new(format!("{} call not found", name)))?;

    let mut depth = 1;
    let mut quote: Option<char> = None;
    for (offset, c) in body[start..].char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(&body[start..start + offset]);
                    }
                }
                _ => {}
            },
        }
    }
    Err(EvalError::new(format!("Unclosed {} call", name)))
}

fn aggregate(
    body: &str,
    name: &str,
    kind: Aggregate,
    ctx: &RowContext<'_>,
) -> Result<FormulaResult, EvalError> {
    let column = strip_brackets(strip_quotes(call_arguments(body, name)?));
    if !ctx.has_column(column) {
        return Err(EvalError::new(format!("{}: unknown column '{}'", name, column)));
    }
    Ok(FormulaResult::Number(kind.apply(column, ctx.all_rows)))
}

fn conditional(body: &str, ctx: &RowContext<'_>) -> Result<FormulaResult, EvalError> {
    let args = split_arguments(call_arguments(body, "IF")?);
    let [condition, when_true, when_false] = args.as_slice() else {
        return Err(EvalError::new(format!(
            "IF expects 3 arguments, got {}",
            args.len()
        )));
    };

    let (left, op, right) = split_condition(condition)
        .ok_or_else(|| EvalError::new(format!("IF: no comparison in '{}'", condition)))?;
    let left = resolve_operand(left.trim(), ctx);
    let right = resolve_operand(right.trim(), ctx);

    let branch = if compare_loose(&left, op, &right) {
        when_true
    } else {
        when_false
    };
    let branch = strip_quotes(branch);
    Ok(match parse_number(branch) {
        Some(n) => FormulaResult::Number(n),
        None => FormulaResult::Text(branch.to_string()),
    })
}

fn concatenate(body: &str, name: &str, ctx: &RowContext<'_>) -> Result<FormulaResult, EvalError> {
    let joined: String = split_arguments(call_arguments(body, name)?)
        .into_iter()
        .map(|arg| resolve_operand(arg, ctx))
        .collect();
    Ok(FormulaResult::Text(joined))
}

fn datediff(body: &str, ctx: &RowContext<'_>) -> Result<FormulaResult, EvalError> {
    let args = split_arguments(call_arguments(body, "DATEDIFF")?);
    let [first, second] = args.as_slice() else {
        return Err(EvalError::new(format!(
            "DATEDIFF expects 2 arguments, got {}",
            args.len()
        )));
    };
    let first = resolve_operand(first, ctx);
    let second = resolve_operand(second, ctx);
    Ok(FormulaResult::Number(date_diff(&first, &second)))
}

/// A column name reads the current row; anything else is a literal
fn resolve_operand(operand: &str, ctx: &RowContext<'_>) -> String {
    let name = strip_brackets(operand);
    if ctx.has_column(name) {
        ctx.current_row.get(name).as_text()
    } else {
        strip_quotes(operand).to_string()
    }
}

fn strip_brackets(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .map(str::trim)
        .unwrap_or(text)
}

fn single_literal(body: &str) -> Option<&str> {
    let trimmed = body.trim();
    let quoted = trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')));
    let inner = trimmed.get(1..trimmed.len().saturating_sub(1))?;
    (quoted && !inner.contains(['"', '\''])).then_some(inner)
}

/// Replace every column name with the current row's value, then evaluate
/// the remaining text only if it is plain arithmetic
fn arithmetic(body: &str, ctx: &RowContext<'_>) -> Result<FormulaResult, EvalError> {
    let substituted = substitute_columns(body, ctx)?;

    let allowed = ARITHMETIC
        .get_or_init(|| Regex::new(ARITHMETIC_PATTERN))
        .as_ref()
        .map_err(|e| EvalError::new(format!("Regex error: {}", e)))?;
    if !allowed.is_match(&substituted) {
        return Err(EvalError::new(format!(
            "Disallowed characters in '{}'",
            substituted
        )));
    }

    let expr = parse_formula(&substituted).map_err(|e| EvalError::new(e.message))?;
    evaluate_arithmetic(&expr).map(FormulaResult::Number)
}

fn substitute_columns(body: &str, ctx: &RowContext<'_>) -> Result<String, EvalError> {
    let mut names: Vec<&str> = ctx
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() {
        return Ok(body.to_string());
    }
    // Longest first so "Column 10" is not read as "Column 1" followed by "0"
    names.sort_by_key(|name| std::cmp::Reverse(name.chars().count()));

    let alternatives: Vec<String> = names.iter().map(|name| bounded(name)).collect();
    let pattern = column_pattern(alternatives.join("|"))?;

    Ok(pattern
        .replace_all(body, |caps: &regex::Captures<'_>| {
            let value = ctx.current_row.get(&caps[0]);
            if value.is_empty() {
                "0".to_string()
            } else {
                match value.as_number() {
                    Some(n) => format_number(n),
                    None => value.as_text(),
                }
            }
        })
        .into_owned())
}

fn column_pattern(source: String) -> Result<Regex, EvalError> {
    let mut cached = COLUMN_PATTERN
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some((key, regex)) = cached.as_ref() {
        if *key == source {
            return Ok(regex.clone());
        }
    }
    let regex =
        Regex::new(&source).map_err(|e| EvalError::new(format!("Regex error: {}", e)))?;
    *cached = Some((source, regex.clone()));
    Ok(regex)
}

/// Word-boundary pattern for a column name; boundaries only apply to edges
/// that are word characters
fn bounded(name: &str) -> String {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let mut pattern = String::new();
    if is_word(name.chars().next()) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(name));
    if is_word(name.chars().last()) {
        pattern.push_str(r"\b");
    }
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Column, ColumnType, Row};

    fn columns() -> Vec<Column> {
        vec![
            Column::new("qty", ColumnType::Number),
            Column::new("price", ColumnType::Number),
            Column::new("Column 1", ColumnType::Number),
            Column::new("Column 10", ColumnType::Number),
            Column::new("status", ColumnType::Text),
        ]
    }

    fn run(body: &str, row: &Row, rows: &[Row]) -> Result<FormulaResult, EvalError> {
        let columns = columns();
        let ctx = RowContext {
            current_row: row,
            all_rows: rows,
            columns: &columns,
            today: "2026-10-19",
        };
        dispatch(body, &ctx)
    }

    #[test]
    fn test_call_arguments_nested() {
        assert_eq!(call_arguments("IF(f(a), b, c)", "IF").unwrap(), "f(a), b, c");
        assert!(call_arguments("SUM(qty", "SUM").is_err());
    }

    #[test]
    fn test_sum_wins_over_if() {
        let rows = vec![Row::new("a").with("qty", 2.0), Row::new("b").with("qty", 3.0)];
        let result = run("IF(SUM(qty)>0,\"pos\",\"neg\")", &rows[0], &rows).unwrap();
        assert_eq!(result, FormulaResult::Number(5.0));
    }

    #[test]
    fn test_if_column_vs_literal() {
        let row = Row::new("a").with("status", "done");
        let rows = vec![row.clone()];
        assert_eq!(
            run("IF(status==done, \"closed\", \"open\")", &row, &rows).unwrap(),
            FormulaResult::Text("closed".to_string())
        );
        assert_eq!(
            run("IF(status!=\"done\", 1, 0)", &row, &rows).unwrap(),
            FormulaResult::Number(0.0)
        );
    }

    #[test]
    fn test_arithmetic_substitution() {
        let row = Row::new("a")
            .with("qty", 4.0)
            .with("price", "2.5")
            .with("Column 1", 1.0)
            .with("Column 10", 10.0);
        let rows = vec![row.clone()];
        assert_eq!(
            run("qty * price", &row, &rows).unwrap(),
            FormulaResult::Number(10.0)
        );
        assert_eq!(
            run("Column 10 - Column 1", &row, &rows).unwrap(),
            FormulaResult::Number(9.0)
        );
    }

    #[test]
    fn test_arithmetic_missing_value_is_zero() {
        let row = Row::new("a").with("qty", 4.0);
        let rows = vec![row.clone()];
        assert_eq!(
            run("qty + price", &row, &rows).unwrap(),
            FormulaResult::Number(4.0)
        );
    }

    #[test]
    fn test_arithmetic_rejects_text_and_code() {
        let row = Row::new("a").with("status", "open").with("qty", 1.0);
        let rows = vec![row.clone()];
        assert!(run("status * 2", &row, &rows).is_err());
        assert!(run("qty; drop()", &row, &rows).is_err());
        assert!(run("qty / 0", &row, &rows).is_err());
    }

    #[test]
    fn test_single_literal() {
        assert_eq!(single_literal(" \"2026-10-19\" "), Some("2026-10-19"));
        assert_eq!(single_literal("\"a\" + \"b\""), None);
        assert_eq!(single_literal("12"), None);
    }

    #[test]
    fn test_column_pattern_follows_column_list() {
        let row = Row::new("a").with("qty", 4.0).with("q", 100.0);
        let rows = vec![row.clone()];
        assert_eq!(
            run("qty * 2", &row, &rows).unwrap(),
            FormulaResult::Number(8.0)
        );

        // a different column list must not reuse the cached pattern
        let short = vec![Column::new("q", ColumnType::Number)];
        let ctx = RowContext {
            current_row: &row,
            all_rows: &rows,
            columns: &short,
            today: "2026-10-19",
        };
        assert_eq!(
            dispatch("q + 1", &ctx).unwrap(),
            FormulaResult::Number(101.0)
        );
        assert!(dispatch("qty + 1", &ctx).is_err());

        assert_eq!(
            run("qty + 1", &row, &rows).unwrap(),
            FormulaResult::Number(5.0)
        );
    }

    #[test]
    fn test_bounded_pattern() {
        assert_eq!(bounded("qty"), r"\bqty\b");
        assert_eq!(bounded("(x)"), r"\(x\)");
    }
}
