//! Function semantics shared by both dispatch modes
//!
//! Aggregates read the raw stored values of every row; unparsable values
//! count as zero for SUM/AVERAGE/MAX/MIN.

use crate::types::{parse_number, Row};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::cmp::Ordering;

/// Column aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Average,
    Count,
    Max,
    Min,
}

impl Aggregate {
    /// Look up an aggregate by its function name (case-sensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SUM" => Some(Aggregate::Sum),
            "AVERAGE" | "AVG" => Some(Aggregate::Average),
            "COUNT" => Some(Aggregate::Count),
            "MAX" => Some(Aggregate::Max),
            "MIN" => Some(Aggregate::Min),
            _ => None,
        }
    }

    /// Apply the aggregate to one column across all rows
    pub fn apply(&self, column: &str, rows: &[Row]) -> f64 {
        let numbers = move || rows.iter().map(move |row| row.get(column).number_or_zero());
        match self {
            Aggregate::Sum => numbers().sum(),
            Aggregate::Average => {
                if rows.is_empty() {
                    0.0
                } else {
                    numbers().sum::<f64>() / rows.len() as f64
                }
            }
            Aggregate::Count => rows
                .iter()
                .filter(|row| !row.get(column).is_empty())
                .count() as f64,
            Aggregate::Max => numbers().reduce(f64::max).unwrap_or(0.0),
            Aggregate::Min => numbers().reduce(f64::min).unwrap_or(0.0),
        }
    }
}

/// Comparison operators accepted in IF conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" | "==" => Some(CompareOp::Eq),
            "!=" | "<>" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            ">" => Some(CompareOp::Gt),
            "<=" => Some(CompareOp::Le),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Loose comparison: numeric when both sides read as numbers, textual otherwise
pub fn compare_loose(left: &str, op: CompareOp, right: &str) -> bool {
    match (parse_number(left), parse_number(right)) {
        (Some(l), Some(r)) => match l.partial_cmp(&r) {
            Some(ordering) => op.holds(ordering),
            None => op == CompareOp::Ne,
        },
        _ => op.holds(left.cmp(right)),
    }
}

/// Find the comparison operator of an IF condition, outside quotes.
/// Two-character operators win over their one-character prefixes.
pub fn split_condition(condition: &str) -> Option<(&str, CompareOp, &str)> {
    let bytes = condition.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' | b'<' | b'=' | b'!' => {
                    let two = condition.get(i..i + 2).unwrap_or("");
                    let (symbol, width) = match CompareOp::from_symbol(two) {
                        Some(_) => (two, 2),
                        None => (&condition[i..i + 1], 1),
                    };
                    let op = CompareOp::from_symbol(symbol)?;
                    return Some((&condition[..i], op, &condition[i + width..]));
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Split a function argument list on top-level commas, respecting quotes
/// and nested parentheses
pub fn split_arguments(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in args.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth -= 1,
                ',' if depth == 0 => {
                    parts.push(args[start..i].trim());
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(args[start..].trim());
    parts
}

/// Remove one pair of surrounding quotes, if present
pub fn strip_quotes(text: &str) -> &str {
    let text = text.trim();
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

/// Parse the calendar-date forms accepted by DATEDIFF
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y/%m/%d %H:%M"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(datetime.date());
        }
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|datetime| datetime.date_naive())
}

/// Absolute whole-day difference, zero when either side is not a date
pub fn date_diff(first: &str, second: &str) -> f64 {
    match (parse_date(first), parse_date(second)) {
        (Some(a), Some(b)) => (a - b).num_days().abs() as f64,
        _ => 0.0,
    }
}
