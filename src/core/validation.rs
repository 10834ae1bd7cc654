//! Column validation rules
//!
//! Values are untyped at rest, so validation is where a column's type and
//! rules are checked against what is actually stored.

use crate::core::formula::functions::parse_date;
use crate::types::{CellValue, Column, ColumnType};
use regex::Regex;
use thiserror::Error;

/// A single rule violation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    #[error("value is required")]
    Required,

    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("{actual} is below the minimum {min}")]
    BelowMin { min: f64, actual: f64 },

    #[error("{actual} is above the maximum {max}")]
    AboveMax { max: f64, actual: f64 },

    #[error("'{value}' does not match pattern '{pattern}'")]
    PatternMismatch { pattern: String, value: String },

    #[error("invalid pattern '{0}'")]
    InvalidPattern(String),

    #[error("'{0}' is not one of the column options")]
    UnknownOption(String),

    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),

    #[error("'{0}' is not a valid URL")]
    InvalidUrl(String),

    #[error("'{0}' is not a valid phone number")]
    InvalidPhone(String),

    #[error("'{0}' is not a valid date")]
    InvalidDate(String),

    #[error("'{0}' is not a valid time")]
    InvalidTime(String),
}

/// Check a stored value against its column. Empty values only fail the
/// `required` rule.
pub fn validate_value(column: &Column, value: &CellValue) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if value.is_empty() {
        if column.validation.required {
            issues.push(ValidationIssue::Required);
        }
        return issues;
    }

    let text = value.as_text();
    check_type(column, value, &text, &mut issues);

    if column.column_type.is_numeric() {
        if let Some(actual) = value.as_number() {
            if let Some(min) = column.validation.min {
                if actual < min {
                    issues.push(ValidationIssue::BelowMin { min, actual });
                }
            }
            if let Some(max) = column.validation.max {
                if actual > max {
                    issues.push(ValidationIssue::AboveMax { max, actual });
                }
            }
        }
    }

    if let Some(pattern) = &column.validation.pattern {
        match Regex::new(pattern) {
            Ok(re) if re.is_match(&text) => {}
            Ok(_) => issues.push(ValidationIssue::PatternMismatch {
                pattern: pattern.clone(),
                value: text.clone(),
            }),
            Err(_) => issues.push(ValidationIssue::InvalidPattern(pattern.clone())),
        }
    }

    issues
}

fn check_type(column: &Column, value: &CellValue, text: &str, issues: &mut Vec<ValidationIssue>) {
    match column.column_type {
        ColumnType::Number | ColumnType::Currency => {
            if value.as_number().is_none() {
                issues.push(ValidationIssue::NotANumber(text.to_string()));
            }
        }
        ColumnType::Select => {
            if !column.options.is_empty() && !column.options.iter().any(|o| o == text) {
                issues.push(ValidationIssue::UnknownOption(text.to_string()));
            }
        }
        ColumnType::MultiSelect => {
            if !column.options.is_empty() {
                let selected: Vec<String> = match value {
                    CellValue::List(items) => items.clone(),
                    _ => text.split(',').map(|s| s.trim().to_string()).collect(),
                };
                for item in selected {
                    if !column.options.contains(&item) {
                        issues.push(ValidationIssue::UnknownOption(item));
                    }
                }
            }
        }
        ColumnType::Email => {
            if !is_email(text) {
                issues.push(ValidationIssue::InvalidEmail(text.to_string()));
            }
        }
        ColumnType::Url => {
            if !is_url(text) {
                issues.push(ValidationIssue::InvalidUrl(text.to_string()));
            }
        }
        ColumnType::Phone => {
            if !is_phone(text) {
                issues.push(ValidationIssue::InvalidPhone(text.to_string()));
            }
        }
        ColumnType::Date | ColumnType::Datetime => {
            if parse_date(text).is_none() {
                issues.push(ValidationIssue::InvalidDate(text.to_string()));
            }
        }
        ColumnType::Time => {
            if !is_clock(text) {
                issues.push(ValidationIssue::InvalidTime(text.to_string()));
            }
        }
        ColumnType::Text
        | ColumnType::Checkbox
        | ColumnType::File
        | ColumnType::Formula
        | ColumnType::RichText => {}
    }
}

fn is_email(text: &str) -> bool {
    match text.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !text.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn is_url(text: &str) -> bool {
    ["http://", "https://", "ftp://"]
        .iter()
        .find_map(|scheme| text.strip_prefix(scheme))
        .is_some_and(|rest| !rest.is_empty() && !rest.chars().any(char::is_whitespace))
}

fn is_phone(text: &str) -> bool {
    let digits = text.chars().filter(|c| c.is_ascii_digit()).count();
    digits >= 3
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'))
}

fn is_clock(text: &str) -> bool {
    let mut parts = text.split(':');
    let (Some(h), Some(m)) = (parts.next(), parts.next()) else {
        return false;
    };
    let s = parts.next();
    if parts.next().is_some() {
        return false;
    }
    let in_range = |part: &str, max: u32| {
        !part.is_empty()
            && part.len() <= 2
            && part.parse::<u32>().is_ok_and(|v| v <= max)
    };
    in_range(h, 23) && m.len() == 2 && in_range(m, 59) && s.map_or(true, |s| s.len() == 2 && in_range(s, 59))
}
