use serde::{Deserialize, Serialize};
use std::collections::HashMap;

//==============================================================================
// Cell Values
//==============================================================================

/// A value stored in a row. Untyped at rest: the owning column decides how it
/// is rendered, validated and fed to formulas.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    /// Multi-select values and file name lists
    List(Vec<String>),
}

impl CellValue {
    /// Null, empty text and empty lists count as empty
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::List(items) => items.is_empty(),
            CellValue::Bool(_) | CellValue::Number(_) => false,
        }
    }

    /// Stringify the value the way it is shown and compared
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
            CellValue::List(items) => items.join(","),
        }
    }

    /// Numeric view of the value, if it has one
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Number(_) => None,
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::Text(s) => parse_number(s),
            CellValue::Null | CellValue::List(_) => None,
        }
    }

    /// Numeric view with unparsable values counted as zero
    pub fn number_or_zero(&self) -> f64 {
        self.as_number().unwrap_or(0.0)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// Parse user-entered numeric text. Thousands separators and surrounding
/// whitespace are ignored.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Format a number without a trailing ".0" for integral values
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

//==============================================================================
// Columns
//==============================================================================

/// Closed set of column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    #[default]
    Text,
    Number,
    Date,
    Time,
    Datetime,
    Select,
    MultiSelect,
    Checkbox,
    Url,
    Email,
    Phone,
    File,
    Formula,
    RichText,
    Currency,
}

impl ColumnType {
    /// Get the type name as written in table documents
    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Number => "number",
            ColumnType::Date => "date",
            ColumnType::Time => "time",
            ColumnType::Datetime => "datetime",
            ColumnType::Select => "select",
            ColumnType::MultiSelect => "multi_select",
            ColumnType::Checkbox => "checkbox",
            ColumnType::Url => "url",
            ColumnType::Email => "email",
            ColumnType::Phone => "phone",
            ColumnType::File => "file",
            ColumnType::Formula => "formula",
            ColumnType::RichText => "rich_text",
            ColumnType::Currency => "currency",
        }
    }

    /// Types whose min/max validation compares numbers
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Number | ColumnType::Currency)
    }

    /// Display text for a stored value
    pub fn render(&self, value: &CellValue) -> String {
        match self {
            ColumnType::Checkbox => {
                let checked = match value {
                    CellValue::Bool(b) => *b,
                    CellValue::Number(n) => *n != 0.0,
                    CellValue::Text(s) => matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"),
                    CellValue::Null | CellValue::List(_) => false,
                };
                let mark = if checked { "✓" } else { "" };
                mark.to_string()
            }
            ColumnType::Currency => match value.as_number() {
                Some(n) => format_currency(n),
                None => value.as_text(),
            },
            ColumnType::MultiSelect | ColumnType::File => match value {
                CellValue::List(items) => items.join(", "),
                other => other.as_text(),
            },
            ColumnType::RichText => strip_markup(&value.as_text()),
            ColumnType::Text
            | ColumnType::Number
            | ColumnType::Date
            | ColumnType::Time
            | ColumnType::Datetime
            | ColumnType::Select
            | ColumnType::Url
            | ColumnType::Email
            | ColumnType::Phone
            | ColumnType::Formula => value.as_text(),
        }
    }

    /// Key used by the locale-aware string sort
    pub fn sort_key(&self, value: &CellValue) -> String {
        match self {
            ColumnType::RichText => strip_markup(&value.as_text()),
            ColumnType::MultiSelect | ColumnType::File => match value {
                CellValue::List(items) => items.join(","),
                other => other.as_text(),
            },
            ColumnType::Text
            | ColumnType::Number
            | ColumnType::Date
            | ColumnType::Time
            | ColumnType::Datetime
            | ColumnType::Select
            | ColumnType::Checkbox
            | ColumnType::Url
            | ColumnType::Email
            | ColumnType::Phone
            | ColumnType::Formula
            | ColumnType::Currency => value.as_text(),
        }
    }
}

fn format_currency(n: f64) -> String {
    let cents = (n.abs() * 100.0).round() as u64;
    let negative = n < 0.0 && cents > 0;
    let whole = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!(
        "{}{}.{:02}",
        if negative { "-" } else { "" },
        grouped,
        cents % 100
    )
}

fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Validation rules attached to a column
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnValidation {
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Regular expression the stringified value must match
    pub pattern: Option<String>,
}

/// Presentation hints for a column
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnStyle {
    pub background_color: Option<String>,
    pub text_color: Option<String>,
    pub text_align: Option<String>,
    pub font_weight: Option<String>,
    pub font_style: Option<String>,
    pub text_decoration: Option<String>,
}

/// A column schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    /// Choices for select / multi_select
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Present iff the column type is `formula`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default)]
    pub validation: ColumnValidation,
    #[serde(default)]
    pub style: ColumnStyle,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        let formula = (column_type == ColumnType::Formula).then(String::new);
        Self {
            name: name.into(),
            column_type,
            options: Vec::new(),
            formula,
            width: None,
            validation: ColumnValidation::default(),
            style: ColumnStyle::default(),
        }
    }

    /// Build a formula column
    pub fn formula(name: impl Into<String>, formula: impl Into<String>) -> Self {
        let mut column = Self::new(name, ColumnType::Formula);
        column.formula = Some(formula.into());
        column
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_validation(mut self, validation: ColumnValidation) -> Self {
        self.validation = validation;
        self
    }

    pub fn is_formula(&self) -> bool {
        self.column_type == ColumnType::Formula
    }

    /// Check the formula/type pairing
    pub fn check_formula_invariant(&self) -> Result<(), String> {
        match (self.is_formula(), &self.formula) {
            (true, None) => Err(format!(
                "Column '{}' is a formula column without a formula",
                self.name
            )),
            (false, Some(_)) => Err(format!(
                "Column '{}' has a formula but type '{}'",
                self.name,
                self.column_type.type_name()
            )),
            _ => Ok(()),
        }
    }
}

//==============================================================================
// Rows
//==============================================================================

/// A row of data keyed by column name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    #[serde(default)]
    pub data: HashMap<String, CellValue>,
}

impl Row {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: HashMap::new(),
        }
    }

    /// Builder-style helper for fixtures
    pub fn with(mut self, column: &str, value: impl Into<CellValue>) -> Self {
        self.data.insert(column.to_string(), value.into());
        self
    }

    /// Stored value for a column, `Null` when absent
    pub fn get(&self, column: &str) -> &CellValue {
        static NULL: CellValue = CellValue::Null;
        self.data.get(column).unwrap_or(&NULL)
    }
}
