//! Engine configuration
//!
//! All knobs are optional in YAML; anything left out falls back to the
//! defaults below.
//!
//! ```yaml
//! formula:
//!   mode: structured
//!   error_marker: "計算エラー"
//! decode:
//!   max_rows: 1000
//! ```

use crate::error::{GridError, GridResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How formula text is dispatched to functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaMode {
    /// Fixed-priority substring dispatch (SUM, AVERAGE, COUNT, MAX/MIN, IF,
    /// CONCATENATE, DATEDIFF, then column arithmetic). Existing formulas
    /// keep their historical results, including `IF(SUM(x)>0, ...)` being
    /// treated as a SUM.
    #[default]
    Compatibility,
    /// Recursive-descent parse into an expression tree, evaluated bottom-up.
    /// Nested calls work as written.
    Structured,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaConfig {
    pub mode: FormulaMode,
    /// Returned in place of a value whenever a formula cannot be evaluated
    pub error_marker: String,
}

impl Default for FormulaConfig {
    fn default() -> Self {
        Self {
            mode: FormulaMode::default(),
            error_marker: "#ERROR".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Width given to columns created without an explicit width
    pub default_column_width: f64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            default_column_width: 150.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Hard cap on decoded rows per sheet
    pub max_rows: usize,
    /// Hard cap on decoded columns per sheet
    pub max_cols: usize,
    /// Used when a sheet reports no usable dimension signal at all
    pub default_rows: usize,
    pub default_cols: usize,
    pub default_column_width: f64,
    pub default_row_height: f64,
    /// chrono format string for calendar dates
    pub date_format: String,
    /// Color of the uniform gridline used when no border is declared
    pub gridline_color: String,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            max_rows: 500,
            max_cols: 50,
            default_rows: 100,
            default_cols: 26,
            default_column_width: 64.0,
            default_row_height: 20.0,
            date_format: "%Y/%m/%d".to_string(),
            gridline_color: "#D4D4D4".to_string(),
        }
    }
}

/// Top-level configuration shared by the table engine and the decoder
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub formula: FormulaConfig,
    pub table: TableConfig,
    pub decode: DecodeConfig,
}

impl EngineConfig {
    /// Parse a configuration from YAML text
    pub fn from_yaml_str(yaml: &str) -> GridResult<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> GridResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Reject values that would make the engine produce empty or unbounded output
    pub fn validate(&self) -> GridResult<()> {
        if self.decode.max_rows == 0 || self.decode.max_cols == 0 {
            return Err(GridError::Config(
                "decode.max_rows and decode.max_cols must be at least 1".to_string(),
            ));
        }
        if self.decode.default_rows == 0 || self.decode.default_cols == 0 {
            return Err(GridError::Config(
                "decode.default_rows and decode.default_cols must be at least 1".to_string(),
            ));
        }
        if self.formula.error_marker.is_empty() {
            return Err(GridError::Config(
                "formula.error_marker must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
