//! Workbook reader seam
//!
//! The decoder never parses workbook bytes itself. It pulls raw cells,
//! dimension hints and merge ranges through [`WorkbookReader`] and
//! [`SheetReader`]. [`MemoryWorkbook`] is the in-crate implementation: it can
//! be deserialized from JSON/YAML fixtures or filled from an `.xlsx` file by
//! the calamine loader.

use super::color::ColorDescriptor;
use crate::error::{GridError, GridResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

//==============================================================================
// Raw cell model
//==============================================================================

/// A scalar as the source workbook stores it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RawValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    /// A number the source marks as date-typed (a serial)
    Date(f64),
    /// A date the source already converted to an instant
    DateTime(DateTime<Utc>),
    Error(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCell {
    pub value: RawValue,
    /// Formula text, with or without a leading `=`
    pub formula: Option<String>,
    /// Cached result of the formula
    pub result: Option<RawValue>,
    /// Rich text runs, in order
    pub rich_text: Option<Vec<String>>,
    pub number_format: Option<String>,
    /// Display text the source already formatted
    pub text: Option<String>,
    pub style: Option<RawStyle>,
}

impl RawCell {
    pub fn value(value: RawValue) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    pub fn with_style(mut self, style: RawStyle) -> Self {
        self.style = Some(style);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawStyle {
    pub font: Option<RawFont>,
    pub fill: Option<RawFill>,
    pub border: Option<RawBorder>,
    pub alignment: Option<RawAlignment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFont {
    pub name: Option<String>,
    pub size: Option<f64>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub strike: Option<bool>,
    pub color: Option<ColorDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawFill {
    /// Pattern keyword such as `solid` or `none`
    pub pattern: Option<String>,
    pub fg_color: Option<ColorDescriptor>,
    pub bg_color: Option<ColorDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawBorder {
    pub top: Option<RawBorderSide>,
    pub right: Option<RawBorderSide>,
    pub bottom: Option<RawBorderSide>,
    pub left: Option<RawBorderSide>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawBorderSide {
    /// Style keyword such as `thin`, `mediumDashed`, `double`
    pub style: Option<String>,
    pub color: Option<ColorDescriptor>,
}

impl RawBorderSide {
    pub fn new(style: &str) -> Self {
        Self {
            style: Some(style.to_string()),
            color: None,
        }
    }

    /// A side counts as declared when it names a style other than `none`
    pub fn is_declared(&self) -> bool {
        self.style
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty() && !s.eq_ignore_ascii_case("none"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawAlignment {
    pub horizontal: Option<String>,
    pub vertical: Option<String>,
    pub wrap_text: Option<bool>,
    pub indent: Option<f64>,
}

/// Redundant size signals a sheet may report; any of them may be missing or zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetDimensions {
    pub actual_row_count: Option<usize>,
    pub actual_column_count: Option<usize>,
    pub row_count: Option<usize>,
    pub column_count: Option<usize>,
    /// Zero-based index of the last non-empty row
    pub last_used_row: Option<usize>,
    /// Zero-based index of the last non-empty column
    pub last_used_col: Option<usize>,
}

//==============================================================================
// Reader traits
//==============================================================================

/// One worksheet of a source workbook
pub trait SheetReader {
    fn name(&self) -> &str;

    /// Raw cell at a zero-based position
    fn cell(&self, row: usize, col: usize) -> Option<RawCell>;

    fn dimensions(&self) -> SheetDimensions;

    /// Declared merge ranges in `A1:B2` form
    fn merge_ranges(&self) -> Vec<String>;

    /// Column width in pixels, when the sheet declares one
    fn column_width(&self, _col: usize) -> Option<f64> {
        None
    }

    /// Row height in pixels, when the sheet declares one
    fn row_height(&self, _row: usize) -> Option<f64> {
        None
    }
}

/// A source workbook: an ordered set of sheets
pub trait WorkbookReader {
    fn sheet_count(&self) -> usize;

    fn sheet(&self, index: usize) -> Option<&dyn SheetReader>;
}

//==============================================================================
// In-memory workbook
//==============================================================================

/// A raw cell with its zero-based position, as written in fixtures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedCell {
    pub row: usize,
    pub col: usize,
    #[serde(flatten)]
    pub cell: RawCell,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct SheetDocument {
    name: String,
    cells: Vec<PositionedCell>,
    dimensions: SheetDimensions,
    merge_ranges: Vec<String>,
    column_widths: BTreeMap<usize, f64>,
    row_heights: BTreeMap<usize, f64>,
}

/// Sheet held fully in memory, indexed by position
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "SheetDocument", into = "SheetDocument")]
pub struct MemorySheet {
    name: String,
    cells: HashMap<(usize, usize), RawCell>,
    dimensions: SheetDimensions,
    merge_ranges: Vec<String>,
    column_widths: BTreeMap<usize, f64>,
    row_heights: BTreeMap<usize, f64>,
}

impl From<SheetDocument> for MemorySheet {
    fn from(doc: SheetDocument) -> Self {
        Self {
            name: doc.name,
            cells: doc
                .cells
                .into_iter()
                .map(|p| ((p.row, p.col), p.cell))
                .collect(),
            dimensions: doc.dimensions,
            merge_ranges: doc.merge_ranges,
            column_widths: doc.column_widths,
            row_heights: doc.row_heights,
        }
    }
}

impl From<MemorySheet> for SheetDocument {
    fn from(sheet: MemorySheet) -> Self {
        let mut cells: Vec<PositionedCell> = sheet
            .cells
            .into_iter()
            .map(|((row, col), cell)| PositionedCell { row, col, cell })
            .collect();
        cells.sort_by_key(|p| (p.row, p.col));
        Self {
            name: sheet.name,
            cells,
            dimensions: sheet.dimensions,
            merge_ranges: sheet.merge_ranges,
            column_widths: sheet.column_widths,
            row_heights: sheet.row_heights,
        }
    }
}

impl MemorySheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn set_cell(&mut self, row: usize, col: usize, cell: RawCell) {
        self.cells.insert((row, col), cell);
    }

    pub fn with_cell(mut self, row: usize, col: usize, cell: RawCell) -> Self {
        self.set_cell(row, col, cell);
        self
    }

    pub fn with_dimensions(mut self, dimensions: SheetDimensions) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_merge(mut self, range: impl Into<String>) -> Self {
        self.merge_ranges.push(range.into());
        self
    }

    pub fn set_column_width(&mut self, col: usize, width: f64) {
        self.column_widths.insert(col, width);
    }

    pub fn set_row_height(&mut self, row: usize, height: f64) {
        self.row_heights.insert(row, height);
    }

    pub fn dimensions_mut(&mut self) -> &mut SheetDimensions {
        &mut self.dimensions
    }

    pub fn push_merge(&mut self, range: impl Into<String>) {
        self.merge_ranges.push(range.into());
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Zero-based (row, col) of the last non-empty cell in each direction
    pub fn last_used(&self) -> Option<(usize, usize)> {
        let used = self
            .cells
            .iter()
            .filter(|(_, cell)| cell.value != RawValue::Empty || cell.formula.is_some());
        let row = used.clone().map(|((r, _), _)| *r).max()?;
        let col = used.map(|((_, c), _)| *c).max()?;
        Some((row, col))
    }
}

impl SheetReader for MemorySheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn cell(&self, row: usize, col: usize) -> Option<RawCell> {
        self.cells.get(&(row, col)).cloned()
    }

    fn dimensions(&self) -> SheetDimensions {
        self.dimensions
    }

    fn merge_ranges(&self) -> Vec<String> {
        self.merge_ranges.clone()
    }

    fn column_width(&self, col: usize) -> Option<f64> {
        self.column_widths.get(&col).copied()
    }

    fn row_height(&self, row: usize) -> Option<f64> {
        self.row_heights.get(&row).copied()
    }
}

/// Workbook held fully in memory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryWorkbook {
    #[serde(default)]
    pub sheets: Vec<MemorySheet>,
}

impl MemoryWorkbook {
    pub fn new(sheets: Vec<MemorySheet>) -> Self {
        Self { sheets }
    }

    pub fn from_json_str(json: &str) -> GridResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml_str(yaml: &str) -> GridResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a workbook by file extension: `.xlsx`/`.xlsm` through calamine,
    /// `.json`, `.yaml`/`.yml` as serialized [`MemoryWorkbook`]s
    pub fn load<P: AsRef<Path>>(path: P) -> GridResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "xlsx" | "xlsm" => super::calamine_reader::load_xlsx(path),
            "json" => Self::from_json_str(&std::fs::read_to_string(path)?),
            "yaml" | "yml" => Self::from_yaml_str(&std::fs::read_to_string(path)?),
            other => Err(GridError::Import(format!(
                "Unsupported workbook format '{}' for {}",
                other,
                path.display()
            ))),
        }
    }
}

impl WorkbookReader for MemoryWorkbook {
    fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    fn sheet(&self, index: usize) -> Option<&dyn SheetReader> {
        self.sheets.get(index).map(|s| s as &dyn SheetReader)
    }
}
