//! Decoded worksheet model
//!
//! Worksheets are immutable after decode. Merge answers (`hidden`, spans)
//! are materialized per cell so a renderer never has to consult the merge
//! ranges again.

use super::border::CellBorder;
use super::merge::MergeRange;
use crate::types::CellValue;
use serde::{Deserialize, Serialize};

/// Display classification of a decoded cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    #[default]
    String,
    Number,
    Date,
    Boolean,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontStyle {
    pub family: Option<String>,
    pub size_pt: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
    Justify,
}

impl HorizontalAlign {
    /// Map a workbook keyword; `general` and unknown keywords give `None`
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "left" => Some(HorizontalAlign::Left),
            "center" | "centerContinuous" => Some(HorizontalAlign::Center),
            "right" => Some(HorizontalAlign::Right),
            "justify" | "distributed" | "fill" => Some(HorizontalAlign::Justify),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    Top,
    Middle,
    Bottom,
}

impl VerticalAlign {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "top" => Some(VerticalAlign::Top),
            "middle" | "center" | "justify" | "distributed" => Some(VerticalAlign::Middle),
            "bottom" => Some(VerticalAlign::Bottom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Alignment {
    pub horizontal: Option<HorizontalAlign>,
    pub vertical: Option<VerticalAlign>,
    pub wrap: bool,
    pub indent: Option<f64>,
}

/// Decoded style; every part is optional and omitted when the source has none
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CellStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<FontStyle>,
    /// Background color as `#RRGGBB`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border: Option<CellBorder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_format: Option<String>,
}

impl CellStyle {
    pub fn is_empty(&self) -> bool {
        self.font.is_none()
            && self.fill.is_none()
            && self.border.is_none()
            && self.alignment.is_none()
            && self.number_format.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellData {
    pub value: CellValue,
    pub display_text: String,
    /// Formula text without the leading `=`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(rename = "type")]
    pub kind: CellKind,
    #[serde(skip_serializing_if = "CellStyle::is_empty", default)]
    pub style: CellStyle,
    /// Covered by a merge range this cell is not the origin of
    pub hidden: bool,
    pub row_span: usize,
    pub col_span: usize,
}

impl Default for CellData {
    fn default() -> Self {
        Self {
            value: CellValue::Null,
            display_text: String::new(),
            formula: None,
            kind: CellKind::String,
            style: CellStyle::default(),
            hidden: false,
            row_span: 1,
            col_span: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worksheet {
    pub name: String,
    /// `actual_rows` rows of `actual_cols` cells
    pub cells: Vec<Vec<CellData>>,
    pub column_widths: Vec<f64>,
    pub row_heights: Vec<f64>,
    pub merged_cells: Vec<MergeRange>,
    pub actual_rows: usize,
    pub actual_cols: usize,
}

impl Worksheet {
    pub fn cell(&self, row: usize, col: usize) -> Option<&CellData> {
        self.cells.get(row)?.get(col)
    }

    /// Cells a renderer draws: everything not hidden by a merge
    pub fn visible_cells(&self) -> impl Iterator<Item = (usize, usize, &CellData)> + '_ {
        self.cells.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, cell)| !cell.hidden)
                .map(move |(c, cell)| (r, c, cell))
        })
    }

    /// Number of cells holding any display text
    pub fn non_empty_count(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| !cell.display_text.is_empty())
            .count()
    }
}
