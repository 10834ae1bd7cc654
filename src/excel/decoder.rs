//! Workbook decoding into render-ready worksheets
//!
//! The decoder pulls raw cells through a [`WorkbookReader`], resolves grid
//! dimensions from whatever size signals the sheet reports, and decodes
//! each cell's value, display text and style on its own: a malformed field
//! degrades to its default without affecting the rest of the sheet.

use super::border::BorderStyleResolver;
use super::color::{ColorDescriptor, ColorResolver, ColorRole};
use super::merge::MergeMap;
use super::reader::{
    RawAlignment, RawBorder, RawCell, RawFill, RawFont, RawStyle, RawValue, SheetDimensions,
    SheetReader, WorkbookReader,
};
use super::time_serial::{
    display_datetime, fraction_to_clock, normalize_clock_text, serial_to_date, UNIX_EPOCH_SERIAL,
};
use super::worksheet::{
    Alignment, CellData, CellKind, CellStyle, FontStyle, HorizontalAlign, VerticalAlign, Worksheet,
};
use crate::config::DecodeConfig;
use crate::types::{format_number, CellValue};
use tracing::{debug, warn};

/// Decodes every sheet of a workbook
#[derive(Debug, Clone)]
pub struct ExcelImportDecoder {
    config: DecodeConfig,
    colors: ColorResolver,
}

impl Default for ExcelImportDecoder {
    fn default() -> Self {
        Self::new(&DecodeConfig::default())
    }
}

impl ExcelImportDecoder {
    pub fn new(config: &DecodeConfig) -> Self {
        Self {
            config: config.clone(),
            colors: ColorResolver::default(),
        }
    }

    pub fn colors(&self) -> &ColorResolver {
        &self.colors
    }

    pub fn decode(&self, reader: &dyn WorkbookReader) -> Vec<Worksheet> {
        (0..reader.sheet_count())
            .filter_map(|index| reader.sheet(index))
            .map(|sheet| self.decode_sheet(sheet))
            .collect()
    }

    pub fn decode_sheet(&self, sheet: &dyn SheetReader) -> Worksheet {
        let (rows, cols) = self.resolve_dimensions(&sheet.dimensions());
        debug!(sheet = sheet.name(), rows, cols, "decoding sheet");

        let raw: Vec<Vec<Option<RawCell>>> = (0..rows)
            .map(|r| (0..cols).map(|c| sheet.cell(r, c)).collect())
            .collect();
        let border_at = |r: usize, c: usize| declared_border(&raw, r, c);

        let merges = MergeMap::from_labels(&sheet.merge_ranges(), rows, cols);
        let borders = BorderStyleResolver::new(&self.colors, &self.config.gridline_color);

        let mut cells = Vec::with_capacity(rows);
        for (r, raw_row) in raw.iter().enumerate() {
            let mut row = Vec::with_capacity(cols);
            for (c, raw_cell) in raw_row.iter().enumerate() {
                let mut cell = match raw_cell {
                    Some(raw_cell) => self.decode_cell(raw_cell),
                    None => CellData::default(),
                };
                cell.style.border = borders.resolve_cell(r, c, border_at);
                cell.hidden = merges.is_hidden(r, c);
                let span = merges.span_of(r, c);
                cell.row_span = span.rows;
                cell.col_span = span.cols;
                row.push(cell);
            }
            cells.push(row);
        }

        Worksheet {
            name: sheet.name().to_string(),
            cells,
            column_widths: (0..cols)
                .map(|c| self.size_or(sheet.column_width(c), self.config.default_column_width))
                .collect(),
            row_heights: (0..rows)
                .map(|r| self.size_or(sheet.row_height(r), self.config.default_row_height))
                .collect(),
            merged_cells: merges.ranges().to_vec(),
            actual_rows: rows,
            actual_cols: cols,
        }
    }

    fn size_or(&self, size: Option<f64>, default: f64) -> f64 {
        size.filter(|s| s.is_finite() && *s > 0.0).unwrap_or(default)
    }

    //==========================================================================
    // Dimensions
    //==========================================================================

    /// Grid size for a sheet: the first non-zero reported count, widened to
    /// the last used position, plus one trailing row; the default size when
    /// nothing is reported. Capped either way.
    pub fn resolve_dimensions(&self, dims: &SheetDimensions) -> (usize, usize) {
        let nonzero = |v: Option<usize>| v.filter(|n| *n > 0);

        let reported_rows = nonzero(dims.actual_row_count).or(nonzero(dims.row_count));
        let used_rows = dims.last_used_row.map(|r| r + 1);
        let reported_cols = nonzero(dims.actual_column_count).or(nonzero(dims.column_count));
        let used_cols = dims.last_used_col.map(|c| c + 1);

        let rows = match (reported_rows, used_rows) {
            (None, None) => self.config.default_rows,
            (a, b) => a.unwrap_or(0).max(b.unwrap_or(0)) + 1,
        };
        let cols = match (reported_cols, used_cols) {
            (None, None) => self.config.default_cols,
            (a, b) => a.unwrap_or(0).max(b.unwrap_or(0)),
        };

        let capped = (rows.min(self.config.max_rows), cols.min(self.config.max_cols));
        if capped != (rows, cols) {
            debug!(rows, cols, capped_rows = capped.0, capped_cols = capped.1, "sheet capped");
        }
        capped
    }

    //==========================================================================
    // Values
    //==========================================================================

    /// Decode one raw cell. Priority: formula, rich text, cached result, raw
    /// value; the source's own display text wins last.
    pub fn decode_cell(&self, raw: &RawCell) -> CellData {
        let formula = raw
            .formula
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(|f| f.strip_prefix('=').unwrap_or(f).to_string());

        let (value, mut display_text, kind) = match (&formula, &raw.rich_text) {
            (None, Some(runs)) => {
                let text: String = runs.concat();
                (CellValue::Text(text.clone()), text, CellKind::String)
            }
            _ => match &raw.result {
                Some(result) if *result != RawValue::Empty => self.decode_scalar(result),
                _ => self.decode_scalar(&raw.value),
            },
        };

        if let Some(text) = raw.text.as_deref().filter(|t| !t.trim().is_empty()) {
            display_text = text.to_string();
        }

        let mut style = raw
            .style
            .as_ref()
            .map(|s| self.decode_style(s))
            .unwrap_or_default();
        style.number_format = raw
            .number_format
            .clone()
            .filter(|f| !f.is_empty() && f != "General");

        CellData {
            value,
            display_text,
            formula,
            kind,
            style,
            ..Default::default()
        }
    }

    /// Value, display text and kind of one scalar
    pub fn decode_scalar(&self, value: &RawValue) -> (CellValue, String, CellKind) {
        match value {
            RawValue::Empty => (CellValue::Null, String::new(), CellKind::String),

            RawValue::Number(n) if *n > 0.0 && *n < 1.0 => {
                (CellValue::Number(*n), fraction_to_clock(*n), CellKind::Date)
            }
            RawValue::Number(n) => (CellValue::Number(*n), format_number(*n), CellKind::Number),

            RawValue::Date(serial) if *serial > UNIX_EPOCH_SERIAL => match serial_to_date(*serial) {
                Some(date) => (
                    CellValue::Number(*serial),
                    display_datetime(&date, &self.config.date_format),
                    CellKind::Date,
                ),
                None => {
                    warn!(serial, "date serial out of range, kept as number");
                    (CellValue::Number(*serial), format_number(*serial), CellKind::Number)
                }
            },
            RawValue::Date(serial) if serial.is_finite() => (
                CellValue::Number(*serial),
                fraction_to_clock(serial.rem_euclid(1.0)),
                CellKind::Date,
            ),
            RawValue::Date(serial) => {
                warn!(serial, "non-finite date serial");
                (CellValue::Null, String::new(), CellKind::Error)
            }

            RawValue::DateTime(date) => (
                CellValue::Text(date.to_rfc3339()),
                display_datetime(date, &self.config.date_format),
                CellKind::Date,
            ),

            RawValue::Text(text) => (
                CellValue::Text(text.clone()),
                normalize_clock_text(text),
                CellKind::String,
            ),

            RawValue::Bool(b) => (
                CellValue::Bool(*b),
                if *b { "TRUE" } else { "FALSE" }.to_string(),
                CellKind::Boolean,
            ),

            RawValue::Error(code) => (CellValue::Text(code.clone()), code.clone(), CellKind::Error),
        }
    }

    //==========================================================================
    // Styles
    //==========================================================================

    /// Decode font, fill and alignment. Borders need the neighbors and are
    /// resolved by the sheet pass.
    pub fn decode_style(&self, raw: &RawStyle) -> CellStyle {
        CellStyle {
            font: raw.font.as_ref().map(|f| self.decode_font(f)),
            fill: raw.fill.as_ref().and_then(|f| self.decode_fill(f)),
            border: None,
            alignment: raw.alignment.as_ref().and_then(decode_alignment),
            number_format: None,
        }
    }

    fn decode_font(&self, font: &RawFont) -> FontStyle {
        FontStyle {
            family: font.name.clone().filter(|n| !n.trim().is_empty()),
            size_pt: font.size.filter(|s| s.is_finite() && *s > 0.0),
            bold: font.bold.unwrap_or(false),
            italic: font.italic.unwrap_or(false),
            underline: font.underline.unwrap_or(false),
            strikethrough: font.strike.unwrap_or(false),
            color: self.color_or_default(font.color.as_ref(), ColorRole::Font),
        }
    }

    fn decode_fill(&self, fill: &RawFill) -> Option<String> {
        if fill
            .pattern
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case("none"))
        {
            return None;
        }
        let descriptor = fill.fg_color.as_ref().or(fill.bg_color.as_ref())?;
        Some(self.color_or_default(Some(descriptor), ColorRole::Fill))
    }

    fn color_or_default(&self, descriptor: Option<&ColorDescriptor>, role: ColorRole) -> String {
        match descriptor {
            None => role.default_hex().to_string(),
            Some(descriptor) => self.colors.try_resolve(descriptor).unwrap_or_else(|| {
                warn!(?descriptor, "malformed color, using default");
                role.default_hex().to_string()
            }),
        }
    }
}

fn declared_border(raw: &[Vec<Option<RawCell>>], row: usize, col: usize) -> Option<&RawBorder> {
    raw.get(row)?
        .get(col)?
        .as_ref()?
        .style
        .as_ref()?
        .border
        .as_ref()
}

fn decode_alignment(raw: &RawAlignment) -> Option<Alignment> {
    let horizontal = raw.horizontal.as_deref().and_then(|k| {
        let align = HorizontalAlign::from_keyword(k);
        if align.is_none() && k != "general" {
            warn!(keyword = k, "unknown horizontal alignment ignored");
        }
        align
    });
    let vertical = raw.vertical.as_deref().and_then(|k| {
        let align = VerticalAlign::from_keyword(k);
        if align.is_none() {
            warn!(keyword = k, "unknown vertical alignment ignored");
        }
        align
    });
    let alignment = Alignment {
        horizontal,
        vertical,
        wrap: raw.wrap_text.unwrap_or(false),
        indent: raw.indent.filter(|i| i.is_finite() && *i > 0.0),
    };
    (alignment != Alignment::default()).then_some(alignment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::excel::reader::{MemorySheet, MemoryWorkbook, RawBorderSide};
    use chrono::{TimeZone, Utc};

    fn dims(rows: Option<usize>, cols: Option<usize>) -> SheetDimensions {
        SheetDimensions {
            row_count: rows,
            column_count: cols,
            ..Default::default()
        }
    }

    #[test]
    fn test_dimension_fallback_chain() {
        let decoder = ExcelImportDecoder::default();

        let actual = SheetDimensions {
            actual_row_count: Some(4),
            actual_column_count: Some(3),
            row_count: Some(40),
            column_count: Some(30),
            ..Default::default()
        };
        assert_eq!(decoder.resolve_dimensions(&actual), (5, 3));

        let zero_actual = SheetDimensions {
            actual_row_count: Some(0),
            actual_column_count: Some(0),
            ..dims(Some(7), Some(2))
        };
        assert_eq!(decoder.resolve_dimensions(&zero_actual), (8, 2));

        let used_only = SheetDimensions {
            last_used_row: Some(9),
            last_used_col: Some(4),
            ..Default::default()
        };
        assert_eq!(decoder.resolve_dimensions(&used_only), (11, 5));

        let widened = SheetDimensions {
            last_used_row: Some(9),
            ..dims(Some(3), Some(2))
        };
        assert_eq!(decoder.resolve_dimensions(&widened), (11, 2));

        assert_eq!(decoder.resolve_dimensions(&SheetDimensions::default()), (100, 26));
    }

    #[test]
    fn test_dimension_cap() {
        let decoder = ExcelImportDecoder::default();
        assert_eq!(
            decoder.resolve_dimensions(&dims(Some(10_000), Some(100))),
            (500, 50)
        );

        let small = DecodeConfig {
            max_rows: 10,
            max_cols: 4,
            ..Default::default()
        };
        let decoder = ExcelImportDecoder::new(&small);
        assert_eq!(decoder.resolve_dimensions(&SheetDimensions::default()), (10, 4));
    }

    #[test]
    fn test_scalar_numbers_and_times() {
        let decoder = ExcelImportDecoder::default();
        assert_eq!(
            decoder.decode_scalar(&RawValue::Number(0.29167)),
            (CellValue::Number(0.29167), "7:00".to_string(), CellKind::Date)
        );
        assert_eq!(
            decoder.decode_scalar(&RawValue::Number(1234.5)).1,
            "1234.5"
        );
        assert_eq!(decoder.decode_scalar(&RawValue::Number(0.0)).2, CellKind::Number);
        assert_eq!(decoder.decode_scalar(&RawValue::Number(1.0)).2, CellKind::Number);
    }

    #[test]
    fn test_scalar_dates() {
        let decoder = ExcelImportDecoder::default();
        // 2024-03-15
        let (_, text, kind) = decoder.decode_scalar(&RawValue::Date(45366.0));
        assert_eq!((text.as_str(), kind), ("2024/03/15", CellKind::Date));

        // below the epoch threshold: time only
        let (_, text, _) = decoder.decode_scalar(&RawValue::Date(0.75));
        assert_eq!(text, "18:00");
        let (_, text, _) = decoder.decode_scalar(&RawValue::Date(1.5));
        assert_eq!(text, "12:00");

        let time_only = Utc.with_ymd_and_hms(1899, 12, 30, 9, 15, 0).unwrap();
        assert_eq!(decoder.decode_scalar(&RawValue::DateTime(time_only)).1, "9:15");

        let (value, text, kind) = decoder.decode_scalar(&RawValue::Date(f64::NAN));
        assert_eq!((value, text.as_str(), kind), (CellValue::Null, "", CellKind::Error));
    }

    #[test]
    fn test_scalar_text_bool_error() {
        let decoder = ExcelImportDecoder::default();
        assert_eq!(
            decoder.decode_scalar(&RawValue::Text("08:45:00".to_string())).1,
            "08:45"
        );
        assert_eq!(
            decoder.decode_scalar(&RawValue::Bool(true)),
            (CellValue::Bool(true), "TRUE".to_string(), CellKind::Boolean)
        );
        assert_eq!(
            decoder.decode_scalar(&RawValue::Error("#DIV/0!".to_string())).2,
            CellKind::Error
        );
    }

    #[test]
    fn test_cell_priority() {
        let decoder = ExcelImportDecoder::default();

        let formula = RawCell {
            value: RawValue::Number(1.0),
            formula: Some("=SUM(A1:A3)".to_string()),
            result: Some(RawValue::Number(6.0)),
            rich_text: Some(vec!["ignored".to_string()]),
            ..Default::default()
        };
        let cell = decoder.decode_cell(&formula);
        assert_eq!(cell.formula.as_deref(), Some("SUM(A1:A3)"));
        assert_eq!(cell.display_text, "6");

        let rich = RawCell {
            value: RawValue::Number(1.0),
            rich_text: Some(vec!["Night ".to_string(), "shift".to_string()]),
            result: Some(RawValue::Number(9.0)),
            ..Default::default()
        };
        assert_eq!(decoder.decode_cell(&rich).display_text, "Night shift");

        let cached = RawCell {
            value: RawValue::Number(1.0),
            result: Some(RawValue::Text("cached".to_string())),
            ..Default::default()
        };
        assert_eq!(decoder.decode_cell(&cached).display_text, "cached");

        assert_eq!(
            decoder
                .decode_cell(&RawCell::value(RawValue::Number(3.0)))
                .display_text,
            "3"
        );
    }

    #[test]
    fn test_source_display_text_wins() {
        let decoder = ExcelImportDecoder::default();
        let cell = RawCell {
            value: RawValue::Number(0.5),
            text: Some("12:00 PM".to_string()),
            number_format: Some("h:mm AM/PM".to_string()),
            ..Default::default()
        };
        let decoded = decoder.decode_cell(&cell);
        assert_eq!(decoded.display_text, "12:00 PM");
        assert_eq!(decoded.style.number_format.as_deref(), Some("h:mm AM/PM"));

        let blank = RawCell {
            value: RawValue::Number(2.0),
            text: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(decoder.decode_cell(&blank).display_text, "2");
    }

    #[test]
    fn test_style_decoding_is_defensive() {
        let decoder = ExcelImportDecoder::default();
        let style = RawStyle {
            font: Some(RawFont {
                bold: Some(true),
                color: Some(ColorDescriptor::argb("garbage")),
                ..Default::default()
            }),
            fill: Some(RawFill {
                pattern: Some("solid".to_string()),
                fg_color: Some(ColorDescriptor::theme(5, None)),
                bg_color: None,
            }),
            border: None,
            alignment: Some(RawAlignment {
                horizontal: Some("general".to_string()),
                ..Default::default()
            }),
        };
        let decoded = decoder.decode_style(&style);
        let font = decoded.font.unwrap();
        assert!(font.bold);
        assert_eq!(font.color, "#000000");
        assert_eq!(decoded.fill.as_deref(), Some("#ED7D31"));
        assert!(decoded.alignment.is_none());

        let no_fill = RawFill {
            pattern: Some("none".to_string()),
            fg_color: Some(ColorDescriptor::theme(5, None)),
            bg_color: None,
        };
        assert_eq!(decoder.decode_fill(&no_fill), None);
        assert!(decoder.decode_style(&RawStyle::default()).is_empty());
    }

    #[test]
    fn test_decode_sheet_merges_and_borders() {
        let sheet = MemorySheet::new("Roster")
            .with_dimensions(dims(Some(3), Some(3)))
            .with_merge("A1:B2")
            .with_merge("B2:C3")
            .with_cell(0, 0, RawCell::value(RawValue::Text("Team".to_string())))
            .with_cell(
                2,
                2,
                RawCell::value(RawValue::Number(4.0)).with_style(RawStyle {
                    border: Some(RawBorder {
                        top: Some(RawBorderSide::new("thin")),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
            );
        let workbook = MemoryWorkbook::new(vec![sheet]);
        let sheets = ExcelImportDecoder::default().decode(&workbook);
        assert_eq!(sheets.len(), 1);

        let ws = &sheets[0];
        assert_eq!((ws.actual_rows, ws.actual_cols), (4, 3));
        assert_eq!(ws.cells.len(), 4);
        assert!(ws.cells.iter().all(|row| row.len() == 3));
        assert_eq!(ws.merged_cells.len(), 1);

        let origin = ws.cell(0, 0).unwrap();
        assert_eq!((origin.row_span, origin.col_span), (2, 2));
        assert!(!origin.hidden);
        assert!(ws.cell(1, 1).unwrap().hidden);

        let above = ws.cell(1, 2).unwrap();
        let border = above.style.border.as_ref().unwrap();
        assert_eq!(border.bottom.to_string(), "1px solid #000000");
        assert_eq!(border.top.color, "#D4D4D4");
        assert!(ws.cell(0, 2).unwrap().style.border.is_none());

        assert_eq!(ws.column_widths, vec![64.0; 3]);
        assert_eq!(ws.row_heights, vec![20.0; 4]);
    }
}
