//! `.xlsx` loading through calamine
//!
//! calamine exposes values, cached formula results, formulas and merge
//! regions, but no styles. Cells loaded here are style-less.

use super::merge::column_letter;
use super::reader::{MemorySheet, MemoryWorkbook, RawCell, RawValue, SheetDimensions};
use crate::error::{GridError, GridResult};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Load every sheet of an `.xlsx` file into memory
pub fn load_xlsx<P: AsRef<Path>>(path: P) -> GridResult<MemoryWorkbook> {
    let path = path.as_ref();
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|e| {
        GridError::Import(format!("Failed to open Excel file {}: {}", path.display(), e))
    })?;

    let sheet_names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(sheet_names.len());

    for name in sheet_names {
        let range = match workbook.worksheet_range(&name) {
            Ok(range) => range,
            Err(e) => {
                warn!(sheet = %name, error = %e, "sheet could not be read, skipped");
                continue;
            }
        };

        let mut cells = read_values(&range);

        // calamine keeps the cached result as the cell value
        if let Ok(formulas) = workbook.worksheet_formula(&name) {
            let (row0, col0) = origin(&formulas);
            for (r, c, formula) in formulas.used_cells() {
                if formula.trim().is_empty() {
                    continue;
                }
                let cell = cells.entry((row0 + r, col0 + c)).or_default();
                cell.result = Some(std::mem::take(&mut cell.value));
                cell.formula = Some(formula.clone());
            }
        }

        let mut sheet = MemorySheet::new(name.as_str());
        if let Some((end_row, end_col)) = range.end() {
            *sheet.dimensions_mut() = SheetDimensions {
                row_count: Some(end_row as usize + 1),
                column_count: Some(end_col as usize + 1),
                last_used_row: cells.keys().map(|(r, _)| *r).max(),
                last_used_col: cells.keys().map(|(_, c)| *c).max(),
                ..Default::default()
            };
        }

        match workbook.worksheet_merge_cells(&name) {
            Some(Ok(regions)) => {
                for region in regions {
                    sheet.push_merge(format!(
                        "{}{}:{}{}",
                        column_letter(region.start.1 as usize),
                        region.start.0 + 1,
                        column_letter(region.end.1 as usize),
                        region.end.0 + 1
                    ));
                }
            }
            Some(Err(e)) => warn!(sheet = %name, error = %e, "merge regions could not be read"),
            None => {}
        }

        debug!(sheet = %name, cells = cells.len(), "loaded sheet");
        for ((row, col), cell) in cells {
            sheet.set_cell(row, col, cell);
        }
        sheets.push(sheet);
    }

    Ok(MemoryWorkbook::new(sheets))
}

fn origin<T>(range: &Range<T>) -> (usize, usize)
where
    T: calamine::CellType,
{
    let (row, col) = range.start().unwrap_or((0, 0));
    (row as usize, col as usize)
}

fn read_values(range: &Range<Data>) -> HashMap<(usize, usize), RawCell> {
    let (row0, col0) = origin(range);
    range
        .used_cells()
        .map(|(r, c, data)| ((row0 + r, col0 + c), RawCell::value(raw_value(data))))
        .collect()
}

/// Map a calamine value onto the raw cell model
pub fn raw_value(data: &Data) -> RawValue {
    match data {
        Data::Empty => RawValue::Empty,
        Data::Int(i) => RawValue::Number(*i as f64),
        Data::Float(f) => RawValue::Number(*f),
        Data::String(s) => RawValue::Text(s.clone()),
        Data::Bool(b) => RawValue::Bool(*b),
        Data::DateTime(dt) => RawValue::Date(dt.as_f64()),
        Data::DateTimeIso(s) => parse_iso(s)
            .map(RawValue::DateTime)
            .unwrap_or_else(|| RawValue::Text(s.clone())),
        Data::DurationIso(s) => RawValue::Text(s.clone()),
        Data::Error(e) => RawValue::Error(e.to_string()),
        #[allow(unreachable_patterns)]
        other => RawValue::Text(other.to_string()),
    }
}

fn parse_iso(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d"]
        .iter()
        .find_map(|format| {
            NaiveDateTime::parse_from_str(text, format).ok().or_else(|| {
                chrono::NaiveDate::parse_from_str(text, format)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
        })
        .map(|naive| naive.and_utc())
}
