//! Merged-cell ranges
//!
//! A merge range is owned by its top-left origin cell. The origin spans the
//! whole block; every other cell inside it is hidden.

use crate::error::{GridError, GridResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Inclusive, zero-based merge block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRange {
    pub start_row: usize,
    pub end_row: usize,
    pub start_col: usize,
    pub end_col: usize,
    /// The range as written in the workbook, e.g. `A1:B2`; rebuilt from the
    /// corners when the range is clipped to the grid
    pub range_label: String,
}

impl MergeRange {
    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.start_row..=self.end_row).contains(&row)
            && (self.start_col..=self.end_col).contains(&col)
    }

    pub fn is_origin(&self, row: usize, col: usize) -> bool {
        row == self.start_row && col == self.start_col
    }

    pub fn overlaps(&self, other: &MergeRange) -> bool {
        self.start_row <= other.end_row
            && other.start_row <= self.end_row
            && self.start_col <= other.end_col
            && other.start_col <= self.end_col
    }

    pub fn row_span(&self) -> usize {
        self.end_row - self.start_row + 1
    }

    pub fn col_span(&self) -> usize {
        self.end_col - self.start_col + 1
    }

    /// `A1:B2` label of the current corners
    pub fn corner_label(&self) -> String {
        format!(
            "{}{}:{}{}",
            column_letter(self.start_col),
            self.start_row + 1,
            column_letter(self.end_col),
            self.end_row + 1
        )
    }
}

/// Row and column span of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub rows: usize,
    pub cols: usize,
}

impl Span {
    pub const SINGLE: Span = Span { rows: 1, cols: 1 };
}

/// Convert column number to Excel column letter (0 -> A, 25 -> Z, 26 -> AA)
pub fn column_letter(index: usize) -> String {
    let mut result = String::new();
    let mut n = index + 1;

    while n > 0 {
        let remainder = (n - 1) % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        n = (n - 1) / 26;
    }

    result
}

/// Convert Excel column letters to a zero-based index (A -> 0, AA -> 26)
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut index: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
    }
    Some(index - 1)
}

/// Parse a cell address like `B3` or `$B$3` into zero-based (row, col)
pub fn parse_address(address: &str) -> Option<(usize, usize)> {
    let address = address.trim().replace('$', "");
    let split = address.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = address.split_at(split);
    let col = column_index(letters)?;
    let row: usize = digits.parse().ok()?;
    Some((row.checked_sub(1)?, col))
}

/// Parse `A1:B2` into a merge range. Reversed corners are normalized.
pub fn parse_range(label: &str) -> GridResult<MergeRange> {
    let (first, second) = label
        .split_once(':')
        .ok_or_else(|| GridError::Parse(format!("Merge range '{}' has no ':'", label)))?;
    let bad_address = || GridError::Parse(format!("Invalid cell address in merge range '{}'", label));
    let (r1, c1) = parse_address(first).ok_or_else(bad_address)?;
    let (r2, c2) = parse_address(second).ok_or_else(bad_address)?;

    Ok(MergeRange {
        start_row: r1.min(r2),
        end_row: r1.max(r2),
        start_col: c1.min(c2),
        end_col: c1.max(c2),
        range_label: label.trim().to_string(),
    })
}

/// Merge ranges of one decoded grid
#[derive(Debug, Clone, Default)]
pub struct MergeMap {
    ranges: Vec<MergeRange>,
}

impl MergeMap {
    /// Build from parsed ranges for a `rows x cols` grid. Ranges starting
    /// outside the grid or overlapping an earlier range are dropped; ranges
    /// crossing the grid edge are clipped to it.
    pub fn new(ranges: impl IntoIterator<Item = MergeRange>, rows: usize, cols: usize) -> Self {
        let mut kept: Vec<MergeRange> = Vec::new();
        for mut range in ranges {
            if range.start_row >= rows || range.start_col >= cols {
                warn!(range = %range.range_label, rows, cols, "merge range outside grid dropped");
                continue;
            }
            if range.end_row >= rows || range.end_col >= cols {
                range.end_row = range.end_row.min(rows - 1);
                range.end_col = range.end_col.min(cols - 1);
                let clipped = range.corner_label();
                debug!(
                    range = %range.range_label,
                    clipped = %clipped,
                    "merge range clipped to grid"
                );
                range.range_label = clipped;
            }

            if let Some(earlier) = kept.iter().find(|k| k.overlaps(&range)) {
                warn!(
                    range = %range.range_label,
                    overlaps = %earlier.range_label,
                    "overlapping merge range dropped"
                );
                continue;
            }
            kept.push(range);
        }
        Self { ranges: kept }
    }

    /// Parse range labels, skipping malformed ones
    pub fn from_labels<S: AsRef<str>>(labels: &[S], rows: usize, cols: usize) -> Self {
        let parsed = labels.iter().filter_map(|label| match parse_range(label.as_ref()) {
            Ok(range) => Some(range),
            Err(e) => {
                warn!(error = %e, "malformed merge range skipped");
                None
            }
        });
        Self::new(parsed, rows, cols)
    }

    pub fn ranges(&self) -> &[MergeRange] {
        &self.ranges
    }

    pub fn range_at(&self, row: usize, col: usize) -> Option<&MergeRange> {
        self.ranges.iter().find(|r| r.contains(row, col))
    }

    /// Inside a merge range but not its origin
    pub fn is_hidden(&self, row: usize, col: usize) -> bool {
        self.range_at(row, col)
            .is_some_and(|r| !r.is_origin(row, col))
    }

    /// Full span for an origin cell, (1, 1) for everything else
    pub fn span_of(&self, row: usize, col: usize) -> Span {
        match self.range_at(row, col) {
            Some(r) if r.is_origin(row, col) => Span {
                rows: r.row_span(),
                cols: r.col_span(),
            },
            _ => Span::SINGLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A"), Some(0));
        assert_eq!(column_index("z"), Some(25));
        assert_eq!(column_index("AA"), Some(26));
        assert_eq!(column_index("AAA"), Some(702));
        assert_eq!(column_index(""), None);
        assert_eq!(column_index("A1"), None);
        for i in [0, 1, 25, 26, 51, 52, 701, 702, 16383] {
            assert_eq!(column_index(&column_letter(i)), Some(i));
        }
    }

    #[test]
    fn test_parse_range() {
        let range = parse_range("B3:D4").unwrap();
        assert_eq!(
            (range.start_row, range.end_row, range.start_col, range.end_col),
            (2, 3, 1, 3)
        );
        assert_eq!(range.range_label, "B3:D4");

        let reversed = parse_range("$D$4:$B$3").unwrap();
        assert_eq!((reversed.start_row, reversed.start_col), (2, 1));
        assert_eq!(reversed.corner_label(), "B3:D4");

        assert!(parse_range("B3").is_err());
        assert!(parse_range("A0:B2").is_err());
        assert!(parse_range("11:B2").is_err());
    }

    #[test]
    fn test_hidden_cells_exclude_origin() {
        let map = MergeMap::from_labels(&["A1:B2"], 10, 10);
        assert!(!map.is_hidden(0, 0));
        assert!(map.is_hidden(0, 1));
        assert!(map.is_hidden(1, 0));
        assert!(map.is_hidden(1, 1));
        assert!(!map.is_hidden(2, 0));
    }

    #[test]
    fn test_span_of() {
        let map = MergeMap::from_labels(&["B2:D3"], 10, 10);
        assert_eq!(map.span_of(1, 1), Span { rows: 2, cols: 3 });
        assert_eq!(map.span_of(1, 2), Span::SINGLE);
        assert_eq!(map.span_of(0, 0), Span::SINGLE);
    }

    #[test]
    fn test_overlap_outside_and_clip() {
        let map = MergeMap::from_labels(&["A1:B2", "B2:C3", "Z100:Z101", "C5:C9", "junk"], 6, 5);
        let labels: Vec<&str> = map.ranges().iter().map(|r| r.range_label.as_str()).collect();
        assert_eq!(labels, vec!["A1:B2", "C5:C6"]);

        let clipped = &map.ranges()[1];
        assert_eq!(clipped.end_row, 5);
        assert_eq!(clipped.range_label, clipped.corner_label());
        assert_eq!(map.span_of(4, 2), Span { rows: 2, cols: 1 });
    }
}
