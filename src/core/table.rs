//! In-memory table engine
//!
//! Columns and rows live behind shared `Arc<Vec<_>>` handles. Every
//! structural change builds a new collection and swaps it in; snapshots taken
//! earlier keep pointing at the old one, so observers can diff.
//!
//! Filtering and sorting do not touch the stored order: they shape the
//! [`TableEngine::view`] returned to callers.

use crate::config::EngineConfig;
use crate::core::formula::FormulaEvaluator;
use crate::core::validation::{validate_value, ValidationIssue};
use crate::error::{GridError, GridResult};
use crate::types::{CellValue, Column, ColumnType, Row};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            other => Err(GridError::Parse(format!(
                "Unknown sort direction '{}' (use asc or desc)",
                other
            ))),
        }
    }
}

/// Active sort of the view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

/// Serializable form of a table, as stored by the hosting application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableDocument {
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

/// Cheap shared handle on the collections at one point in time
#[derive(Debug, Clone)]
pub struct TableSnapshot {
    pub columns: Arc<Vec<Column>>,
    pub rows: Arc<Vec<Row>>,
}

/// A column/row table with formula-aware reads
#[derive(Debug, Clone)]
pub struct TableEngine {
    columns: Arc<Vec<Column>>,
    rows: Arc<Vec<Row>>,
    /// column name -> lowercase substring
    filters: BTreeMap<String, String>,
    sort: Option<SortSpec>,
    evaluator: FormulaEvaluator,
    default_column_width: f64,
}

impl Default for TableEngine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl TableEngine {
    /// Create an empty table
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            columns: Arc::new(Vec::new()),
            rows: Arc::new(Vec::new()),
            filters: BTreeMap::new(),
            sort: None,
            evaluator: FormulaEvaluator::new(&config.formula),
            default_column_width: config.table.default_column_width,
        }
    }

    /// Load a table document, checking column names, formula pairing and row ids
    pub fn from_document(document: TableDocument, config: &EngineConfig) -> GridResult<Self> {
        let mut names = HashSet::new();
        for column in &document.columns {
            if !names.insert(column.name.as_str()) {
                return Err(GridError::Validation(format!(
                    "Duplicate column name '{}'",
                    column.name
                )));
            }
            column.check_formula_invariant().map_err(GridError::Validation)?;
        }

        let mut ids = HashSet::new();
        for row in &document.rows {
            if !ids.insert(row.id.as_str()) {
                return Err(GridError::Validation(format!(
                    "Duplicate row id '{}'",
                    row.id
                )));
            }
        }

        let mut engine = Self::new(config);
        engine.columns = Arc::new(document.columns);
        engine.rows = Arc::new(document.rows);
        Ok(engine)
    }

    /// Parse a YAML table document
    pub fn from_yaml_str(yaml: &str, config: &EngineConfig) -> GridResult<Self> {
        let document: TableDocument = serde_yaml::from_str(yaml)?;
        Self::from_document(document, config)
    }

    pub fn to_document(&self) -> TableDocument {
        TableDocument {
            columns: self.columns.as_ref().clone(),
            rows: self.rows.as_ref().clone(),
        }
    }

    pub fn with_evaluator(mut self, evaluator: FormulaEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn evaluator(&self) -> &FormulaEvaluator {
        &self.evaluator
    }

    //==========================================================================
    // Reads
    //==========================================================================

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            columns: Arc::clone(&self.columns),
            rows: Arc::clone(&self.rows),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn row(&self, id: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub fn active_filters(&self) -> &BTreeMap<String, String> {
        &self.filters
    }

    pub fn active_sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    /// Resolve a cell: the stored value, or the evaluated formula
    pub fn cell_value(&self, row: &Row, column: &Column) -> CellValue {
        match (&column.column_type, &column.formula) {
            (ColumnType::Formula, Some(formula)) => self
                .evaluator
                .evaluate(formula, row, &self.rows, &self.columns)
                .to_cell_value(),
            _ => row.get(&column.name).clone(),
        }
    }

    /// Display text of a cell, rendered by its column type
    pub fn display_value(&self, row: &Row, column: &Column) -> String {
        column.column_type.render(&self.cell_value(row, column))
    }

    //==========================================================================
    // Row operations
    //==========================================================================

    /// Append an empty row with a fresh id
    pub fn add_row(&mut self) -> Row {
        let row = Row::new(Uuid::new_v4().to_string());
        let mut rows = self.rows.as_ref().clone();
        rows.push(row.clone());
        self.rows = Arc::new(rows);
        row
    }

    /// Remove a row; unknown ids are ignored
    pub fn delete_row(&mut self, id: &str) {
        if self.row(id).is_none() {
            return;
        }
        let rows: Vec<Row> = self.rows.iter().filter(|r| r.id != id).cloned().collect();
        self.rows = Arc::new(rows);
    }

    /// Set one cell. A row that does not exist yet is created with only this entry.
    pub fn update_cell(&mut self, row_id: &str, column: &str, value: CellValue) {
        let mut rows = self.rows.as_ref().clone();
        match rows.iter_mut().find(|r| r.id == row_id) {
            Some(row) => {
                row.data.insert(column.to_string(), value);
            }
            None => {
                debug!(row_id, column, "update_cell created a missing row");
                let mut row = Row::new(row_id);
                row.data.insert(column.to_string(), value);
                rows.push(row);
            }
        }
        self.rows = Arc::new(rows);
    }

    /// Insert a copy of a row right after it, under a fresh id
    pub fn duplicate_row(&mut self, id: &str) -> Option<Row> {
        let index = self.rows.iter().position(|r| r.id == id)?;
        let copy = Row {
            id: Uuid::new_v4().to_string(),
            data: self.rows[index].data.clone(),
        };
        let mut rows = self.rows.as_ref().clone();
        rows.insert(index + 1, copy.clone());
        self.rows = Arc::new(rows);
        Some(copy)
    }

    //==========================================================================
    // Column operations
    //==========================================================================

    /// Add a column of the given type. Without a name it becomes `Column N`.
    pub fn add_column(&mut self, column_type: ColumnType, name: Option<&str>) -> GridResult<Column> {
        let name = match name {
            Some(name) => name.to_string(),
            None => self.next_column_name(),
        };
        self.insert_column(Column::new(name, column_type))
    }

    /// Add a formula column
    pub fn add_formula_column(&mut self, name: &str, formula: &str) -> GridResult<Column> {
        self.insert_column(Column::formula(name, formula))
    }

    /// Add a fully described column
    pub fn insert_column(&mut self, mut column: Column) -> GridResult<Column> {
        if column.name.trim().is_empty() {
            return Err(GridError::Validation("Column name must not be empty".to_string()));
        }
        if self.column(&column.name).is_some() {
            return Err(GridError::Validation(format!(
                "Column '{}' already exists",
                column.name
            )));
        }
        column.check_formula_invariant().map_err(GridError::Validation)?;
        if column.width.is_none() {
            column.width = Some(self.default_column_width);
        }

        let mut columns = self.columns.as_ref().clone();
        columns.push(column.clone());
        self.columns = Arc::new(columns);
        Ok(column)
    }

    fn next_column_name(&self) -> String {
        let mut n = self.columns.len() + 1;
        loop {
            let candidate = format!("Column {}", n);
            if self.column(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    /// Replace the formula of a formula column
    pub fn set_column_formula(&mut self, name: &str, formula: &str) -> GridResult<()> {
        let mut columns = self.columns.as_ref().clone();
        let column = columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| GridError::Validation(format!("Unknown column '{}'", name)))?;
        if !column.is_formula() {
            return Err(GridError::Validation(format!(
                "Column '{}' is not a formula column",
                name
            )));
        }
        column.formula = Some(formula.to_string());
        self.columns = Arc::new(columns);
        Ok(())
    }

    /// Rename a column and every row's entry for it. Unknown names are ignored.
    pub fn rename_column(&mut self, old: &str, new: &str) -> GridResult<()> {
        if old == new || self.column(old).is_none() {
            return Ok(());
        }
        if new.trim().is_empty() {
            return Err(GridError::Validation("Column name must not be empty".to_string()));
        }
        if self.column(new).is_some() {
            return Err(GridError::Validation(format!("Column '{}' already exists", new)));
        }

        let columns: Vec<Column> = self
            .columns
            .iter()
            .map(|c| {
                let mut c = c.clone();
                if c.name == old {
                    c.name = new.to_string();
                }
                c
            })
            .collect();
        let rows: Vec<Row> = self
            .rows
            .iter()
            .map(|r| {
                let mut r = r.clone();
                if let Some(value) = r.data.remove(old) {
                    r.data.insert(new.to_string(), value);
                }
                r
            })
            .collect();
        self.columns = Arc::new(columns);
        self.rows = Arc::new(rows);

        if let Some(substring) = self.filters.remove(old) {
            self.filters.insert(new.to_string(), substring);
        }
        if let Some(sort) = self.sort.as_mut().filter(|s| s.column == old) {
            sort.column = new.to_string();
        }
        Ok(())
    }

    /// Remove a column schema and strip it from every row. Unknown names are ignored.
    pub fn delete_column(&mut self, name: &str) {
        if self.column(name).is_none() {
            return;
        }
        let columns: Vec<Column> = self
            .columns
            .iter()
            .filter(|c| c.name != name)
            .cloned()
            .collect();
        let rows: Vec<Row> = self
            .rows
            .iter()
            .map(|r| {
                let mut r = r.clone();
                r.data.remove(name);
                r
            })
            .collect();
        self.columns = Arc::new(columns);
        self.rows = Arc::new(rows);

        self.filters.remove(name);
        if self.sort.as_ref().is_some_and(|s| s.column == name) {
            self.sort = None;
        }
    }

    /// Set a column's display width
    pub fn set_column_width(&mut self, name: &str, width: f64) {
        if self.column(name).is_none() {
            return;
        }
        let columns: Vec<Column> = self
            .columns
            .iter()
            .map(|c| {
                let mut c = c.clone();
                if c.name == name {
                    c.width = Some(width);
                }
                c
            })
            .collect();
        self.columns = Arc::new(columns);
    }

    //==========================================================================
    // View: filter + sort
    //==========================================================================

    /// Sort the view by a column and return it
    pub fn sort(&mut self, column: &str, direction: SortDirection) -> Vec<Row> {
        self.sort = Some(SortSpec {
            column: column.to_string(),
            direction,
        });
        self.view()
    }

    pub fn clear_sort(&mut self) {
        self.sort = None;
    }

    /// Filter the view by a case-insensitive substring of a column's value and
    /// return it. An empty substring removes that column's filter.
    pub fn filter(&mut self, column: &str, substring: &str) -> Vec<Row> {
        if substring.is_empty() {
            self.filters.remove(column);
        } else {
            self.filters
                .insert(column.to_string(), substring.to_lowercase());
        }
        self.view()
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    /// Rows passing every active filter, in the active sort order
    pub fn view(&self) -> Vec<Row> {
        let mut visible: Vec<Row> = self
            .rows
            .iter()
            .filter(|row| {
                self.filters.iter().all(|(column, substring)| {
                    self.text_of(row, column)
                        .to_lowercase()
                        .contains(substring.as_str())
                })
            })
            .cloned()
            .collect();

        if let Some(sort) = &self.sort {
            let mut keyed: Vec<(String, Row)> = visible
                .into_iter()
                .map(|row| (self.sort_key(&row, &sort.column), row))
                .collect();
            keyed.sort_by(|(a, _), (b, _)| match sort.direction {
                SortDirection::Asc => locale_compare(a, b),
                SortDirection::Desc => locale_compare(b, a),
            });
            visible = keyed.into_iter().map(|(_, row)| row).collect();
        }

        visible
    }

    fn text_of(&self, row: &Row, column: &str) -> String {
        match self.column(column) {
            Some(col) => self.cell_value(row, col).as_text(),
            None => row.get(column).as_text(),
        }
    }

    fn sort_key(&self, row: &Row, column: &str) -> String {
        match self.column(column) {
            Some(col) => col.column_type.sort_key(&self.cell_value(row, col)),
            None => row.get(column).as_text(),
        }
    }

    //==========================================================================
    // Validation
    //==========================================================================

    /// Validation issues of one row, keyed by column name
    pub fn validate_row(&self, row: &Row) -> Vec<(String, ValidationIssue)> {
        self.columns
            .iter()
            .filter(|c| !c.is_formula())
            .flat_map(|c| {
                validate_value(c, row.get(&c.name))
                    .into_iter()
                    .map(|issue| (c.name.clone(), issue))
            })
            .collect()
    }

    /// Validation issues of the whole table as (row id, column, issue)
    pub fn validate_all(&self) -> Vec<(String, String, ValidationIssue)> {
        self.rows
            .iter()
            .flat_map(|row| {
                self.validate_row(row)
                    .into_iter()
                    .map(|(column, issue)| (row.id.clone(), column, issue))
            })
            .collect()
    }
}

/// Locale-style string ordering: case-insensitive first, then lowercase
/// before uppercase at the first differing character
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    folded.then_with(|| {
        for (x, y) in a.chars().zip(b.chars()) {
            if x != y {
                return match (x.is_lowercase(), y.is_lowercase()) {
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    _ => x.cmp(&y),
                };
            }
        }
        a.len().cmp(&b.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_compare() {
        assert_eq!(locale_compare("a", "B"), Ordering::Less);
        assert_eq!(locale_compare("a", "A"), Ordering::Less);
        assert_eq!(locale_compare("a", "a2"), Ordering::Less);
        assert_eq!(locale_compare("b", "a2"), Ordering::Greater);
        assert_eq!(locale_compare("same", "same"), Ordering::Equal);
    }

    #[test]
    fn test_sort_direction_from_str() {
        assert_eq!("DESC".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert!("up".parse::<SortDirection>().is_err());
    }

    #[test]
    fn test_snapshot_survives_mutation() {
        let mut table = TableEngine::default();
        let row = table.add_row();
        let before = table.snapshot();
        table.update_cell(&row.id, "qty", CellValue::Number(3.0));

        assert!(before.rows[0].data.is_empty());
        assert_eq!(table.rows()[0].get("qty"), &CellValue::Number(3.0));
        assert!(!Arc::ptr_eq(&before.rows, &table.snapshot().rows));
    }

    #[test]
    fn test_next_column_name_skips_taken() {
        let mut table = TableEngine::default();
        table.add_column(ColumnType::Text, Some("Column 2")).unwrap();
        let column = table.add_column(ColumnType::Number, None).unwrap();
        assert_eq!(column.name, "Column 3");
        assert_eq!(column.width, Some(150.0));
    }
}
