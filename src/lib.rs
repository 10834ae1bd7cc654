//! gridforge - spreadsheet table engine
//!
//! Typed column/row tables with copy-on-write mutation, formula columns
//! evaluated against the whole table, and an Excel-compatible decode layer
//! that turns workbook cells into render-ready worksheets.
//!
//! # Features
//!
//! - Closed set of column types with rendering, sort keys and validation
//! - Aggregate (SUM, AVERAGE, COUNT, MAX, MIN), conditional and text formulas
//! - Arithmetic evaluated by a parser, never by executing code
//! - Serial date/time conversion, theme colors with tint, border inheritance
//! - Merged-cell mapping and capped sheet decoding
//!
//! # Example
//!
//! ```
//! use gridforge::config::EngineConfig;
//! use gridforge::core::{SortDirection, TableEngine};
//! use gridforge::types::{CellValue, ColumnType};
//!
//! let mut table = TableEngine::new(&EngineConfig::default());
//! table.add_column(ColumnType::Text, Some("name"))?;
//! table.add_column(ColumnType::Number, Some("qty"))?;
//! table.add_formula_column("total", "=SUM(qty)")?;
//!
//! for (name, qty) in [("bolt", 15.0), ("nut", 5.0)] {
//!     let row = table.add_row();
//!     table.update_cell(&row.id, "name", CellValue::from(name));
//!     table.update_cell(&row.id, "qty", CellValue::Number(qty));
//! }
//!
//! let view = table.sort("name", SortDirection::Desc);
//! assert_eq!(view[0].get("name"), &CellValue::from("nut"));
//!
//! let total = table.column("total").unwrap();
//! assert_eq!(table.cell_value(&view[0], total), CellValue::Number(20.0));
//! # Ok::<(), gridforge::error::GridError>(())
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod excel;
pub mod types;

// Re-export commonly used types
pub use config::EngineConfig;
pub use crate::core::{FormulaEvaluator, FormulaResult, TableEngine};
pub use error::{GridError, GridResult};
pub use excel::{ExcelImportDecoder, MemoryWorkbook, Worksheet};
pub use types::{CellValue, Column, ColumnType, Row};
