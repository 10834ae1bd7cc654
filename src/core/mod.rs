//! Table engine: formula evaluation, column validation and row/column operations

pub mod formula;
pub mod table;
pub mod validation;

pub use formula::{FormulaEvaluator, FormulaResult};
pub use table::{
    locale_compare, SortDirection, SortSpec, TableDocument, TableEngine, TableSnapshot,
};
pub use validation::{validate_value, ValidationIssue};
