//! Excel-compatible workbook decoding
//!
//! - [`reader`]: the workbook reader seam and an in-memory implementation
//! - [`calamine_reader`]: `.xlsx` loading
//! - [`decoder`]: dimensions, cell values, styles and merges into [`Worksheet`]s
//! - [`time_serial`], [`color`], [`border`], [`merge`]: the resolvers the decoder uses

pub mod border;
pub mod calamine_reader;
pub mod color;
pub mod decoder;
pub mod merge;
pub mod reader;
pub mod time_serial;
pub mod worksheet;

pub use border::{BorderEdge, BorderStyleResolver, CellBorder, DashPattern, EdgeSource};
pub use color::{apply_tint, ColorDescriptor, ColorResolver, ColorRole};
pub use decoder::ExcelImportDecoder;
pub use merge::{parse_range, MergeMap, MergeRange, Span};
pub use reader::{
    MemorySheet, MemoryWorkbook, RawCell, RawStyle, RawValue, SheetDimensions, SheetReader,
    WorkbookReader,
};
pub use worksheet::{CellData, CellKind, CellStyle, Worksheet};
