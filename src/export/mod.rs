//! Spreadsheet and terminal output.
//!
//! Reports describe their columns with [`ColumnSpec`]s and hand typed
//! [`ExportRow`]s to [`render`], which lays them out on an in-memory
//! [`Sheet`]. Nothing touches the filesystem until [`Sheet::save`].

mod render;
mod sheet;
mod table;

pub use render::{render, ColumnSpec, ExportRow, Field, GroupSpacing, StyleRule};
pub use sheet::{column_letter, CellValue, FontColor, NumberFormat, Sheet};
pub use table::terminal_table;
