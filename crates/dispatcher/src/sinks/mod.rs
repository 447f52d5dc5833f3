//! Sink implementations
//!
//! Contains CsvFileSink, ConsoleSink, and LogSink.

mod console;
mod csv;
mod log;

pub use self::console::ConsoleSink;
pub use self::csv::{CsvFileSink, CsvLayout, WriteMode};
pub use self::log::LogSink;

use contracts::{Column, Table};

/// Columns a sink renders for the given layout
pub(crate) fn layout_columns(table: &Table, layout: CsvLayout) -> Vec<Column> {
    match layout {
        CsvLayout::Full => table.columns().collect(),
        CsvLayout::Report => table.report_projection(),
    }
}
