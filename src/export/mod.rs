//! Tabular export of the record log.
//!
//! The JSONL log is the source of truth; the table is rebuilt from it in full
//! on every export, as an Excel workbook or a Parquet file depending on the
//! table path's extension.

pub mod parquet_writer;
pub mod table;
pub mod xlsx_writer;

pub use parquet_writer::{read_parquet, record_schema, records_to_record_batch, write_parquet};
pub use table::{export_all, read_table, write_table, ExportSummary, TableFormat};
pub use xlsx_writer::{read_workbook, write_workbook};
