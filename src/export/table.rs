//! Format selection and the whole-log export.
//!
//! The table format follows the extension of the table path: `.xlsx` writes
//! an Excel workbook, `.parquet` a Parquet file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use super::parquet_writer::{read_parquet, write_parquet};
use super::xlsx_writer::{read_workbook, write_workbook};
use crate::error::SinkError;
use crate::schema::Record;
use crate::storage::read_records;

/// On-disk format of the exported table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Xlsx,
    Parquet,
}

impl TableFormat {
    /// Picks the format from the path's extension.
    pub fn from_path(path: &Path) -> Result<Self, SinkError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("xlsx") => Ok(TableFormat::Xlsx),
            Some("parquet") => Ok(TableFormat::Parquet),
            _ => Err(SinkError::Export(format!(
                "unsupported table extension for '{}' (expected .xlsx or .parquet)",
                path.display()
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TableFormat::Xlsx => "xlsx",
            TableFormat::Parquet => "parquet",
        }
    }

    /// Writes `records` to `path`, replacing any existing file. Returns the file size.
    pub fn write(&self, records: &[Record], path: &Path) -> Result<u64, SinkError> {
        match self {
            TableFormat::Xlsx => write_workbook(records, path),
            TableFormat::Parquet => write_parquet(records, path),
        }
    }

    pub fn read(&self, path: &Path) -> Result<Vec<Record>, SinkError> {
        match self {
            TableFormat::Xlsx => read_workbook(path),
            TableFormat::Parquet => read_parquet(path),
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an export produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub rows: usize,
    pub table_path: PathBuf,
    pub format: TableFormat,
    pub bytes: u64,
}

/// Writes `records` in the format implied by `path`.
pub fn write_table(records: &[Record], path: &Path) -> Result<u64, SinkError> {
    TableFormat::from_path(path)?.write(records, path)
}

/// Reads records back from a table written by [`write_table`].
pub fn read_table(path: &Path) -> Result<Vec<Record>, SinkError> {
    TableFormat::from_path(path)?.read(path)
}

/// Reads the whole record log and materializes it as a table.
///
/// The file write runs on the blocking pool. Running it twice without new
/// appends produces the same table.
pub async fn export_all(log_path: &Path, table_path: &Path) -> Result<ExportSummary, SinkError> {
    let format = TableFormat::from_path(table_path)?;
    let records = read_records(log_path).await?;
    let rows = records.len();

    let path = table_path.to_path_buf();
    let bytes = tokio::task::spawn_blocking(move || format.write(&records, &path))
        .await
        .map_err(|e| SinkError::Export(format!("export task failed: {e}")))??;

    tracing::info!(
        log = %log_path.display(),
        path = %table_path.display(),
        %format,
        rows,
        bytes,
        "Table written"
    );

    Ok(ExportSummary {
        rows,
        table_path: table_path.to_path_buf(),
        format,
        bytes,
    })
}

/// Creates the parent directory of `path` when it is missing.
pub(super) fn prepare_parent(path: &Path) -> Result<(), SinkError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Parses a wire label read back from a table cell.
pub(super) fn parse_label<T>(record_index: usize, value: &str) -> Result<T, SinkError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .parse()
        .map_err(|e| SinkError::Export(format!("row {record_index}: {e}")))
}
