//! Tabular export of the record log as an Excel workbook.
//!
//! A single `records` worksheet: a bold header row with [`RECORD_COLUMNS`],
//! then one row per record. Ids and the rating are numeric cells; absent
//! optionals are left empty.

use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook, Worksheet};

use super::table::{parse_label, prepare_parent};
use crate::error::SinkError;
use crate::schema::record::RECORD_COLUMNS;
use crate::schema::Record;

/// Worksheet holding the records.
pub const SHEET_NAME: &str = "records";

enum Cell<'a> {
    Text(&'a str),
    Number(f64),
    Empty,
}

static EMPTY: Data = Data::Empty;

fn optional(value: &Option<String>) -> Cell<'_> {
    match value.as_deref() {
        Some(text) => Cell::Text(text),
        None => Cell::Empty,
    }
}

/// Cells of one record in [`RECORD_COLUMNS`] order.
fn cells(record: &Record) -> [Cell<'_>; RECORD_COLUMNS.len()] {
    [
        Cell::Number(f64::from(record.customer_id)),
        Cell::Text(&record.customer_name),
        Cell::Text(record.customer_type.as_str()),
        Cell::Text(&record.customer_phone_number),
        Cell::Text(&record.customer_address),
        Cell::Number(f64::from(record.service_id)),
        Cell::Text(&record.service_date),
        Cell::Text(record.service_channel.as_str()),
        Cell::Text(record.service_type.as_str()),
        Cell::Text(record.service_category.as_str()),
        Cell::Text(&record.problem_description),
        Cell::Text(record.service_status.as_str()),
        Cell::Text(&record.representative_name),
        Cell::Text(record.representative_department.as_str()),
        optional(&record.applied_solution),
        optional(&record.completion_date),
        Cell::Number(f64::from(record.satisfaction_rating)),
        Cell::Text(&record.customer_comment),
    ]
}

fn write_row(worksheet: &mut Worksheet, row: u32, record: &Record) -> Result<(), SinkError> {
    for (col, cell) in cells(record).into_iter().enumerate() {
        let col = col as u16;
        match cell {
            Cell::Text(text) => {
                worksheet.write_string(row, col, text)?;
            }
            Cell::Number(value) => {
                worksheet.write_number(row, col, value)?;
            }
            Cell::Empty => {}
        }
    }
    Ok(())
}

/// Write records to an `.xlsx` workbook, replacing any existing file.
pub fn write_workbook(records: &[Record], output_path: &Path) -> Result<u64, SinkError> {
    prepare_parent(output_path)?;

    let mut workbook = Workbook::new();
    // Pinned so rewriting the same records yields the same document.
    let created = ExcelDateTime::from_ymd(2000, 1, 1)?;
    workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));

    let header = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;
    for (col, name) in RECORD_COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header)?;
    }

    for (index, record) in records.iter().enumerate() {
        let row = u32::try_from(index + 1)
            .map_err(|_| SinkError::Export(format!("too many rows: {}", records.len())))?;
        write_row(worksheet, row, record)?;
    }

    workbook.save(output_path)?;
    Ok(std::fs::metadata(output_path)?.len())
}

/// Read records back from a workbook written by [`write_workbook`].
pub fn read_workbook(input_path: &Path) -> Result<Vec<Record>, SinkError> {
    // Surface a missing file as an I/O error, like the other formats.
    std::fs::metadata(input_path)?;

    let mut workbook: Xlsx<_> = open_workbook(input_path)?;
    let range = workbook.worksheet_range(SHEET_NAME)?;
    let mut rows = range.rows();

    let header: Vec<String> = rows
        .next()
        .map(|cells| cells.iter().map(|c| c.to_string()).collect())
        .unwrap_or_default();
    if !header.iter().map(String::as_str).eq(RECORD_COLUMNS.iter().copied()) {
        return Err(SinkError::Export(format!(
            "worksheet '{SHEET_NAME}' header does not match the record columns: {header:?}"
        )));
    }

    let records = rows
        .enumerate()
        .map(|(index, cells)| row_to_record(index, cells))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        path = %input_path.display(),
        rows = records.len(),
        "Workbook loaded"
    );
    Ok(records)
}

fn row_to_record(index: usize, cells: &[Data]) -> Result<Record, SinkError> {
    let cell = |col: usize| cells.get(col).unwrap_or(&EMPTY);
    let text = |col: usize| -> Option<String> {
        match cell(col) {
            Data::Empty => None,
            Data::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    };
    let required = |col: usize| -> Result<String, SinkError> {
        text(col).ok_or_else(|| {
            SinkError::Export(format!(
                "row {index}: empty cell in column '{}'",
                RECORD_COLUMNS[col]
            ))
        })
    };

    Ok(Record {
        customer_id: integer(index, 0, cell(0))?,
        customer_name: required(1)?,
        customer_type: parse_label(index, &required(2)?)?,
        customer_phone_number: required(3)?,
        customer_address: required(4)?,
        service_id: integer(index, 5, cell(5))?,
        service_date: required(6)?,
        service_channel: parse_label(index, &required(7)?)?,
        service_type: parse_label(index, &required(8)?)?,
        service_category: parse_label(index, &required(9)?)?,
        problem_description: required(10)?,
        service_status: parse_label(index, &required(11)?)?,
        representative_name: required(12)?,
        representative_department: parse_label(index, &required(13)?)?,
        applied_solution: text(14),
        completion_date: text(15),
        satisfaction_rating: integer(index, 16, cell(16))?,
        customer_comment: required(17)?,
    })
}

fn integer<T: TryFrom<i64>>(index: usize, col: usize, cell: &Data) -> Result<T, SinkError> {
    let value = match cell {
        Data::Int(v) => Some(*v),
        Data::Float(v) if v.fract() == 0.0 => Some(*v as i64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    value.and_then(|v| T::try_from(v).ok()).ok_or_else(|| {
        SinkError::Export(format!(
            "row {index}: column '{}' is not a valid integer: {cell:?}",
            RECORD_COLUMNS[col]
        ))
    })
}
