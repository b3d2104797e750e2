//! Tabular export of the record log as Parquet.
//!
//! One row per logged record, columns in [`RECORD_COLUMNS`] order.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, StringArray, StringBuilder, UInt16Array, UInt16Builder, UInt32Array,
    UInt32Builder, UInt8Array, UInt8Builder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use super::table::{parse_label, prepare_parent};
use crate::error::SinkError;
use crate::schema::record::RECORD_COLUMNS;
use crate::schema::Record;

/// Arrow schema of the exported table.
pub fn record_schema() -> Schema {
    let fields = RECORD_COLUMNS
        .iter()
        .map(|name| match *name {
            "customer_id" => Field::new(*name, DataType::UInt32, false),
            "service_id" => Field::new(*name, DataType::UInt16, false),
            "satisfaction_rating" => Field::new(*name, DataType::UInt8, false),
            "applied_solution" | "completion_date" => Field::new(*name, DataType::Utf8, true),
            _ => Field::new(*name, DataType::Utf8, false),
        })
        .collect::<Vec<_>>();
    Schema::new(fields)
}

/// Convert records into an Arrow RecordBatch.
pub fn records_to_record_batch(records: &[Record]) -> Result<RecordBatch, SinkError> {
    let schema = Arc::new(record_schema());

    let mut customer_id = UInt32Builder::new();
    let mut customer_name = StringBuilder::new();
    let mut customer_type = StringBuilder::new();
    let mut customer_phone = StringBuilder::new();
    let mut customer_address = StringBuilder::new();
    let mut service_id = UInt16Builder::new();
    let mut service_date = StringBuilder::new();
    let mut service_channel = StringBuilder::new();
    let mut service_type = StringBuilder::new();
    let mut service_category = StringBuilder::new();
    let mut problem_description = StringBuilder::new();
    let mut service_status = StringBuilder::new();
    let mut representative_name = StringBuilder::new();
    let mut representative_department = StringBuilder::new();
    let mut applied_solution = StringBuilder::new();
    let mut completion_date = StringBuilder::new();
    let mut satisfaction_rating = UInt8Builder::new();
    let mut customer_comment = StringBuilder::new();

    for record in records {
        customer_id.append_value(record.customer_id);
        customer_name.append_value(&record.customer_name);
        customer_type.append_value(record.customer_type.as_str());
        customer_phone.append_value(&record.customer_phone_number);
        customer_address.append_value(&record.customer_address);
        service_id.append_value(record.service_id);
        service_date.append_value(&record.service_date);
        service_channel.append_value(record.service_channel.as_str());
        service_type.append_value(record.service_type.as_str());
        service_category.append_value(record.service_category.as_str());
        problem_description.append_value(&record.problem_description);
        service_status.append_value(record.service_status.as_str());
        representative_name.append_value(&record.representative_name);
        representative_department.append_value(record.representative_department.as_str());
        applied_solution.append_option(record.applied_solution.as_deref());
        completion_date.append_option(record.completion_date.as_deref());
        satisfaction_rating.append_value(record.satisfaction_rating);
        customer_comment.append_value(&record.customer_comment);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(customer_id.finish()),
        Arc::new(customer_name.finish()),
        Arc::new(customer_type.finish()),
        Arc::new(customer_phone.finish()),
        Arc::new(customer_address.finish()),
        Arc::new(service_id.finish()),
        Arc::new(service_date.finish()),
        Arc::new(service_channel.finish()),
        Arc::new(service_type.finish()),
        Arc::new(service_category.finish()),
        Arc::new(problem_description.finish()),
        Arc::new(service_status.finish()),
        Arc::new(representative_name.finish()),
        Arc::new(representative_department.finish()),
        Arc::new(applied_solution.finish()),
        Arc::new(completion_date.finish()),
        Arc::new(satisfaction_rating.finish()),
        Arc::new(customer_comment.finish()),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Write records to a Parquet file, replacing any existing file.
pub fn write_parquet(records: &[Record], output_path: &Path) -> Result<u64, SinkError> {
    let batch = records_to_record_batch(records)?;
    prepare_parent(output_path)?;

    let file = std::fs::File::create(output_path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(Default::default()))
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    if batch.num_rows() > 0 {
        writer.write(&batch)?;
    }
    writer.close()?;

    Ok(std::fs::metadata(output_path)?.len())
}

/// Read records back from a Parquet file written by [`write_parquet`].
pub fn read_parquet(input_path: &Path) -> Result<Vec<Record>, SinkError> {
    let file = std::fs::File::open(input_path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut records = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        let columns = TableColumns::from_batch(&batch)?;
        for row in 0..batch.num_rows() {
            records.push(columns.record(records.len(), row)?);
        }
    }

    tracing::debug!(
        path = %input_path.display(),
        rows = records.len(),
        "Parquet table loaded"
    );
    Ok(records)
}

/// Typed views of one batch's columns.
struct TableColumns<'a> {
    strings: Vec<&'a StringArray>,
    customer_id: &'a UInt32Array,
    service_id: &'a UInt16Array,
    satisfaction_rating: &'a UInt8Array,
}

impl<'a> TableColumns<'a> {
    fn from_batch(batch: &'a RecordBatch) -> Result<Self, SinkError> {
        let strings = RECORD_COLUMNS
            .iter()
            .filter(|name| {
                !matches!(
                    **name,
                    "customer_id" | "service_id" | "satisfaction_rating"
                )
            })
            .map(|name| column::<StringArray>(batch, name))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            strings,
            customer_id: column(batch, "customer_id")?,
            service_id: column(batch, "service_id")?,
            satisfaction_rating: column(batch, "satisfaction_rating")?,
        })
    }

    fn record(&self, record_index: usize, row: usize) -> Result<Record, SinkError> {
        // Utf8 columns in RECORD_COLUMNS order, numeric columns skipped.
        let text = |i: usize| -> Option<String> {
            let array = self.strings[i];
            (!array.is_null(row)).then(|| array.value(row).to_string())
        };
        let required = |i: usize| -> Result<String, SinkError> {
            text(i).ok_or_else(|| {
                SinkError::Export(format!("row {record_index}: unexpected null in column {i}"))
            })
        };

        Ok(Record {
            customer_id: self.customer_id.value(row),
            customer_name: required(0)?,
            customer_type: parse_label(record_index, &required(1)?)?,
            customer_phone_number: required(2)?,
            customer_address: required(3)?,
            service_id: self.service_id.value(row),
            service_date: required(4)?,
            service_channel: parse_label(record_index, &required(5)?)?,
            service_type: parse_label(record_index, &required(6)?)?,
            service_category: parse_label(record_index, &required(7)?)?,
            problem_description: required(8)?,
            service_status: parse_label(record_index, &required(9)?)?,
            representative_name: required(10)?,
            representative_department: parse_label(record_index, &required(11)?)?,
            applied_solution: text(12),
            completion_date: text(13),
            satisfaction_rating: self.satisfaction_rating.value(row),
            customer_comment: required(14)?,
        })
    }
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T, SinkError> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<T>())
        .ok_or_else(|| SinkError::Export(format!("column '{name}' is missing or mistyped")))
}
