//! Record persistence.
//!
//! Completed records go to an append-only JSONL log through the
//! [`RecordSink`] seam; [`crate::export`] turns the log into a table.

pub mod record_log;

pub use record_log::{read_records, JsonlRecordLog, RecordSink};
