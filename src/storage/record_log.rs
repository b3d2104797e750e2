//! Append-only JSONL record log.
//!
//! One serialized [`Record`] per line. The file is never truncated by a
//! generation run and lines appear in completion order.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::SinkError;
use crate::schema::Record;

/// Destination for completed records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persists one record. Concurrent callers are serialized.
    async fn append(&self, record: &Record) -> Result<(), SinkError>;
}

/// [`RecordSink`] backed by a line-delimited JSON file.
#[derive(Debug)]
pub struct JsonlRecordLog {
    path: PathBuf,
    /// Held for the duration of one append so lines never interleave.
    write_lock: Mutex<()>,
}

impl JsonlRecordLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every record in the log. Blank lines are skipped.
    pub async fn read_all(&self) -> Result<Vec<Record>, SinkError> {
        read_records(&self.path).await
    }

    async fn ensure_parent(&self) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RecordSink for JsonlRecordLog {
    async fn append(&self, record: &Record) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        self.ensure_parent().await?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!(
            path = %self.path.display(),
            customer_id = record.customer_id,
            service_id = record.service_id,
            "Record appended"
        );
        Ok(())
    }
}

/// Reads every record from the log at `path`.
///
/// A line that does not deserialize into a [`Record`] fails the whole read
/// with [`SinkError::Corrupt`] carrying its 1-based line number.
pub async fn read_records(path: &Path) -> Result<Vec<Record>, SinkError> {
    let contents = fs::read_to_string(path).await?;
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| SinkError::Corrupt {
                line: index + 1,
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::record::fixtures::{open_record, resolved_record};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_creates_file_and_parent() {
        let dir = TempDir::new().expect("tempdir");
        let log = JsonlRecordLog::new(dir.path().join("data").join("output.jsonl"));

        log.append(&resolved_record(482_736)).await.expect("append");
        log.append(&open_record(752_134)).await.expect("append");

        let contents = std::fs::read_to_string(log.path()).expect("log exists");
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.ends_with('\n'));

        let records = log.read_all().await.expect("readable");
        assert_eq!(records, vec![resolved_record(482_736), open_record(752_134)]);
    }

    #[tokio::test]
    async fn test_append_never_truncates() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("output.jsonl");

        JsonlRecordLog::new(&path)
            .append(&resolved_record(100_001))
            .await
            .expect("first run");
        JsonlRecordLog::new(&path)
            .append(&resolved_record(100_002))
            .await
            .expect("second run");

        let records = read_records(&path).await.expect("readable");
        let ids: Vec<u32> = records.iter().map(|r| r.customer_id).collect();
        assert_eq!(ids, vec![100_001, 100_002]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_produce_whole_lines() {
        let dir = TempDir::new().expect("tempdir");
        let log = Arc::new(JsonlRecordLog::new(dir.path().join("output.jsonl")));

        let writes = (0..32u32).map(|i| {
            let log = Arc::clone(&log);
            async move { log.append(&resolved_record(200_000 + i)).await }
        });
        for result in futures::future::join_all(writes).await {
            result.expect("append");
        }

        let mut ids: Vec<u32> = log
            .read_all()
            .await
            .expect("every line parses")
            .iter()
            .map(|r| r.customer_id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (200_000..200_032).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_read_skips_blank_lines_and_reports_corrupt_line() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("output.jsonl");
        let good = serde_json::to_string(&open_record(300_000)).expect("serializable");

        std::fs::write(&path, format!("{good}\n\n{good}\n")).expect("write");
        assert_eq!(read_records(&path).await.expect("readable").len(), 2);

        std::fs::write(&path, format!("{good}\n{{\"customer_id\": 1}}\n")).expect("write");
        match read_records(&path).await.unwrap_err() {
            SinkError::Corrupt { line, .. } => assert_eq!(line, 2),
            other => panic!("expected corrupt line, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_missing_log_is_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let err = read_records(&dir.path().join("absent.jsonl"))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Io(_)));
    }
}
