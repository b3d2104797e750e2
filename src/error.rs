//! Error types for caseforge operations.
//!
//! Defines error types for the major subsystems:
//! - LLM provider transport and API failures
//! - Structured generation (extraction, deserialization, validation)
//! - Record log and tabular export I/O
//!
//! Configuration errors live next to the configuration in
//! [`crate::pipeline::config`], and pipeline errors next to the pipeline.

use thiserror::Error;

/// Errors that can occur while talking to an LLM provider.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Response blocked by provider: {0}")]
    Blocked(String),
}

/// A model response that could not be turned into a schema-conformant object.
///
/// Never retried by the caller: the pipeline instance that hits one stops.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("provider error: {0}")]
    Provider(#[from] LlmError),

    #[error("provider returned an empty response for schema '{schema}'")]
    EmptyResponse { schema: &'static str },

    #[error("no JSON object found in response for schema '{schema}'. Content starts with: '{preview}'")]
    NoJson {
        schema: &'static str,
        preview: String,
    },

    #[error("JSON for schema '{schema}' appears truncated ({unclosed_braces} unclosed braces)")]
    Truncated {
        schema: &'static str,
        unclosed_braces: usize,
    },

    #[error("response does not match schema '{schema}': {reason}")]
    Deserialize {
        schema: &'static str,
        reason: String,
    },

    #[error("schema '{schema}' constraint violated: {reason}")]
    SchemaViolation {
        schema: &'static str,
        reason: String,
    },
}

/// Errors raised by the record log and the tabular export.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Corrupt record log at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    #[error("Tabular export failed: {0}")]
    Export(String),
}

impl From<arrow::error::ArrowError> for SinkError {
    fn from(err: arrow::error::ArrowError) -> Self {
        SinkError::Export(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for SinkError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        SinkError::Export(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for SinkError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        SinkError::Export(err.to_string())
    }
}

impl From<calamine::XlsxError> for SinkError {
    fn from(err: calamine::XlsxError) -> Self {
        SinkError::Export(err.to_string())
    }
}
