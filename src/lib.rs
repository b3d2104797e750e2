//! caseforge: synthetic customer-service record generator.
//!
//! An LLM first builds a roster of service representatives, then generates
//! each record as a customer, a service case, a representative assignment and
//! the customer's feedback. Records are appended to a JSONL log and exported
//! to an Excel workbook or a Parquet file at the end of a batch.

pub mod cli;
pub mod error;
pub mod export;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod schema;
pub mod storage;
pub mod utils;

// Re-export commonly used error types
pub use error::{GenerationError, LlmError, SinkError};
pub use pipeline::{ConfigError, PipelineError};
