//! Record generation pipeline.
//!
//! # Architecture
//!
//! - **Config**: [`BatchConfig`], layered from defaults, a YAML file, the
//!   environment and CLI flags
//! - **Sampling**: [`CaseSampler`], the local random draws injected into prompts
//! - **Roster**: [`build_roster`], the once-per-batch representative warm-up
//! - **Record**: [`RecordPipeline`], four generation calls and one append
//! - **Orchestrator**: [`BatchOrchestrator`], bounded-concurrency fan-out
//!
//! # Pipeline Flow
//!
//! 1. **Warm-up**: build a roster covering every department
//! 2. **Customer**: generate a customer of a sampled type
//! 3. **Service case**: generate a case with sampled category, channel, type and status
//! 4. **Representative**: let the model pick a roster member for the case
//! 5. **Feedback**: generate the resolution and a comment for a sampled rating
//! 6. **Store**: append the flattened record to the log
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use caseforge::pipeline::{build_roster, BatchOrchestrator, CaseSampler, RecordPipeline};
//!
//! let roster = build_roster(&client, 4).await?;
//! let pipeline = RecordPipeline::new(client, Arc::new(CaseSampler::new(None)), roster, sink);
//! let report = BatchOrchestrator::new(Arc::new(pipeline)).run_batch(10, 5).await;
//! println!("{} stored, {} failed", report.succeeded(), report.failed());
//! ```

pub mod config;
pub mod orchestrator;
pub mod record;
pub mod roster;
pub mod sampling;

// Re-export main types for convenience
pub use config::{BatchConfig, ConfigError, FileConfig};
pub use orchestrator::{BatchOrchestrator, BatchReport, RecordOutcome};
pub use record::{resolve_pick, PipelineError, PipelineStage, RecordPipeline};
pub use roster::build_roster;
pub use sampling::{CaseDraw, CaseSampler, CustomerDraw, Gender};
