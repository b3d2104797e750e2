//! Bounded-concurrency batch execution.
//!
//! [`BatchOrchestrator::run_batch`] starts one future per record and joins
//! them all. A [`Semaphore`] caps how many hold a permit at once; the permit
//! is held for a pipeline's whole run and dropped when it settles. Every
//! pipeline runs to completion regardless of sibling failures, and the
//! [`BatchReport`] carries one outcome per index.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::Instrument;
use uuid::Uuid;

use super::record::{PipelineStage, RecordPipeline};
use crate::schema::Record;

/// Result of one pipeline instance.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Succeeded {
        index: usize,
        record: Record,
    },
    Failed {
        index: usize,
        stage: Option<PipelineStage>,
        message: String,
    },
}

impl RecordOutcome {
    pub fn index(&self) -> usize {
        match self {
            RecordOutcome::Succeeded { index, .. } | RecordOutcome::Failed { index, .. } => *index,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RecordOutcome::Succeeded { .. })
    }
}

/// Outcome of a whole batch, ordered by pipeline index.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Identifies the batch in logs.
    pub batch_id: Uuid,
    pub outcomes: Vec<RecordOutcome>,
    /// Most permits held at the same time.
    pub peak_in_flight: usize,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.outcomes.iter().filter_map(|o| match o {
            RecordOutcome::Succeeded { record, .. } => Some(record),
            RecordOutcome::Failed { .. } => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Counts permits currently held and the high-water mark.
#[derive(Debug, Default)]
struct PermitGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl PermitGauge {
    fn enter(&self) -> GaugeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard { gauge: self }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct GaugeGuard<'a> {
    gauge: &'a PermitGauge,
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs many [`RecordPipeline`] instances with bounded concurrency.
pub struct BatchOrchestrator {
    pipeline: Arc<RecordPipeline>,
    show_progress: bool,
}

impl BatchOrchestrator {
    pub fn new(pipeline: Arc<RecordPipeline>) -> Self {
        Self {
            pipeline,
            show_progress: false,
        }
    }

    /// Draw an `indicatif` progress bar while the batch runs.
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    /// Runs `pipeline_count` pipelines, at most `concurrency_limit` at once.
    ///
    /// Returns after every pipeline has settled. A limit of 0 is treated as 1.
    pub async fn run_batch(&self, pipeline_count: usize, concurrency_limit: usize) -> BatchReport {
        let start = Instant::now();
        let batch_id = Uuid::new_v4();
        let limiter = Arc::new(Semaphore::new(concurrency_limit.max(1)));
        let gauge = PermitGauge::default();
        let progress = self.progress_bar(pipeline_count);

        tracing::info!(
            %batch_id,
            records = pipeline_count,
            concurrency_limit,
            "Starting batch"
        );

        let futures: Vec<_> = (0..pipeline_count)
            .map(|index| {
                let limiter = Arc::clone(&limiter);
                let gauge = &gauge;
                let progress = progress.as_ref();
                async move {
                    let outcome = match limiter.acquire().await {
                        Ok(_permit) => {
                            let _held = gauge.enter();
                            self.run_one(index, progress).await
                        }
                        Err(e) => RecordOutcome::Failed {
                            index,
                            stage: None,
                            message: format!("Failed to acquire permit: {e}"),
                        },
                    };
                    if let Some(bar) = progress {
                        bar.inc(1);
                    }
                    outcome
                }
                .instrument(tracing::info_span!("record", %batch_id, index))
            })
            .collect();

        let outcomes = futures::future::join_all(futures).await;

        if let Some(bar) = progress {
            bar.finish_and_clear();
        }

        let report = BatchReport {
            batch_id,
            outcomes,
            peak_in_flight: gauge.peak(),
            elapsed: start.elapsed(),
        };
        tracing::info!(
            batch_id = %report.batch_id,
            succeeded = report.succeeded(),
            failed = report.failed(),
            peak_in_flight = report.peak_in_flight,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Batch settled"
        );
        report
    }

    async fn run_one(&self, index: usize, progress: Option<&ProgressBar>) -> RecordOutcome {
        match self.pipeline.run().await {
            Ok(record) => {
                tracing::debug!(
                    customer_id = record.customer_id,
                    service_id = record.service_id,
                    "Record stored"
                );
                RecordOutcome::Succeeded { index, record }
            }
            Err(err) => {
                let stage = err.stage();
                let log = || {
                    tracing::error!(
                        stage = stage.map(|s| s.as_str()).unwrap_or("unknown"),
                        "{err}"
                    )
                };
                // The bar shares stderr with the log output.
                match progress {
                    Some(bar) => bar.suspend(log),
                    None => log(),
                }
                RecordOutcome::Failed {
                    index,
                    stage,
                    message: err.to_string(),
                }
            }
        }
    }

    fn progress_bar(&self, total: usize) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} {elapsed} {msg:.green} {bar:30.green} [{pos}/{len}]",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█░░"),
        );
        bar.set_message("generating records");
        bar.enable_steady_tick(Duration::from_millis(100));
        Some(bar)
    }
}
