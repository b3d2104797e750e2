//! Generation of one complete record.
//!
//! A [`RecordPipeline`] walks a fixed sequence of states. Each transition is
//! one structured generation call, except the last which writes to the sink.
//! A failed transition ends the instance; nothing reaches the sink.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::sampling::CaseSampler;
use crate::error::{GenerationError, SinkError};
use crate::llm::StructuredClient;
use crate::prompts::{self, PromptError};
use crate::schema::{Customer, Feedback, Record, Representative, ServiceCase, StructuredOutput};
use crate::storage::RecordSink;

/// Step of record generation, named as it appears in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Roster warm-up, before any record pipeline starts.
    GenerateServiceRepresentative,
    GenerateCustomerInfo,
    GenerateServiceDetails,
    PickServiceRepresentative,
    GenerateFeedback,
    StoreRecord,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::GenerateServiceRepresentative => "generate_service_representative",
            PipelineStage::GenerateCustomerInfo => "generate_customer_info",
            PipelineStage::GenerateServiceDetails => "generate_service_details",
            PipelineStage::PickServiceRepresentative => "pick_service_representative",
            PipelineStage::GenerateFeedback => "generate_feedback",
            PipelineStage::StoreRecord => "store_record",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that end a pipeline instance or the roster warm-up.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A generation call failed.
    #[error("error in {stage}: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: GenerationError,
    },

    /// A prompt template failed to render.
    #[error("error in {stage}: {source}")]
    Prompt {
        stage: PipelineStage,
        #[source]
        source: PromptError,
    },

    /// The record could not be appended.
    #[error("error in store_record: {0}")]
    Store(#[from] SinkError),

    /// Warm-up ended without a usable roster.
    #[error("representative roster incomplete: {0}")]
    Roster(String),
}

impl PipelineError {
    /// Stage that failed, if the error belongs to one.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            PipelineError::Stage { stage, .. } | PipelineError::Prompt { stage, .. } => {
                Some(*stage)
            }
            PipelineError::Store(_) => Some(PipelineStage::StoreRecord),
            PipelineError::Roster(_) => Some(PipelineStage::GenerateServiceRepresentative),
        }
    }

    pub(crate) fn at(stage: PipelineStage) -> impl FnOnce(GenerationError) -> Self {
        move |source| PipelineError::Stage { stage, source }
    }

    pub(crate) fn prompt_at(stage: PipelineStage) -> impl FnOnce(PromptError) -> Self {
        move |source| PipelineError::Prompt { stage, source }
    }
}

/// Progress of one pipeline instance. Each variant owns what it has so far.
#[derive(Debug)]
enum PipelineState {
    AwaitingCustomer,
    HaveCustomer(Customer),
    HaveCase {
        customer: Customer,
        case: ServiceCase,
    },
    HaveRepresentative {
        customer: Customer,
        case: ServiceCase,
        representative: Representative,
    },
    HaveFeedback(Record),
    Done(Record),
}

impl PipelineState {
    /// Stage the next transition runs.
    fn next_stage(&self) -> PipelineStage {
        match self {
            PipelineState::AwaitingCustomer => PipelineStage::GenerateCustomerInfo,
            PipelineState::HaveCustomer(_) => PipelineStage::GenerateServiceDetails,
            PipelineState::HaveCase { .. } => PipelineStage::PickServiceRepresentative,
            PipelineState::HaveRepresentative { .. } => PipelineStage::GenerateFeedback,
            PipelineState::HaveFeedback(_) | PipelineState::Done(_) => PipelineStage::StoreRecord,
        }
    }
}

/// Everything a record needs, shared by every instance in a batch.
pub struct RecordPipeline {
    client: StructuredClient,
    sampler: Arc<CaseSampler>,
    roster: Arc<[Representative]>,
    sink: Arc<dyn RecordSink>,
}

impl RecordPipeline {
    pub fn new(
        client: StructuredClient,
        sampler: Arc<CaseSampler>,
        roster: Arc<[Representative]>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            client,
            sampler,
            roster,
            sink,
        }
    }

    /// Runs one instance to completion and returns the stored record.
    pub async fn run(&self) -> Result<Record, PipelineError> {
        let mut state = PipelineState::AwaitingCustomer;
        loop {
            let stage = state.next_stage();
            state = match state {
                PipelineState::Done(record) => return Ok(record),
                other => self.advance(other).await?,
            };
            tracing::debug!(stage = %stage, "Stage complete");
        }
    }

    async fn advance(&self, state: PipelineState) -> Result<PipelineState, PipelineError> {
        Ok(match state {
            PipelineState::AwaitingCustomer => {
                PipelineState::HaveCustomer(self.generate_customer_info().await?)
            }
            PipelineState::HaveCustomer(customer) => {
                let case = self.generate_service_details(&customer).await?;
                PipelineState::HaveCase { customer, case }
            }
            PipelineState::HaveCase { customer, case } => {
                let representative = self.pick_service_representative(&case).await?;
                PipelineState::HaveRepresentative {
                    customer,
                    case,
                    representative,
                }
            }
            PipelineState::HaveRepresentative {
                customer,
                case,
                representative,
            } => {
                let feedback = self
                    .generate_feedback(&customer, &case, &representative)
                    .await?;
                PipelineState::HaveFeedback(Record::assemble(
                    customer,
                    case,
                    &representative,
                    feedback,
                ))
            }
            PipelineState::HaveFeedback(record) => {
                self.sink.append(&record).await?;
                PipelineState::Done(record)
            }
            done @ PipelineState::Done(_) => done,
        })
    }

    async fn generate_customer_info(&self) -> Result<Customer, PipelineError> {
        let stage = PipelineStage::GenerateCustomerInfo;
        let draw = self.sampler.customer();
        let prompt = prompts::customer_prompt(&draw).map_err(PipelineError::prompt_at(stage))?;
        let customer: Customer = self
            .client
            .generate(&prompt)
            .await
            .map_err(PipelineError::at(stage))?;
        if customer.customer_type != draw.customer_type {
            tracing::warn!(
                requested = %draw.customer_type,
                returned = %customer.customer_type,
                "Model changed the customer type"
            );
        }
        Ok(customer)
    }

    async fn generate_service_details(
        &self,
        customer: &Customer,
    ) -> Result<ServiceCase, PipelineError> {
        let stage = PipelineStage::GenerateServiceDetails;
        let draw = self.sampler.case();
        let prompt = prompts::service_case_prompt(customer, &draw)
            .map_err(PipelineError::prompt_at(stage))?;
        let case: ServiceCase = self
            .client
            .generate(&prompt)
            .await
            .map_err(PipelineError::at(stage))?;
        let drifted = draw.mismatches(&case);
        if !drifted.is_empty() {
            tracing::warn!(
                service_id = case.id,
                fields = ?drifted,
                "Model changed sampled case attributes"
            );
        }
        Ok(case)
    }

    async fn pick_service_representative(
        &self,
        case: &ServiceCase,
    ) -> Result<Representative, PipelineError> {
        let stage = PipelineStage::PickServiceRepresentative;
        let prompt = prompts::pick_representative_prompt(&self.roster, case)
            .map_err(PipelineError::prompt_at(stage))?;
        let pick: Representative = self
            .client
            .generate(&prompt)
            .await
            .map_err(PipelineError::at(stage))?;

        resolve_pick(&self.roster, &pick).cloned().ok_or_else(|| {
            PipelineError::at(stage)(GenerationError::SchemaViolation {
                schema: Representative::NAME,
                reason: format!(
                    "'{}' ({}) is not on the roster",
                    pick.name, pick.department
                ),
            })
        })
    }

    async fn generate_feedback(
        &self,
        customer: &Customer,
        case: &ServiceCase,
        representative: &Representative,
    ) -> Result<Feedback, PipelineError> {
        let stage = PipelineStage::GenerateFeedback;
        let rating = self.sampler.rating();
        let prompt = prompts::feedback_prompt(customer, case, representative, rating)
            .map_err(PipelineError::prompt_at(stage))?;
        let feedback: Feedback = self
            .client
            .generate(&prompt)
            .await
            .map_err(PipelineError::at(stage))?;

        feedback.reconcile(case).map_err(|reason| {
            PipelineError::at(stage)(GenerationError::SchemaViolation {
                schema: Feedback::NAME,
                reason,
            })
        })
    }
}

/// Matches the model's pick to a roster member.
///
/// Exact name and department first, then the first member of the department.
pub fn resolve_pick<'a>(
    roster: &'a [Representative],
    pick: &Representative,
) -> Option<&'a Representative> {
    let name = pick.name.trim();
    roster
        .iter()
        .find(|r| r.department == pick.department && r.name.trim().eq_ignore_ascii_case(name))
        .or_else(|| roster.iter().find(|r| r.department == pick.department))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::testing::ScriptedProvider;
    use crate::schema::{Department, ServiceCategory, ServiceChannel, ServiceStatus};
    use crate::storage::JsonlRecordLog;
    use tempfile::TempDir;

    pub(crate) const CUSTOMER: &str = r#"{"customer_id": 482736, "customer_name": "Wellington Rodriguez", "phone_number": "312-555-1234", "address": "457 Lake Shore Drive, Chicago, IL 60614", "customer_type": "Individual"}"#;
    pub(crate) const CASE_RESOLVED: &str = r#"{"service_id": 382, "date_and_time": "2023-10-10T14:30:00Z", "service_channel": "WhatsApp", "service_type": "Complaint", "problem_description": "Bundle discount was not applied at checkout.", "service_category": "Commercial", "service_status": "Resolved"}"#;
    pub(crate) const CASE_OPEN: &str = r#"{"service_id": 117, "date_and_time": "2024-08-23T17:22:00Z", "service_channel": "Chatbot", "service_type": "Inquiry", "problem_description": "Monitoring devices disconnect intermittently.", "service_category": "Technical", "service_status": "In progress"}"#;
    pub(crate) const PICK_SALES: &str =
        r#"{"representative_name": "Olivia Bennett", "department": "Sales"}"#;
    pub(crate) const FEEDBACK_RESOLVED: &str = r#"{"applied_solution": "Partial refund issued and promotion rule fixed.", "completion_date": "2023-10-11T09:15:00Z", "satisfaction_rating": 4, "customer_comment": "Quick fix, friendly agent."}"#;

    pub(crate) fn roster() -> Arc<[Representative]> {
        vec![
            Representative {
                name: "Priya Caldwell".to_string(),
                department: Department::Support,
            },
            Representative {
                name: "Olivia Bennett".to_string(),
                department: Department::Sales,
            },
            Representative {
                name: "Marcus Whitfield".to_string(),
                department: Department::Finance,
            },
        ]
        .into()
    }

    fn happy_provider() -> ScriptedProvider {
        ScriptedProvider::new()
            .on("customer_info", CUSTOMER)
            .on("service_details", CASE_RESOLVED)
            .on("service_representative", PICK_SALES)
            .on("solution_and_feedback", FEEDBACK_RESOLVED)
    }

    fn pipeline(provider: Arc<ScriptedProvider>, dir: &TempDir) -> (RecordPipeline, Arc<JsonlRecordLog>) {
        let log = Arc::new(JsonlRecordLog::new(dir.path().join("output.jsonl")));
        let pipeline = RecordPipeline::new(
            StructuredClient::new(provider),
            Arc::new(CaseSampler::new(Some(1))),
            roster(),
            log.clone(),
        );
        (pipeline, log)
    }

    #[tokio::test]
    async fn test_run_writes_assembled_record() {
        let dir = TempDir::new().expect("tempdir");
        let provider = Arc::new(happy_provider());
        let (pipeline, log) = pipeline(provider.clone(), &dir);

        let record = pipeline.run().await.expect("pipeline succeeds");
        assert_eq!(record.customer_id, 482_736);
        assert_eq!(record.service_status, ServiceStatus::Resolved);
        assert_eq!(record.representative_name, "Olivia Bennett");
        assert_eq!(record.representative_department, Department::Sales);
        assert_eq!(
            record.completion_date.as_deref(),
            Some("2023-10-11T09:15:00Z")
        );

        assert_eq!(provider.calls(), 4);
        assert_eq!(log.read_all().await.expect("readable"), vec![record]);
    }

    #[tokio::test]
    async fn test_prompts_carry_earlier_results() {
        let dir = TempDir::new().expect("tempdir");
        let provider = Arc::new(happy_provider());
        let (pipeline, _log) = pipeline(provider.clone(), &dir);
        pipeline.run().await.expect("pipeline succeeds");

        let case_prompt = &provider.prompts_for("service_details")[0];
        assert!(case_prompt.contains("Wellington Rodriguez"));

        let pick_prompt = &provider.prompts_for("service_representative")[0];
        assert!(pick_prompt.contains("Marcus Whitfield"));
        assert!(pick_prompt.contains("Service ID: 382"));

        let feedback_prompt = &provider.prompts_for("solution_and_feedback")[0];
        assert!(feedback_prompt.contains("Representative name: Olivia Bennett"));
        assert!(feedback_prompt.contains("Customer ID: 482736"));
    }

    #[tokio::test]
    async fn test_unresolved_case_drops_resolution_fields() {
        let dir = TempDir::new().expect("tempdir");
        let provider = Arc::new(
            happy_provider()
                .on("service_details", CASE_OPEN)
                .on("solution_and_feedback", FEEDBACK_RESOLVED),
        );
        // The first scripted case is resolved; consume it with a throwaway run.
        let (pipeline, log) = pipeline(provider, &dir);
        pipeline.run().await.expect("first run");

        let record = pipeline.run().await.expect("second run");
        assert_eq!(record.service_status, ServiceStatus::InProgress);
        assert!(record.applied_solution.is_none());
        assert!(record.completion_date.is_none());
        assert_eq!(log.read_all().await.expect("readable").len(), 2);
    }

    #[tokio::test]
    async fn test_failure_names_stage_and_writes_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let provider = Arc::new(
            happy_provider()
                .fail("solution_and_feedback", || LlmError::RateLimited("quota".into())),
        );
        // `fail` appends after the happy reply; skip it with a first run.
        let (pipeline, log) = pipeline(provider, &dir);
        pipeline.run().await.expect("first run");

        let err = pipeline.run().await.unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::GenerateFeedback));
        assert!(err.to_string().starts_with("error in generate_feedback"));
        assert_eq!(log.read_all().await.expect("readable").len(), 1);
    }

    #[tokio::test]
    async fn test_customer_failure_skips_later_stages() {
        let dir = TempDir::new().expect("tempdir");
        let provider = Arc::new(
            ScriptedProvider::new()
                .fail("customer_info", || LlmError::RequestFailed("connection reset".into()))
                .on("service_details", CASE_RESOLVED),
        );
        let (pipeline, log) = pipeline(provider.clone(), &dir);

        let err = pipeline.run().await.unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::GenerateCustomerInfo));
        assert_eq!(provider.calls_for("customer_info"), 1);
        assert_eq!(provider.calls_for("service_details"), 0);
        assert_eq!(provider.calls_for("solution_and_feedback"), 0);
        assert!(log.read_all().await.is_err());
    }

    #[tokio::test]
    async fn test_case_keeps_model_attributes_when_they_drift() {
        let dir = TempDir::new().expect("tempdir");
        let provider = Arc::new(happy_provider());
        let (pipeline, log) = pipeline(provider, &dir);

        for _ in 0..5 {
            let record = pipeline.run().await.expect("drift is not fatal");
            assert_eq!(record.service_channel, ServiceChannel::WhatsApp);
            assert_eq!(record.service_category, ServiceCategory::Commercial);
            assert_eq!(record.service_status, ServiceStatus::Resolved);
        }
        assert_eq!(log.read_all().await.expect("readable").len(), 5);
    }

    #[tokio::test]
    async fn test_resolved_feedback_without_date_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let provider = Arc::new(
            happy_provider().on(
                "solution_and_feedback",
                r#"{"applied_solution": "Refunded", "completion_date": "", "satisfaction_rating": 3, "customer_comment": "Fine."}"#,
            ),
        );
        let (pipeline, _log) = pipeline(provider, &dir);
        pipeline.run().await.expect("first run");

        match pipeline.run().await.unwrap_err() {
            PipelineError::Stage {
                stage: PipelineStage::GenerateFeedback,
                source: GenerationError::SchemaViolation { reason, .. },
            } => assert!(reason.contains("completion_date")),
            other => panic!("expected feedback violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pick_outside_roster_fails() {
        let dir = TempDir::new().expect("tempdir");
        let provider = Arc::new(happy_provider());
        let log = Arc::new(JsonlRecordLog::new(dir.path().join("output.jsonl")));
        let support_only: Arc<[Representative]> = vec![Representative {
            name: "Priya Caldwell".to_string(),
            department: Department::Support,
        }]
        .into();
        let pipeline = RecordPipeline::new(
            StructuredClient::new(provider),
            Arc::new(CaseSampler::new(Some(1))),
            support_only,
            log,
        );

        let err = pipeline.run().await.unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::PickServiceRepresentative));
        assert!(err.to_string().contains("not on the roster"));
    }

    #[test]
    fn test_resolve_pick_prefers_exact_match() {
        let mut members = roster().to_vec();
        members.push(Representative {
            name: "Dana Whitaker".to_string(),
            department: Department::Sales,
        });

        let exact = Representative {
            name: " dana whitaker ".to_string(),
            department: Department::Sales,
        };
        assert_eq!(
            resolve_pick(&members, &exact).map(|r| r.name.as_str()),
            Some("Dana Whitaker")
        );

        let department_only = Representative {
            name: "Someone Else".to_string(),
            department: Department::Sales,
        };
        assert_eq!(
            resolve_pick(&members, &department_only).map(|r| r.name.as_str()),
            Some("Olivia Bennett")
        );
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(
            PipelineStage::GenerateCustomerInfo.to_string(),
            "generate_customer_info"
        );
        assert_eq!(
            PipelineStage::PickServiceRepresentative.to_string(),
            "pick_service_representative"
        );
        assert_eq!(PipelineStage::StoreRecord.to_string(), "store_record");
    }
}
