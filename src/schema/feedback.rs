//! Resolution summary and customer feedback for a service case.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{parse_timestamp, require_text, ServiceCase, StructuredOutput};

/// Highest satisfaction rating on the 0–5 scale.
pub const MAX_RATING: u8 = 5;

/// Solution applied to a case and the customer's reaction to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Feedback {
    /// Summary of the resolution. Only when the service status is Resolved.
    #[serde(default)]
    pub applied_solution: Option<String>,
    /// Completion date and time, after the service date. Only when the service status is Resolved.
    #[serde(default)]
    pub completion_date: Option<String>,
    /// Customer satisfaction rating (scale from 0 to 5).
    pub satisfaction_rating: u8,
    /// Customer comment, consistent with the satisfaction rating.
    pub customer_comment: String,
}

impl Feedback {
    /// Reconciles the feedback with the case it belongs to.
    ///
    /// Blank strings count as absent. For unresolved cases the solution and
    /// completion date are dropped; for resolved cases both must be present
    /// and the completion date must come strictly after the service date.
    pub fn reconcile(mut self, case: &ServiceCase) -> Result<Self, String> {
        self.applied_solution = non_blank(self.applied_solution);
        self.completion_date = non_blank(self.completion_date);

        if !case.is_resolved() {
            if self.applied_solution.is_some() || self.completion_date.is_some() {
                tracing::debug!(
                    status = %case.status,
                    "Dropping resolution fields from unresolved case"
                );
            }
            self.applied_solution = None;
            self.completion_date = None;
            return Ok(self);
        }

        if self.applied_solution.is_none() {
            return Err("applied_solution is required when the case is Resolved".to_string());
        }
        let completion = self
            .completion_date
            .as_deref()
            .ok_or_else(|| "completion_date is required when the case is Resolved".to_string())?;

        let completed_at = parse_timestamp(completion)
            .ok_or_else(|| format!("completion_date '{completion}' is not an ISO-8601 timestamp"))?;
        let opened_at = parse_timestamp(&case.timestamp).ok_or_else(|| {
            format!(
                "service date '{}' is not an ISO-8601 timestamp",
                case.timestamp
            )
        })?;

        if completed_at <= opened_at {
            return Err(format!(
                "completion_date {completion} must be after service date {}",
                case.timestamp
            ));
        }

        Ok(self)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl StructuredOutput for Feedback {
    const NAME: &'static str = "solution_and_feedback";

    fn validate(&self) -> Result<(), String> {
        if self.satisfaction_rating > MAX_RATING {
            return Err(format!(
                "satisfaction_rating must be between 0 and {MAX_RATING}, got {}",
                self.satisfaction_rating
            ));
        }
        require_text("customer_comment", &self.customer_comment)
    }
}
