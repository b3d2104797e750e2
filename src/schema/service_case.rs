//! Service case: the customer's contact with the service company.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{parse_timestamp, require_text, wire_enum, StructuredOutput};

/// Maximum length of a problem description, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 300;

wire_enum! {
    /// Service channel. Either Email, Chatbot, WhatsApp, Phone or Others.
    ServiceChannel {
        Email => "Email",
        Chatbot => "Chatbot",
        WhatsApp => "WhatsApp",
        Phone => "Phone",
        Other => "Others" | "Other",
    }
}

wire_enum! {
    /// Service type. Either Technical Support, Complaint, Inquiry or Quote Request.
    ServiceType {
        TechnicalSupport => "Technical Support",
        Complaint => "Complaint",
        Inquiry => "Inquiry",
        QuoteRequest => "Quote Request",
    }
}

wire_enum! {
    /// Service category. Either Financial, Technical or Commercial.
    ServiceCategory {
        Financial => "Financial",
        Technical => "Technical",
        Commercial => "Commercial",
    }
}

wire_enum! {
    /// Service status. Open, In Progress, Resolved, Pending or Cancelled.
    ServiceStatus {
        Open => "Open",
        InProgress => "In Progress" | "In progress",
        Resolved => "Resolved",
        Pending => "Pending",
        Cancelled => "Cancelled" | "Canceled",
    }
}

/// A single customer service interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ServiceCase {
    /// Service ID: a unique, randomly generated 3-digit number.
    #[serde(rename = "service_id")]
    pub id: u16,
    /// Date and time of the service, ISO-8601 (e.g. 2023-10-10T14:30:00Z).
    #[serde(rename = "date_and_time")]
    pub timestamp: String,
    /// Service channel. Either Email, Chatbot, WhatsApp, Phone or Others.
    #[serde(rename = "service_channel")]
    pub channel: ServiceChannel,
    /// Service type. Either Technical Support, Complaint, Inquiry or Quote Request.
    pub service_type: ServiceType,
    /// Technical, employee-style explanation of the issue (300 characters max).
    #[serde(rename = "problem_description")]
    pub description: String,
    /// Service category. Either Financial, Technical or Commercial.
    #[serde(rename = "service_category")]
    pub category: ServiceCategory,
    /// Service status. Open, In Progress, Resolved, Pending or Cancelled.
    #[serde(rename = "service_status")]
    pub status: ServiceStatus,
}

impl ServiceCase {
    pub fn is_resolved(&self) -> bool {
        self.status == ServiceStatus::Resolved
    }
}

impl StructuredOutput for ServiceCase {
    const NAME: &'static str = "service_details";

    fn validate(&self) -> Result<(), String> {
        if !(100..=999).contains(&self.id) {
            return Err(format!(
                "service_id must have exactly 3 digits, got {}",
                self.id
            ));
        }
        if parse_timestamp(&self.timestamp).is_none() {
            return Err(format!(
                "date_and_time '{}' is not an ISO-8601 timestamp",
                self.timestamp
            ));
        }
        require_text("problem_description", &self.description)?;
        let chars = self.description.chars().count();
        if chars > MAX_DESCRIPTION_CHARS {
            return Err(format!(
                "problem_description has {chars} characters, limit is {MAX_DESCRIPTION_CHARS}"
            ));
        }
        Ok(())
    }
}
