//! Service representatives and the departments they belong to.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{require_text, wire_enum, StructuredOutput};

wire_enum! {
    /// Department. Either Support, Sales or Finance.
    Department {
        Support => "Support",
        Sales => "Sales",
        Finance => "Finance",
    }
}

/// A representative working at the service company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Representative {
    /// Representative name: a believable, creatively chosen American name.
    #[serde(rename = "representative_name")]
    pub name: String,
    /// Department. Either Support, Sales or Finance.
    pub department: Department,
}

impl StructuredOutput for Representative {
    const NAME: &'static str = "service_representative";

    fn validate(&self) -> Result<(), String> {
        require_text("representative_name", &self.name)
    }
}
