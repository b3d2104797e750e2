//! Customer profile generated at the start of every record.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{require_text, wire_enum, StructuredOutput};

/// Smallest accepted customer id (6 digits).
pub const MIN_CUSTOMER_ID: u32 = 100_000;
/// Largest accepted customer id (8 digits).
pub const MAX_CUSTOMER_ID: u32 = 99_999_999;

wire_enum! {
    /// Customer type, either individual or business.
    CustomerType {
        Individual => "Individual",
        Business => "Business",
    }
}

/// A fictional customer located in the United States.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Customer {
    /// Customer ID number: a unique, randomly generated 6- to 8-digit number.
    #[serde(rename = "customer_id")]
    pub id: u32,
    /// Customer name, coherent with the customer type.
    #[serde(rename = "customer_name")]
    pub name: String,
    /// Customer phone number with a valid U.S. area code.
    #[serde(rename = "phone_number")]
    pub phone: String,
    /// Customer address: street, number, city, state and ZIP code.
    pub address: String,
    /// Customer type, either Individual or Business.
    pub customer_type: CustomerType,
}

impl StructuredOutput for Customer {
    const NAME: &'static str = "customer_info";

    fn validate(&self) -> Result<(), String> {
        if !(MIN_CUSTOMER_ID..=MAX_CUSTOMER_ID).contains(&self.id) {
            return Err(format!(
                "customer_id must have 6 to 8 digits, got {}",
                self.id
            ));
        }
        require_text("customer_name", &self.name)?;
        require_text("phone_number", &self.phone)?;
        require_text("address", &self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(id: u32) -> Customer {
        Customer {
            id,
            name: "Evelyn Marie Johnson".to_string(),
            phone: "(202) 555-0197".to_string(),
            address: "1425 Maplewood Ave, Washington, DC 20001".to_string(),
            customer_type: CustomerType::Individual,
        }
    }

    #[test]
    fn test_customer_id_digit_bounds() {
        assert!(customer(100_000).validate().is_ok());
        assert!(customer(752_134).validate().is_ok());
        assert!(customer(99_999_999).validate().is_ok());

        assert!(customer(99_999).validate().is_err());
        let err = customer(100_000_000).validate().unwrap_err();
        assert!(err.contains("6 to 8 digits"));
    }

    #[test]
    fn test_customer_requires_text_fields() {
        let mut blank = customer(482_736);
        blank.address = "   ".to_string();
        let err = blank.validate().unwrap_err();
        assert!(err.contains("address"));
    }

    #[test]
    fn test_customer_deserializes_model_output() {
        let json = r#"{
            "customer_id": 784512,
            "customer_name": "Thompson Technologies",
            "phone_number": "(646) 555-0198",
            "address": "1245 Biltmore Avenue, Asheville, NC 28803",
            "customer_type": "Business"
        }"#;
        let parsed: Customer = serde_json::from_str(json).expect("valid customer JSON");
        assert_eq!(parsed.id, 784_512);
        assert_eq!(parsed.customer_type, CustomerType::Business);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_customer_rejects_unknown_type() {
        let json = r#"{
            "customer_id": 784512,
            "customer_name": "Thompson Technologies",
            "phone_number": "(646) 555-0198",
            "address": "1245 Biltmore Avenue, Asheville, NC 28803",
            "customer_type": "Government"
        }"#;
        assert!(serde_json::from_str::<Customer>(json).is_err());
    }
}
