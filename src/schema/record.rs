//! The flattened record written to the log and the tabular export.

use serde::{Deserialize, Serialize};

use super::{
    Customer, CustomerType, Department, Feedback, Representative, ServiceCase, ServiceCategory,
    ServiceChannel, ServiceStatus, ServiceType,
};

/// Column names in log and export order.
pub const RECORD_COLUMNS: [&str; 18] = [
    "customer_id",
    "customer_name",
    "customer_type",
    "customer_phone_number",
    "customer_address",
    "service_id",
    "service_date",
    "service_channel",
    "service_type",
    "service_category",
    "problem_description",
    "service_status",
    "representative_name",
    "representative_department",
    "applied_solution",
    "completion_date",
    "satisfaction_rating",
    "customer_comment",
];

/// One customer + one service case + one representative + one feedback.
///
/// Field order matches [`RECORD_COLUMNS`]; serde preserves it in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub customer_id: u32,
    pub customer_name: String,
    pub customer_type: CustomerType,
    pub customer_phone_number: String,
    pub customer_address: String,
    pub service_id: u16,
    pub service_date: String,
    pub service_channel: ServiceChannel,
    pub service_type: ServiceType,
    pub service_category: ServiceCategory,
    pub problem_description: String,
    pub service_status: ServiceStatus,
    pub representative_name: String,
    pub representative_department: Department,
    pub applied_solution: Option<String>,
    pub completion_date: Option<String>,
    pub satisfaction_rating: u8,
    pub customer_comment: String,
}

impl Record {
    pub fn assemble(
        customer: Customer,
        case: ServiceCase,
        representative: &Representative,
        feedback: Feedback,
    ) -> Self {
        Self {
            customer_id: customer.id,
            customer_name: customer.name,
            customer_type: customer.customer_type,
            customer_phone_number: customer.phone,
            customer_address: customer.address,
            service_id: case.id,
            service_date: case.timestamp,
            service_channel: case.channel,
            service_type: case.service_type,
            service_category: case.category,
            problem_description: case.description,
            service_status: case.status,
            representative_name: representative.name.clone(),
            representative_department: representative.department,
            applied_solution: feedback.applied_solution,
            completion_date: feedback.completion_date,
            satisfaction_rating: feedback.satisfaction_rating,
            customer_comment: feedback.customer_comment,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_serialized_field_order_matches_columns() {
        let json = serde_json::to_string(&resolved_record(482_736)).expect("serializable");
        let mut last = 0;
        for column in RECORD_COLUMNS {
            let pos = json
                .find(&format!("\"{column}\""))
                .unwrap_or_else(|| panic!("column {column} missing"));
            assert!(pos >= last, "column {column} out of order");
            last = pos;
        }
    }

    #[test]
    fn test_absent_optionals_serialize_as_null() {
        let json = serde_json::to_value(open_record(752_134)).expect("serializable");
        assert!(json["applied_solution"].is_null());
        assert!(json["completion_date"].is_null());
        assert_eq!(json["service_channel"], "Others");
        assert_eq!(json["service_status"], "Open");
    }

    #[test]
    fn test_assemble_flattens_all_parts() {
        let customer = Customer {
            id: 784_512,
            name: "Thompson Technologies".to_string(),
            phone: "(646) 555-0198".to_string(),
            address: "1245 Biltmore Avenue, Asheville, NC 28803".to_string(),
            customer_type: CustomerType::Business,
        };
        let case = ServiceCase {
            id: 117,
            timestamp: "2024-08-23T17:22:00Z".to_string(),
            channel: ServiceChannel::Chatbot,
            service_type: ServiceType::Inquiry,
            description: "Connectivity drops.".to_string(),
            category: ServiceCategory::Technical,
            status: ServiceStatus::InProgress,
        };
        let rep = Representative {
            name: "Priya Caldwell".to_string(),
            department: Department::Support,
        };
        let feedback = Feedback {
            applied_solution: None,
            completion_date: None,
            satisfaction_rating: 3,
            customer_comment: "Okay so far.".to_string(),
        };

        let record = Record::assemble(customer, case, &rep, feedback);
        assert_eq!(record.customer_id, 784_512);
        assert_eq!(record.customer_type, CustomerType::Business);
        assert_eq!(record.service_id, 117);
        assert_eq!(record.service_status, ServiceStatus::InProgress);
        assert_eq!(record.representative_department, Department::Support);
        assert_eq!(record.satisfaction_rating, 3);
    }
}
