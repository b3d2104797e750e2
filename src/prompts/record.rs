//! Prompts for the four per-record generation calls.

use tera::Context;

use super::{render, PromptError};
use crate::pipeline::sampling::{CaseDraw, CustomerDraw};
use crate::schema::{Customer, Representative, ServiceCase};

const CUSTOMER_TEMPLATE: &str = r#"
Generate a detailed and imaginative profile for a fictional customer in the United States.

### Required information

1. Customer Type: {{ customer_label }}
2. Customer Name: a believable and creatively chosen American name, coherent with the customer type.
3. Phone Number: a plausible U.S. phone number with a valid area code, formatted (XXX) XXX-XXXX or XXX-XXX-XXXX.
4. Address: a realistic and specific U.S. address with street, number, city, state and ZIP code.
5. Customer ID: a unique, randomly generated 6- to 8-digit number.

### Examples

- 482736; Wellington Rodriguez; 312-555-1234; 457 Lake Shore Drive, Chicago, IL 60614; Individual
- 784512; Thompson Technologies; (646) 555-0198; 1245 Biltmore Avenue, Asheville, NC 28803; Business
- 752134; Evelyn Marie Johnson; (202) 555-0197; 1425 Maplewood Ave, Washington, DC 20001; Individual
"#;

const SERVICE_CASE_TEMPLATE: &str = r#"
Given customer data, generate a detailed, realistic customer service interaction.

### Customer Data

- Customer Type: {{ customer.customer_type }}
- Customer Name: {{ customer.customer_name }}
- Phone Number: {{ customer.phone_number }}
- Address: {{ customer.address }}
- Customer ID: {{ customer.customer_id }}

### Instructions

1. Invent a plausible situation in which the customer contacts a third-party service provider about a {{ category }} issue.
   - The contact is made through {{ channel }}.
   - The request falls under the service type {{ service_type }}.
2. Describe the scenario with the required information below.

### Required information

- Service ID: a unique, randomly generated 3-digit number.
- Date and time: when the service took place, as an ISO-8601 timestamp.
- Service Channel: {{ channel }}
- Service Type: {{ service_type }}
- Service Category: {{ category }}
- Problem description: a technical, employee-style explanation of the issue, {{ max_description_chars }} characters at most.
- Service Status: {{ status }}

### Examples

- 382; 2023-10-10T14:30:00Z; WhatsApp; Complaint; Commercial; Customer reported via WhatsApp that a 25% promotional discount was not applied to a product bundle at checkout. A backend rule excluded bundles; a partial refund was issued and the rule fixed; Resolved
- 117; 2024-08-23T17:22:00Z; Chatbot; Inquiry; Technical; User asked about monitoring devices that disconnect intermittently despite a stable connection. Engineering is checking server latency and firmware; In Progress
"#;

const PICK_REPRESENTATIVE_TEMPLATE: &str = r#"
Given the service representatives of a company and the details of a service, pick the most adequate representative for the matter.
Answer with one of the listed representatives, using their exact name and department.

### Representatives
{% for rep in representatives %}
- Representative name: {{ rep.representative_name }}; Representative department: {{ rep.department }}
{%- endfor %}

### Service Details

{{ case_details }}
"#;

const FEEDBACK_TEMPLATE: &str = r#"
You will receive data about a customer service interaction at a service company.
Use it to describe the solution applied and the customer's feedback.

### Required information

- Applied solution: if the Service Status is Resolved, an employee-style summary of the solution. Otherwise leave it empty.
- Completion date: if the Service Status is Resolved, the ISO-8601 date and time the issue was solved, strictly after {{ case.date_and_time }}. Otherwise leave it empty.
- Satisfaction rating: {{ rating }} out of 5.
- Customer comment: detailed customer feedback, consistent with the satisfaction rating.

### Customer Service Data

- Customer Type: {{ customer.customer_type }}
- Customer Name: {{ customer.customer_name }}
- Phone Number: {{ customer.phone_number }}
- Address: {{ customer.address }}
- Customer ID: {{ customer.customer_id }}
{{ case_details }}
- Representative name: {{ representative.representative_name }}
- Representative department: {{ representative.department }}
"#;

const CASE_DETAILS_TEMPLATE: &str = r#"
- Service ID: {{ case.service_id }}
- Service Date and time: {{ case.date_and_time }}
- Service Channel: {{ case.service_channel }}
- Service Type: {{ case.service_type }}
- Service Category: {{ case.service_category }}
- Problem description: {{ case.problem_description }}
- Service Status: {{ case.service_status }}
"#;

pub fn customer_prompt(draw: &CustomerDraw) -> Result<String, PromptError> {
    let mut context = Context::new();
    context.insert("customer_label", &draw.label());
    render("customer", CUSTOMER_TEMPLATE, &context)
}

pub fn service_case_prompt(customer: &Customer, draw: &CaseDraw) -> Result<String, PromptError> {
    let mut context = Context::new();
    context.insert("customer", customer);
    context.insert("category", draw.category.as_str());
    context.insert("channel", draw.channel.as_str());
    context.insert("service_type", draw.service_type.as_str());
    context.insert("status", draw.status.as_str());
    context.insert(
        "max_description_chars",
        &crate::schema::service_case::MAX_DESCRIPTION_CHARS,
    );
    render("service_case", SERVICE_CASE_TEMPLATE, &context)
}

pub fn pick_representative_prompt(
    representatives: &[Representative],
    case: &ServiceCase,
) -> Result<String, PromptError> {
    let mut context = Context::new();
    context.insert("representatives", representatives);
    context.insert("case_details", &case_details(case)?);
    render("pick_representative", PICK_REPRESENTATIVE_TEMPLATE, &context)
}

/// Prompt for the solution and feedback, targeting `rating` out of 5.
pub fn feedback_prompt(
    customer: &Customer,
    case: &ServiceCase,
    representative: &Representative,
    rating: u8,
) -> Result<String, PromptError> {
    let mut context = Context::new();
    context.insert("customer", customer);
    context.insert("case", case);
    context.insert("case_details", &case_details(case)?);
    context.insert("representative", representative);
    context.insert("rating", &rating);
    render("feedback", FEEDBACK_TEMPLATE, &context)
}

fn case_details(case: &ServiceCase) -> Result<String, PromptError> {
    let mut context = Context::new();
    context.insert("case", case);
    render("case_details", CASE_DETAILS_TEMPLATE, &context)
}
