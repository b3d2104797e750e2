//! Warm-up prompt for the representative roster.

use tera::Context;

use super::{render, PromptError};
use crate::schema::Department;

const REPRESENTATIVE_TEMPLATE: &str = r#"
Generate information about a representative in a service company.
The representative must have a believable and creatively chosen American name.
They must belong to one of the following departments: Support, Sales or Finance.

Every department needs at least one representative.
{% if covered | length > 0 -%}
Departments that already have a representative: {{ covered | join(sep=", ") }}.
{%- else -%}
No department has a representative yet.
{%- endif %}
{% if missing | length > 0 -%}
Prefer one of the departments still missing: {{ missing | join(sep=", ") }}.
{%- endif %}
{% if taken | length > 0 -%}
Do not reuse any of these names: {{ taken | join(sep=", ") }}.
{%- endif %}
"#;

/// Prompt for the next roster member.
///
/// `covered` are the departments already staffed and `taken` the names
/// already in use.
pub fn representative_prompt(covered: &[Department], taken: &[String]) -> Result<String, PromptError> {
    let covered_labels: Vec<&str> = covered.iter().map(Department::as_str).collect();
    let missing: Vec<&str> = Department::ALL
        .iter()
        .filter(|d| !covered.contains(d))
        .map(Department::as_str)
        .collect();

    let mut context = Context::new();
    context.insert("covered", &covered_labels);
    context.insert("missing", &missing);
    context.insert("taken", taken);
    render("representative", REPRESENTATIVE_TEMPLATE, &context)
}
