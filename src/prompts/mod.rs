//! Prompt templates for every generation call.
//!
//! Templates are rendered with [`tera`]. Values sampled by
//! [`crate::pipeline::sampling::CaseSampler`] and data from earlier stages
//! are injected through the context; the model never picks them itself.
//!
//! - [`roster`] - representative warm-up
//! - [`record`] - customer, service case, representative pick and feedback

pub mod record;
pub mod roster;

use tera::{Context, Tera};
use thiserror::Error;

pub use record::{customer_prompt, feedback_prompt, pick_representative_prompt, service_case_prompt};
pub use roster::representative_prompt;

/// A template failed to render.
#[derive(Debug, Error)]
#[error("Failed to render {template} prompt: {source}")]
pub struct PromptError {
    pub template: &'static str,
    #[source]
    pub source: tera::Error,
}

pub(crate) fn render(
    template_name: &'static str,
    template: &str,
    context: &Context,
) -> Result<String, PromptError> {
    Tera::one_off(template, context, false)
        .map(|rendered| rendered.trim().to_string())
        .map_err(|source| PromptError {
            template: template_name,
            source,
        })
}
