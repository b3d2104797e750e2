//! Schema-constrained generation on top of an [`LlmProvider`].

use std::sync::Arc;

use crate::error::GenerationError;
use crate::schema::StructuredOutput;
use crate::utils::{try_extract_json_from_response, JsonExtractionResult};

use super::client::{GenerationRequest, LlmProvider, Message};

/// Shown to the model ahead of every prompt.
const SYSTEM_PROMPT: &str = "You generate realistic synthetic customer-service data. \
Reply with a single JSON object that matches the requested schema. Do not add commentary.";

/// Characters of the reply quoted in a `NoJson` error.
const PREVIEW_CHARS: usize = 80;

/// Asks a model for one value of a [`StructuredOutput`] type.
///
/// Each [`generate`](Self::generate) call makes at most one provider request
/// and never retries.
#[derive(Clone)]
pub struct StructuredClient {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl StructuredClient {
    /// Client using the provider's default model.
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            model: String::new(),
            temperature: 0.7,
            max_tokens: 1024,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Generates a `T` from `prompt`.
    ///
    /// The reply is extracted, deserialized, then checked with
    /// [`StructuredOutput::validate`].
    pub async fn generate<T: StructuredOutput>(&self, prompt: &str) -> Result<T, GenerationError> {
        let request = GenerationRequest::new(
            self.model.clone(),
            vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens)
        .with_json_schema(T::NAME, T::schema_descriptor());

        let response = self.provider.generate(request).await?;
        tracing::debug!(
            schema = T::NAME,
            model = %response.model,
            total_tokens = response.usage.total_tokens,
            "Structured generation returned"
        );

        let content = response
            .first_content()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(GenerationError::EmptyResponse { schema: T::NAME })?;

        let json = match try_extract_json_from_response(content) {
            JsonExtractionResult::Success(json) => json,
            JsonExtractionResult::Truncated {
                unclosed_braces, ..
            } => {
                return Err(GenerationError::Truncated {
                    schema: T::NAME,
                    unclosed_braces,
                })
            }
            JsonExtractionResult::NotFound => {
                return Err(GenerationError::NoJson {
                    schema: T::NAME,
                    preview: content.chars().take(PREVIEW_CHARS).collect(),
                })
            }
        };

        let value: T = serde_json::from_str(&json).map_err(|e| GenerationError::Deserialize {
            schema: T::NAME,
            reason: e.to_string(),
        })?;

        value
            .validate()
            .map_err(|reason| GenerationError::SchemaViolation {
                schema: T::NAME,
                reason,
            })?;

        Ok(value)
    }
}
