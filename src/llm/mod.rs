//! LLM integration for caseforge.
//!
//! One provider backs a run, selected by [`ProviderKind`]. All generation
//! goes through [`StructuredClient`], which turns a prompt into a validated
//! value of a [`crate::schema::StructuredOutput`] type:
//!
//! ```ignore
//! use caseforge::llm::{build_provider, ProviderKind, ProviderSettings, StructuredClient};
//! use caseforge::schema::Customer;
//!
//! let settings = ProviderSettings::new(ProviderKind::OpenAi, api_key);
//! let client = StructuredClient::new(build_provider(&settings)?).with_temperature(0.7);
//! let customer: Customer = client.generate("Create a customer from Recife.").await?;
//! ```

pub mod client;
pub mod providers;
pub mod structured;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{
    Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, ResponseFormat, Usage,
};
pub use providers::{build_provider, GeminiProvider, OpenAiProvider, ProviderKind, ProviderSettings};
pub use structured::StructuredClient;
