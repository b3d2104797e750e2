//! Google Gemini `generateContent` provider.
//!
//! System messages become `systemInstruction`, assistant turns are sent with
//! the `model` role, and a JSON-schema response format maps onto
//! `generationConfig.responseJsonSchema`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ProviderSettings;
use crate::error::LlmError;
use crate::llm::client::{
    build_http_client, send_checked, Choice, GenerationRequest, GenerationResponse, LlmProvider,
    Message, ResponseFormat, Usage,
};

/// Default Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Finish reasons that mean the candidate was withheld.
const BLOCKING_FINISH_REASONS: [&str; 4] = ["SAFETY", "RECITATION", "BLOCKLIST", "PROHIBITED_CONTENT"];

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl GeminiProvider {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_http_client(settings.timeout)?,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            default_model: settings.model.clone(),
        })
    }

    fn model_for(&self, request: &GenerationRequest) -> String {
        if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        }
    }

    fn build_request(request: GenerationRequest) -> ApiRequest {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();
        for message in request.messages {
            match message.role.as_str() {
                "system" => system_parts.push(Part {
                    text: message.content,
                }),
                "assistant" => contents.push(Content::new("model", message.content)),
                _ => contents.push(Content::new("user", message.content)),
            }
        }

        let (response_mime_type, response_json_schema) = match request.response_format {
            Some(ResponseFormat::JsonSchema { schema, .. }) => {
                (Some("application/json"), Some(strip_meta_keys(schema)))
            }
            None => (None, None),
        };

        ApiRequest {
            system_instruction: (!system_parts.is_empty()).then(|| SystemInstruction {
                parts: system_parts,
            }),
            contents,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                response_mime_type,
                response_json_schema,
            },
        }
    }
}

/// Removes the top-level `$schema` keyword, which Gemini rejects.
fn strip_meta_keys(mut schema: Value) -> Value {
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
    }
    schema
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let model = self.model_for(&request);
        let api_request = Self::build_request(request);
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        tracing::debug!(model = %model, url = %url, "Sending Gemini request");

        let http_request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&api_request);

        let api_response: ApiResponse = send_checked(http_request)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;

        if let Some(reason) = api_response
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.clone())
        {
            return Err(LlmError::Blocked(format!("prompt blocked: {reason}")));
        }

        let mut choices = Vec::with_capacity(api_response.candidates.len());
        for (index, candidate) in api_response.candidates.into_iter().enumerate() {
            let finish_reason = candidate
                .finish_reason
                .unwrap_or_else(|| "unknown".to_string());
            if BLOCKING_FINISH_REASONS.contains(&finish_reason.as_str()) {
                return Err(LlmError::Blocked(format!(
                    "candidate withheld: {finish_reason}"
                )));
            }
            let text = candidate
                .content
                .map(|content| {
                    content
                        .parts
                        .into_iter()
                        .map(|part| part.text)
                        .collect::<String>()
                })
                .unwrap_or_default();
            choices.push(Choice {
                index: index as u32,
                message: Message::assistant(text),
                finish_reason,
            });
        }

        let usage = api_response
            .usage_metadata
            .map(|u| Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        Ok(GenerationResponse {
            id: api_response.response_id.unwrap_or_default(),
            model: api_response.model_version.unwrap_or(model),
            choices,
            usage,
        })
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn new(role: &str, text: String) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_json_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
    model_version: Option<String>,
    response_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::ProviderKind;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> GeminiProvider {
        let settings = ProviderSettings::new(ProviderKind::Gemini, "google-test-key")
            .with_base_url(format!("{}/v1beta", server.uri()));
        GeminiProvider::from_settings(&settings).expect("client builds")
    }

    #[test]
    fn test_build_request_splits_system_and_maps_roles() {
        let request = GenerationRequest::new(
            "",
            vec![
                Message::system("You write customer records."),
                Message::user("first"),
                Message::assistant("reply"),
                Message::user("second"),
            ],
        )
        .with_temperature(0.5)
        .with_max_tokens(256)
        .with_json_schema(
            "customer_info",
            json!({"$schema": "https://json-schema.org/draft/2020-12/schema", "type": "object"}),
        );

        let body = serde_json::to_value(GeminiProvider::build_request(request)).expect("serializes");
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You write customer records."
        );
        let roles: Vec<&str> = body["contents"]
            .as_array()
            .expect("contents array")
            .iter()
            .filter_map(|c| c["role"].as_str())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert!(body["generationConfig"]["responseJsonSchema"]
            .get("$schema")
            .is_none());
    }

    #[tokio::test]
    async fn test_generate_joins_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "google-test-key"))
            .and(body_partial_json(json!({
                "generationConfig": {"responseMimeType": "application/json"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [
                        {"text": "{\"representative_name\": "},
                        {"text": "\"Lucas Lima\", \"department\": \"Finance\"}"}
                    ]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 8, "totalTokenCount": 20},
                "modelVersion": "gemini-1.5-flash-002"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = GenerationRequest::new("", vec![Message::user("pick")])
            .with_json_schema("service_representative", json!({"type": "object"}));
        let response = provider_for(&server)
            .generate(request)
            .await
            .expect("request should succeed");

        assert_eq!(response.model, "gemini-1.5-flash-002");
        assert_eq!(response.usage.total_tokens, 20);
        assert_eq!(
            response.first_content(),
            Some(r#"{"representative_name": "Lucas Lima", "department": "Finance"}"#)
        );
    }

    #[tokio::test]
    async fn test_generate_reports_safety_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"finishReason": "SAFETY"}]
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .generate(GenerationRequest::new("", vec![Message::user("x")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Blocked(reason) if reason.contains("SAFETY")));
    }

    #[tokio::test]
    async fn test_generate_maps_structured_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .generate(GenerationRequest::new("", vec![Message::user("x")]))
            .await
            .unwrap_err();
        match err {
            LlmError::ApiError { code, message } => {
                assert_eq!(code, 400);
                assert_eq!(message, "API key not valid.");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }
}
