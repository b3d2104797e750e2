//! OpenAI chat-completions provider with JSON-schema structured output.

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

/// Default OpenAI API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Provider backed by `POST {base}/chat/completions`.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl OpenAiProvider {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_http_client(settings.timeout)?,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            default_model: settings.model.clone(),
        })
    }

    fn build_request(&self, request: GenerationRequest) -> ApiRequest {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model
        };

        let response_format = request.response_format.map(|format| match format {
            ResponseFormat::JsonSchema { name, schema } => ApiResponseFormat {
                kind: "json_schema",
                json_schema: ApiJsonSchema {
                    name,
                    schema,
                    strict: false,
                },
            },
        });

        ApiRequest {
            model,
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let api_request = self.build_request(request);
        let url = format!("{}/chat/completions", self.base_url);

        tracing::debug!(model = %api_request.model, url = %url, "Sending OpenAI request");

        let http_request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&api_request);

        let api_response: ApiResponse = send_checked(http_request)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;

        if let Some(refusal) = api_response
            .choices
            .iter()
            .find_map(|choice| choice.message.refusal.clone())
        {
            return Err(LlmError::Blocked(refusal));
        }

        let choices = api_response
            .choices
            .into_iter()
            .map(|choice| Choice {
                index: choice.index,
                message: Message {
                    role: choice.message.role,
                    content: choice.message.content.unwrap_or_default(),
                },
                finish_reason: choice.finish_reason.unwrap_or_else(|| "unknown".to_string()),
            })
            .collect();

        let usage = api_response
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(GenerationResponse {
            id: api_response.id,
            model: api_response.model,
            choices,
            usage,
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ApiResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ApiResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: ApiJsonSchema,
}

#[derive(Debug, Serialize)]
struct ApiJsonSchema {
    name: String,
    schema: Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    index: u32,
    message: ApiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    role: String,
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::ProviderKind;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAiProvider {
        let settings = ProviderSettings::new(ProviderKind::OpenAi, "sk-test-key")
            .with_base_url(format!("{}/v1/", server.uri()));
        OpenAiProvider::from_settings(&settings).expect("client builds")
    }

    fn completion_body(content: &str) -> Value {
        json!({
            "id": "chatcmpl-123",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 20, "completion_tokens": 10, "total_tokens": 30}
        })
    }

    #[test]
    fn test_build_request_uses_default_model_and_schema() {
        let settings = ProviderSettings::new(ProviderKind::OpenAi, "k");
        let provider = OpenAiProvider::from_settings(&settings).expect("client builds");
        let request = GenerationRequest::new("", vec![Message::user("hi")])
            .with_json_schema("customer_info", json!({"type": "object"}));

        let body = serde_json::to_value(provider.build_request(request)).expect("serializes");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "customer_info");
        assert_eq!(body["response_format"]["json_schema"]["strict"], false);
        assert!(body.get("temperature").is_none());
    }

    #[tokio::test]
    async fn test_generate_sends_schema_and_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test-key"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "temperature": 0.7,
                "response_format": {"type": "json_schema", "json_schema": {"name": "service_representative"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                r#"{"representative_name": "Ana Souza", "department": "Sales"}"#,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let request = GenerationRequest::new("", vec![Message::user("pick one")])
            .with_temperature(0.7)
            .with_json_schema("service_representative", json!({"type": "object"}));
        let response = provider_for(&server)
            .generate(request)
            .await
            .expect("request should succeed");

        assert_eq!(response.id, "chatcmpl-123");
        assert_eq!(response.usage.total_tokens, 30);
        assert!(response
            .first_content()
            .is_some_and(|c| c.contains("Ana Souza")));
    }

    #[tokio::test]
    async fn test_generate_maps_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"message": "Rate limit reached for gpt-4o-mini"}
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .generate(GenerationRequest::new("", vec![Message::user("x")]))
            .await
            .unwrap_err();
        match err {
            LlmError::RateLimited(message) => assert!(message.contains("Rate limit reached")),
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_maps_api_error_with_raw_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .generate(GenerationRequest::new("", vec![Message::user("x")]))
            .await
            .unwrap_err();
        match err {
            LlmError::ApiError { code, message } => {
                assert_eq!(code, 500);
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_reports_refusal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-9",
                "model": "gpt-4o-mini",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": null, "refusal": "I can't help with that."},
                    "finish_reason": "stop"
                }]
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .generate(GenerationRequest::new("", vec![Message::user("x")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Blocked(_)));
    }
}
