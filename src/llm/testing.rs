//! Scripted [`LlmProvider`] for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::client::{
    Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, ResponseFormat, Usage,
};
use crate::error::LlmError;

type ErrorFactory = Arc<dyn Fn() -> LlmError + Send + Sync>;

#[derive(Clone)]
enum Reply {
    Text(String),
    Fail(ErrorFactory),
}

/// Answers each request from a per-schema script.
///
/// Replies for a schema are consumed in order; the last one repeats.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    scripts: HashMap<String, Vec<Reply>>,
    cursors: Mutex<HashMap<String, usize>>,
    requests: Mutex<Vec<GenerationRequest>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(mut self, schema: &str, reply: &str) -> Self {
        self.scripts
            .entry(schema.to_string())
            .or_default()
            .push(Reply::Text(reply.to_string()));
        self
    }

    pub(crate) fn fail(
        mut self,
        schema: &str,
        error: impl Fn() -> LlmError + Send + Sync + 'static,
    ) -> Self {
        self.scripts
            .entry(schema.to_string())
            .or_default()
            .push(Reply::Fail(Arc::new(error)));
        self
    }

    /// Sleeps this long inside every call.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().expect("lock poisoned").len()
    }

    pub(crate) fn calls_for(&self, schema: &str) -> usize {
        self.requests
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|r| schema_name(r) == schema)
            .count()
    }

    pub(crate) fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().expect("lock poisoned").last().cloned()
    }

    pub(crate) fn prompts_for(&self, schema: &str) -> Vec<String> {
        self.requests
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|r| schema_name(r) == schema)
            .filter_map(|r| r.messages.last().map(|m| m.content.clone()))
            .collect()
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, schema: &str) -> Option<Reply> {
        let script = self.scripts.get(schema)?;
        let mut cursors = self.cursors.lock().expect("lock poisoned");
        let cursor = cursors.entry(schema.to_string()).or_insert(0);
        let reply = script.get(*cursor).or_else(|| script.last()).cloned();
        *cursor += 1;
        reply
    }
}

fn schema_name(request: &GenerationRequest) -> &str {
    match &request.response_format {
        Some(ResponseFormat::JsonSchema { name, .. }) => name,
        None => "",
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let schema = schema_name(&request).to_string();
        self.requests.lock().expect("lock poisoned").push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self.next_reply(&schema);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let content = match reply {
            Some(Reply::Text(text)) => text,
            Some(Reply::Fail(error)) => return Err(error()),
            None => {
                return Err(LlmError::ApiError {
                    code: 404,
                    message: format!("no scripted reply for schema '{schema}'"),
                })
            }
        };

        Ok(GenerationResponse {
            id: "test-id".to_string(),
            model: "test-model".to_string(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(content),
                finish_reason: "stop".to_string(),
            }],
            usage: Usage {
                prompt_tokens: 100,
                completion_tokens: 200,
                total_tokens: 300,
            },
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
