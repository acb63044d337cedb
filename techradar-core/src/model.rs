//! Model inference and search collaborators.
//!
//! The research loop talks to the outside world only through [`LanguageModel`]
//! and [`SearchProvider`]. Scripted mock implementations are provided for tests
//! and offline runs.

use crate::error::LlmError;
use crate::schema::StructuredOutput;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A single prompt sent to a language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

impl ModelRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature,
            max_tokens: None,
        }
    }
}

/// Trait for language model providers.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate free text.
    async fn generate_text(&self, request: ModelRequest) -> Result<String, LlmError>;

    /// Generate a JSON value constrained by `schema`.
    async fn generate_json(&self, request: ModelRequest, schema: &Value)
    -> Result<Value, LlmError>;

    /// Human-readable provider name, used in logs and errors.
    fn provider_name(&self) -> &str;
}

/// Typed structured output on top of [`LanguageModel::generate_json`].
#[async_trait]
pub trait LanguageModelExt: LanguageModel {
    /// Generate a value of type `T`, using its derived schema.
    ///
    /// Output that cannot be parsed into `T` fails with [`LlmError::SchemaValidation`].
    async fn generate_structured<T>(&self, request: ModelRequest) -> Result<T, LlmError>
    where
        T: StructuredOutput + Send,
    {
        let schema = T::response_schema();
        let value = match self.generate_json(request, &schema).await {
            Ok(value) => value,
            Err(LlmError::ResponseParse { message }) => {
                return Err(LlmError::SchemaValidation {
                    schema: T::type_name(),
                    message,
                });
            }
            Err(e) => return Err(e),
        };
        serde_json::from_value(value).map_err(|e| LlmError::SchemaValidation {
            schema: T::type_name(),
            message: e.to_string(),
        })
    }
}

impl<M: LanguageModel + ?Sized> LanguageModelExt for M {}

/// A search-grounded prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
}

/// One grounding source reported by the search service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingChunk {
    /// Redirect or lookup URL of the source.
    pub uri: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Attribution of a text span to one or more grounding chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingSupport {
    /// Byte offset where the supported segment starts.
    #[serde(default)]
    pub start_index: Option<usize>,
    /// Byte offset where the supported segment ends.
    #[serde(default)]
    pub end_index: Option<usize>,
    /// Indices into [`SearchResponse::grounding_chunks`].
    #[serde(default)]
    pub chunk_indices: Vec<usize>,
}

/// Free text plus grounding metadata returned by a search-enabled model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub text: String,
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
    #[serde(default)]
    pub grounding_supports: Vec<GroundingSupport>,
}

/// Trait for search-augmented model providers.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, request: SearchRequest) -> Result<SearchResponse, LlmError>;

    fn provider_name(&self) -> &str;
}

/// A scripted language model for testing.
///
/// Structured and text responses are served from separate FIFO queues. An
/// exhausted queue yields an `ApiRequest` error.
pub struct MockLanguageModel {
    json_responses: Mutex<VecDeque<Result<Value, LlmError>>>,
    text_responses: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self {
            json_responses: Mutex::new(VecDeque::new()),
            text_responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue the value returned by the next structured call.
    pub fn queue_json(&self, value: Value) {
        lock(&self.json_responses).push_back(Ok(value));
    }

    /// Queue a failure for the next structured call.
    pub fn queue_json_error(&self, error: LlmError) {
        lock(&self.json_responses).push_back(Err(error));
    }

    /// Queue the text returned by the next free-text call.
    pub fn queue_text(&self, text: impl Into<String>) {
        lock(&self.text_responses).push_back(Ok(text.into()));
    }

    /// Queue a failure for the next free-text call.
    pub fn queue_text_error(&self, error: LlmError) {
        lock(&self.text_responses).push_back(Err(error));
    }

    /// Every request received so far, in call order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    fn record(&self, request: ModelRequest) {
        lock(&self.requests).push(request);
    }
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn generate_text(&self, request: ModelRequest) -> Result<String, LlmError> {
        self.record(request);
        lock(&self.text_responses)
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("text")))
    }

    async fn generate_json(
        &self,
        request: ModelRequest,
        _schema: &Value,
    ) -> Result<Value, LlmError> {
        self.record(request);
        lock(&self.json_responses)
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("json")))
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

/// A search provider for testing.
///
/// Queued responses are served first; afterwards every query gets a plain text
/// answer echoing the prompt's query line, without grounding metadata.
pub struct MockSearchProvider {
    responses: Mutex<VecDeque<Result<SearchResponse, LlmError>>>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl MockSearchProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_response(&self, response: SearchResponse) {
        lock(&self.responses).push_back(Ok(response));
    }

    pub fn queue_error(&self, error: LlmError) {
        lock(&self.responses).push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

impl Default for MockSearchProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(&self, request: SearchRequest) -> Result<SearchResponse, LlmError> {
        let fallback = SearchResponse {
            text: format!("Search findings ({} chars of prompt)", request.prompt.len()),
            ..Default::default()
        };
        lock(&self.requests).push(request);
        lock(&self.responses).pop_front().unwrap_or(Ok(fallback))
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

fn exhausted(kind: &str) -> LlmError {
    LlmError::ApiRequest {
        message: format!("mock has no scripted {kind} response"),
    }
}

// A poisoned mock only means another test thread panicked; keep serving.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
