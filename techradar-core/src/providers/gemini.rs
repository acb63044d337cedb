//! Google Gemini API provider implementation.
//!
//! Implements both [`LanguageModel`] and [`SearchProvider`] on top of the
//! `generateContent` endpoint:
//! - Auth via `?key=API_KEY` query parameter (not header-based)
//! - Structured output via `responseMimeType: application/json` plus `responseSchema`
//! - Search grounding via the `google_search` tool, with citations read from
//!   `groundingMetadata`
//!
//! The API key is resolved on first use, never at construction.

use crate::config::{LlmConfig, RetryConfig};
use crate::error::LlmError;
use crate::model::{
    GroundingChunk, GroundingSupport, LanguageModel, ModelRequest, SearchProvider, SearchRequest,
    SearchResponse,
};
use crate::providers::{resolve_api_key, with_retry};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

/// The default Google Gemini API base URL.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini API provider.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    config: LlmConfig,
    api_key: OnceLock<String>,
}

impl GeminiProvider {
    /// Create a new Gemini provider from configuration.
    ///
    /// Does not touch the credential; a missing key surfaces as
    /// `LlmError::MissingCredential` from the first request, before anything is sent.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            config: config.clone(),
            api_key: OnceLock::new(),
        })
    }

    /// Create a provider with an already-resolved API key.
    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let provider = Self::new(config)?;
        let _ = provider.api_key.set(api_key);
        Ok(provider)
    }

    fn retry_config(&self) -> &RetryConfig {
        &self.config.retry
    }

    /// Resolve and cache the API key.
    fn api_key(&self) -> Result<&str, LlmError> {
        if let Some(key) = self.api_key.get() {
            return Ok(key);
        }
        let key = resolve_api_key(&self.config)?;
        Ok(self.api_key.get_or_init(|| key))
    }

    /// Build the endpoint URL for a Gemini API call.
    fn endpoint_url(&self, model: &str, method: &str, api_key: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            self.base_url, model, method, api_key
        )
    }

    fn generation_config(&self, temperature: f32, max_tokens: Option<usize>) -> Value {
        json!({
            "temperature": temperature,
            "maxOutputTokens": max_tokens.unwrap_or(self.config.max_tokens),
        })
    }

    fn user_contents(prompt: &str) -> Value {
        json!([{ "role": "user", "parts": [{ "text": prompt }] }])
    }

    /// Request body for a free-text or structured generation.
    fn build_generate_body(&self, request: &ModelRequest, schema: Option<&Value>) -> Value {
        let mut generation_config = self.generation_config(request.temperature, request.max_tokens);
        if let Some(schema) = schema {
            generation_config["responseMimeType"] = json!("application/json");
            generation_config["responseSchema"] = Self::sanitize_schema(schema);
        }
        json!({
            "contents": Self::user_contents(&request.prompt),
            "generationConfig": generation_config,
        })
    }

    /// Request body for a search-grounded generation.
    fn build_search_body(&self, request: &SearchRequest) -> Value {
        json!({
            "contents": Self::user_contents(&request.prompt),
            "tools": [{ "google_search": {} }],
            "generationConfig": self.generation_config(request.temperature, None),
        })
    }

    /// Keep only the schema keywords Gemini's `responseSchema` accepts.
    fn sanitize_schema(schema: &Value) -> Value {
        const ALLOWED_KEYS: &[&str] = &[
            "type",
            "description",
            "properties",
            "required",
            "enum",
            "items",
            "nullable",
        ];

        match schema {
            Value::Object(map) => {
                let mut clean = serde_json::Map::new();
                for (key, value) in map {
                    if !ALLOWED_KEYS.contains(&key.as_str()) {
                        continue;
                    }
                    let cleaned_value = match key.as_str() {
                        "properties" => match value {
                            Value::Object(props) => Value::Object(
                                props
                                    .iter()
                                    .map(|(k, v)| (k.clone(), Self::sanitize_schema(v)))
                                    .collect(),
                            ),
                            other => other.clone(),
                        },
                        "items" => Self::sanitize_schema(value),
                        _ => value.clone(),
                    };
                    clean.insert(key.clone(), cleaned_value);
                }
                Value::Object(clean)
            }
            other => other.clone(),
        }
    }

    /// POST a body to `generateContent` and return the parsed JSON response.
    async fn post_generate(&self, model: &str, body: &Value) -> Result<Value, LlmError> {
        let api_key = self.api_key()?;
        let url = self.endpoint_url(model, "generateContent", api_key);

        debug!(model, base_url = self.base_url.as_str(), "Sending Gemini request");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| LlmError::ResponseParse {
            message: format!("Failed to read response body: {}", e.without_url()),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body_text));
        }

        serde_json::from_str(&body_text).map_err(|e| LlmError::ResponseParse {
            message: format!("Invalid JSON in response: {}", e),
        })
    }

    async fn generate(&self, model: &str, body: &Value) -> Result<Value, LlmError> {
        // Fail fast on a missing key instead of spending the retry budget.
        self.api_key()?;
        with_retry(self.retry_config(), move || self.post_generate(model, body)).await
    }

    /// The request URL carries the API key, so it is stripped from the error first.
    fn map_transport_error(&self, err: reqwest::Error) -> LlmError {
        let err = err.without_url();
        if err.is_timeout() {
            LlmError::Timeout {
                timeout_secs: self.config.timeout_secs,
            }
        } else if err.is_connect() {
            LlmError::Connection {
                message: format!("Could not reach Gemini API: {}", err),
            }
        } else {
            LlmError::ApiRequest {
                message: format!("Request to Gemini API failed: {}", err),
            }
        }
    }

    /// Map an HTTP error status to an `LlmError`.
    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> LlmError {
        match status.as_u16() {
            401 | 403 => LlmError::AuthFailed {
                provider: "Gemini".to_string(),
            },
            429 => LlmError::RateLimited {
                retry_after_secs: 30,
            },
            500 | 502 | 503 | 504 => LlmError::Connection {
                message: format!("HTTP {} from Gemini API: {}", status, body_text),
            },
            _ => LlmError::ApiRequest {
                message: format!("HTTP {} from Gemini API: {}", status, body_text),
            },
        }
    }

    fn first_candidate(body: &Value) -> Result<&Value, LlmError> {
        let candidates = body["candidates"]
            .as_array()
            .ok_or_else(|| LlmError::ResponseParse {
                message: "Missing 'candidates' array in response".to_string(),
            })?;
        candidates.first().ok_or_else(|| LlmError::ResponseParse {
            message: "Empty 'candidates' array in response".to_string(),
        })
    }

    /// Concatenate the text parts of the first candidate.
    fn parse_text(body: &Value) -> Result<String, LlmError> {
        let candidate = Self::first_candidate(body)?;
        let parts = candidate["content"]["parts"]
            .as_array()
            .ok_or_else(|| LlmError::ResponseParse {
                message: "Missing 'parts' array in candidate content".to_string(),
            })?;
        Ok(parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect())
    }

    /// Parse the JSON document a structured-output call returns as text.
    fn parse_json_text(text: &str) -> Result<Value, LlmError> {
        let trimmed = text.trim();
        let unfenced = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|rest| rest.strip_suffix("```"))
            .unwrap_or(trimmed);
        serde_json::from_str(unfenced.trim()).map_err(|e| LlmError::ResponseParse {
            message: format!("Structured output is not valid JSON: {}", e),
        })
    }

    /// Parse a search-grounded response: text plus grounding chunks and supports.
    fn parse_search_response(body: &Value) -> Result<SearchResponse, LlmError> {
        let text = Self::parse_text(body)?;
        let metadata = &Self::first_candidate(body)?["groundingMetadata"];

        let grounding_chunks = metadata["groundingChunks"]
            .as_array()
            .map(|chunks| {
                chunks
                    .iter()
                    .map(|chunk| GroundingChunk {
                        uri: chunk["web"]["uri"].as_str().unwrap_or_default().to_string(),
                        title: chunk["web"]["title"].as_str().map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let grounding_supports = metadata["groundingSupports"]
            .as_array()
            .map(|supports| {
                supports
                    .iter()
                    .map(|support| GroundingSupport {
                        start_index: support["segment"]["startIndex"]
                            .as_u64()
                            .map(|v| v as usize),
                        end_index: support["segment"]["endIndex"].as_u64().map(|v| v as usize),
                        chunk_indices: support["groundingChunkIndices"]
                            .as_array()
                            .map(|idx| {
                                idx.iter()
                                    .filter_map(Value::as_u64)
                                    .map(|v| v as usize)
                                    .collect()
                            })
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(SearchResponse {
            text,
            grounding_chunks,
            grounding_supports,
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiProvider {
    async fn generate_text(&self, request: ModelRequest) -> Result<String, LlmError> {
        let body = self.build_generate_body(&request, None);
        let response = self.generate(&request.model, &body).await?;
        Self::parse_text(&response)
    }

    async fn generate_json(
        &self,
        request: ModelRequest,
        schema: &Value,
    ) -> Result<Value, LlmError> {
        let body = self.build_generate_body(&request, Some(schema));
        let response = self.generate(&request.model, &body).await?;
        Self::parse_json_text(&Self::parse_text(&response)?)
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}

#[async_trait]
impl SearchProvider for GeminiProvider {
    async fn search(&self, request: SearchRequest) -> Result<SearchResponse, LlmError> {
        let body = self.build_search_body(&request);
        let response = self.generate(&request.model, &body).await?;
        Self::parse_search_response(&response)
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}
