//! Error types for the techradar core library.
//!
//! Uses `thiserror` for public API error types with structured variants covering
//! model/search collaborators, configuration, and the research loop controller.

use std::path::PathBuf;

/// Top-level error type for the techradar core library.
#[derive(Debug, thiserror::Error)]
pub enum RadarError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Research error: {0}")]
    Research(#[from] ResearchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RadarError {
    /// Missing credentials or invalid configuration. Raised before any model call.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RadarError::Config(_)
                | RadarError::Llm(LlmError::AuthFailed { .. } | LlmError::MissingCredential { .. })
        )
    }

    /// No credential could be resolved locally; nothing was sent.
    pub fn is_missing_credential(&self) -> bool {
        matches!(self, RadarError::Llm(LlmError::MissingCredential { .. }))
    }

    /// Model output could not be shaped into the expected record.
    pub fn is_schema(&self) -> bool {
        matches!(
            self,
            RadarError::Llm(LlmError::SchemaValidation { .. } | LlmError::ResponseParse { .. })
        )
    }
}

/// Errors from model inference and search provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Output does not match schema '{schema}': {message}")]
    SchemaValidation { schema: String, message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("No API key for {provider}: env var '{env_var}' is not set")]
    MissingCredential { provider: String, env_var: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

impl LlmError {
    /// Transient failures that the provider's retry budget may absorb.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. } | LlmError::Timeout { .. } | LlmError::Connection { .. }
        )
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::ParseError {
            message: err.to_string(),
        }
    }
}

/// Errors from the research loop controller.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("Query generator returned no queries for topic '{topic}'")]
    NoQueries { topic: String },

    #[error("Research run cancelled after {completed_loops} loop(s)")]
    Cancelled { completed_loops: usize },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },
}

/// A type alias for results using the top-level `RadarError`.
pub type Result<T> = std::result::Result<T, RadarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_llm() {
        let err = RadarError::Llm(LlmError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "LLM error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_schema() {
        let err = LlmError::SchemaValidation {
            schema: "RadarElementsList".into(),
            message: "missing field `elements`".into(),
        };
        assert_eq!(
            err.to_string(),
            "Output does not match schema 'RadarElementsList': missing field `elements`"
        );
    }

    #[test]
    fn test_error_display_research() {
        let err = RadarError::Research(ResearchError::Cancelled { completed_loops: 2 });
        assert_eq!(
            err.to_string(),
            "Research error: Research run cancelled after 2 loop(s)"
        );
    }

    #[test]
    fn test_taxonomy_configuration() {
        let auth: RadarError = LlmError::AuthFailed {
            provider: "Gemini".into(),
        }
        .into();
        assert!(auth.is_configuration());
        assert!(!auth.is_missing_credential());
        assert!(!auth.is_schema());

        let missing: RadarError = LlmError::MissingCredential {
            provider: "Gemini".into(),
            env_var: "GEMINI_API_KEY".into(),
        }
        .into();
        assert!(missing.is_configuration());
        assert!(missing.is_missing_credential());

        let invalid: RadarError = ConfigError::Invalid {
            message: "bad".into(),
        }
        .into();
        assert!(invalid.is_configuration());
    }

    #[test]
    fn test_taxonomy_schema() {
        let err: RadarError = LlmError::SchemaValidation {
            schema: "Reflection".into(),
            message: "expected bool".into(),
        }
        .into();
        assert!(err.is_schema());
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::RateLimited { retry_after_secs: 1 }.is_transient());
        assert!(LlmError::Timeout { timeout_secs: 5 }.is_transient());
        assert!(
            LlmError::Connection {
                message: "reset".into()
            }
            .is_transient()
        );
        assert!(
            !LlmError::AuthFailed {
                provider: "x".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: RadarError = io_err.into();
        assert!(matches!(err, RadarError::Io(_)));
    }
}
