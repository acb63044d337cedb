//! Model service providers.
//!
//! - `gemini`: Google Gemini `generateContent`, for both structured output and
//!   Google Search grounding.

pub mod gemini;

use crate::config::{LlmConfig, RetryConfig};
use crate::error::LlmError;
use std::future::Future;
use std::time::Duration;

pub use gemini::GeminiProvider;

/// Execute an async operation with exponential backoff retry on transient errors.
///
/// Retries on `LlmError::RateLimited` (respects `retry_after_secs`), `LlmError::Connection`,
/// and `LlmError::Timeout`. Permanent errors (auth, parse, schema) return immediately.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T, LlmError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if !e.is_transient() || attempt >= config.max_retries {
                    return Err(e);
                }

                let backoff_ms = compute_backoff(config, attempt, &e);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = config.max_retries,
                    backoff_ms = backoff_ms,
                    error = %e,
                    "Retrying after transient error"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                attempt += 1;
            }
        }
    }
}

/// Compute backoff delay, respecting rate limit retry-after hints.
fn compute_backoff(config: &RetryConfig, attempt: u32, err: &LlmError) -> u64 {
    let computed = compute_exponential_backoff(config, attempt);
    match err {
        LlmError::RateLimited { retry_after_secs } => {
            (retry_after_secs * 1000).min(config.max_backoff_ms).max(computed)
        }
        _ => computed,
    }
}

fn compute_exponential_backoff(config: &RetryConfig, attempt: u32) -> u64 {
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(attempt as i32);
    let capped = base.min(config.max_backoff_ms as f64) as u64;
    if config.jitter {
        // Up to 25% jitter
        let jitter = (capped as f64 * 0.25 * rand_simple()) as u64;
        capped + jitter
    } else {
        capped
    }
}

fn rand_simple() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// Resolve the API key: inline `api_key` first, then the configured env var.
///
/// Returns `LlmError::MissingCredential` when neither source has a non-empty key.
pub fn resolve_api_key(config: &LlmConfig) -> Result<String, LlmError> {
    if let Some(key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        return Ok(key.to_string());
    }
    match std::env::var(&config.api_key_env) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(LlmError::MissingCredential {
            provider: "Gemini".to_string(),
            env_var: config.api_key_env.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_error() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retry(&fast_retry(2), || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(LlmError::Connection {
                    message: "reset".into(),
                })
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retry(&fast_retry(2), || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::Timeout { timeout_secs: 1 })
        })
        .await;
        assert!(matches!(result, Err(LlmError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retry(&fast_retry(5), || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::AuthFailed {
                provider: "Gemini".into(),
            })
        })
        .await;
        assert!(matches!(result, Err(LlmError::AuthFailed { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exponential_backoff_capped() {
        let config = RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 500,
            backoff_multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(compute_exponential_backoff(&config, 0), 100);
        assert_eq!(compute_exponential_backoff(&config, 1), 200);
        assert_eq!(compute_exponential_backoff(&config, 4), 500);
    }

    #[test]
    fn test_rate_limit_backoff_respects_hint() {
        let config = RetryConfig {
            jitter: false,
            ..RetryConfig::default()
        };
        let err = LlmError::RateLimited {
            retry_after_secs: 5,
        };
        assert_eq!(compute_backoff(&config, 0, &err), 5000);
    }

    #[test]
    fn test_resolve_api_key_prefers_inline() {
        let config = LlmConfig {
            api_key: Some("inline-key".into()),
            api_key_env: "TECHRADAR_TEST_UNSET_KEY_A".into(),
            ..LlmConfig::default()
        };
        assert_eq!(resolve_api_key(&config).unwrap(), "inline-key");
    }

    #[test]
    fn test_resolve_api_key_from_env() {
        // SAFETY: test-only env var manipulation
        unsafe { std::env::set_var("TECHRADAR_TEST_KEY_B", "env-key") };
        let config = LlmConfig {
            api_key_env: "TECHRADAR_TEST_KEY_B".into(),
            ..LlmConfig::default()
        };
        assert_eq!(resolve_api_key(&config).unwrap(), "env-key");
        // SAFETY: test-only env var manipulation
        unsafe { std::env::remove_var("TECHRADAR_TEST_KEY_B") };
    }

    #[test]
    fn test_resolve_api_key_missing() {
        let config = LlmConfig {
            api_key_env: "TECHRADAR_TEST_UNSET_KEY_C".into(),
            ..LlmConfig::default()
        };
        match resolve_api_key(&config) {
            Err(LlmError::MissingCredential { env_var, .. }) => {
                assert_eq!(env_var, "TECHRADAR_TEST_UNSET_KEY_C");
            }
            other => panic!("Expected MissingCredential, got {:?}", other),
        }
    }
}
