//! Configuration system for techradar.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/techradar/config.toml` and/or `.techradar/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for a radar run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadarConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl RadarConfig {
    /// Validate the whole configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.llm.validate();
        warnings.extend(self.research.validate());
        warnings
    }
}

/// Model service connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name. Only "gemini" is supported.
    pub provider: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Inline API key. Takes precedence over `api_key_env` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Optional base URL override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// TCP connect timeout.
    pub connect_timeout_secs: u64,
    /// Retry policy for transient provider failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: 8192,
            timeout_secs: 120,
            connect_timeout_secs: 10,
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    /// Validate this LLM config and return any warnings.
    ///
    /// Returns an empty Vec if the config is valid. Problems are reported as
    /// human-readable warnings, never as errors.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.provider != "gemini" {
            warnings.push(format!(
                "provider '{}' is not supported; requests will use the Gemini API",
                self.provider
            ));
        }
        if self.timeout_secs == 0 {
            warnings.push("timeout_secs is 0; every request will time out".to_string());
        }
        warnings
    }
}

/// Exponential backoff policy applied by providers to transient errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Model identifiers used by each research step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model used for query generation and web search.
    pub query_generator_model: String,
    /// Model used for element extraction and reflection.
    pub reflection_model: String,
    /// Model used for the final narrative.
    pub answer_model: String,
    /// When set, replaces both `reflection_model` and `answer_model`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_model: Option<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            query_generator_model: "gemini-2.5-flash".to_string(),
            reflection_model: "gemini-2.5-flash".to_string(),
            answer_model: "gemini-2.5-flash".to_string(),
            reasoning_model: None,
        }
    }
}

impl ModelsConfig {
    pub fn extraction_model(&self) -> &str {
        self.reasoning_model
            .as_deref()
            .unwrap_or(&self.reflection_model)
    }

    pub fn narrative_model(&self) -> &str {
        self.reasoning_model.as_deref().unwrap_or(&self.answer_model)
    }
}

/// Research loop budget and stopping target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Number of queries generated for the first round.
    pub number_of_initial_queries: usize,
    /// Maximum number of reflection rounds.
    pub max_research_loops: usize,
    /// Number of radar elements the run aims for.
    pub target_element_count: usize,
    /// Upper bound on concurrently running web research steps.
    pub max_concurrent_searches: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            number_of_initial_queries: 4,
            max_research_loops: 4,
            target_element_count: 55,
            max_concurrent_searches: 4,
        }
    }
}

impl ResearchConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.number_of_initial_queries == 0 {
            warnings.push("number_of_initial_queries is 0; the run has nothing to research".into());
        }
        if self.max_research_loops == 0 {
            warnings.push(
                "max_research_loops is 0; the run finalizes after the first reflection".into(),
            );
        }
        if self.target_element_count == 0 {
            warnings.push("target_element_count is 0; progress is always reported as 0%".into());
        }
        if self.max_concurrent_searches == 0 {
            warnings.push("max_concurrent_searches is 0; searches run one at a time".into());
        }
        warnings
    }
}

/// Where the radar report is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("radar_output.json"),
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "techradar", "techradar")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Individually set configuration keys, applied above every other layer.
///
/// Keys are dotted paths such as `research.target_element_count`. Keys that
/// were never set leave the lower layers untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    entries: Vec<(String, serde_json::Value)>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`. A value that cannot be serialized is ignored.
    pub fn set(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.entries.push((key.into(), value));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn apply(&self, mut figment: Figment) -> Figment {
        for (key, value) in &self.entries {
            figment = figment.merge(Serialized::default(key, value.clone()));
        }
        figment
    }
}

/// Path of the workspace-local config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".techradar").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `TECHRADAR_`)
/// 3. Workspace-local config (`.techradar/config.toml`)
/// 4. User config (`~/.config/techradar/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ConfigOverrides>,
) -> Result<RadarConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(RadarConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // TECHRADAR_RESEARCH__MAX_RESEARCH_LOOPS, TECHRADAR_MODELS__ANSWER_MODEL, etc.
    figment = figment.merge(Env::prefixed("TECHRADAR_").split("__"));

    if let Some(overrides) = overrides {
        figment = overrides.apply(figment);
    }

    figment.extract().map_err(Box::new)
}

/// Load configuration from one explicit file, still honoring env and overrides.
pub fn load_config_file(
    path: &Path,
    overrides: Option<&ConfigOverrides>,
) -> Result<RadarConfig, crate::error::ConfigError> {
    if !path.exists() {
        return Err(crate::error::ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let mut figment = Figment::from(Serialized::defaults(RadarConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TECHRADAR_").split("__"));
    if let Some(overrides) = overrides {
        figment = overrides.apply(figment);
    }
    Ok(figment.extract()?)
}

/// Check whether any techradar configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}
