//! # Techradar Core
//!
//! Core library for building technology radars with a search-grounded
//! research loop. Provides the loop controller, the language model and search
//! interfaces, the Gemini provider, configuration, and radar types.

pub mod config;
pub mod error;
pub mod model;
pub mod persistence;
pub mod providers;
pub mod radar;
pub mod schema;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{ConfigOverrides, RadarConfig, load_config};
pub use error::{ConfigError, LlmError, RadarError, ResearchError, Result};
pub use model::{
    LanguageModel, LanguageModelExt, MockLanguageModel, MockSearchProvider, ModelRequest,
    SearchProvider, SearchRequest, SearchResponse,
};
pub use providers::GeminiProvider;
pub use radar::{
    NoOpRadarCallback, RadarCallback, RadarController, RadarOutcome, RadarPhase, RadarReport,
    RadarRequest, StopReason,
};
pub use types::{Quadrant, RadarElementsList, RadarReflection, Ring, TechnologyElement};
