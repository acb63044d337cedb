//! Technology radar research loop.
//!
//! A run moves through these phases:
//! 1. **Generate**: the first round of search queries
//! 2. **Research**: search-grounded web research per query, in parallel
//! 3. **Extract**: radar elements from the accumulated research text
//! 4. **Reflect**: coverage assessment and follow-up queries
//! 5. **Finalize**: statistics, narrative and the persisted report
//!
//! Steps 2-4 repeat until a stop rule in [`controller::decide`] fires.

pub mod citations;
pub mod controller;
pub mod dedup;
pub mod extraction;
pub mod finalize;
pub mod prompts;
pub mod queries;
pub mod reflection;
pub mod session;
pub mod url_lookup;
pub mod web_research;

pub use citations::{Citation, CitationSegment};
pub use controller::{LoopDecision, RadarController, RadarRequest, StopReason, decide};
pub use finalize::{RadarOutcome, RadarReport, RadarStatistics, ResearchMetadata};
pub use session::{
    NoOpRadarCallback, RadarCallback, RadarPhase, ResearchLoopState, WebResearchResult,
};
pub use url_lookup::{NoUrlLookup, StaticUrlTable, UrlLookup};
