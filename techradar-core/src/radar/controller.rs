//! The research loop controller.
//!
//! Drives one radar run through its phases:
//! generating -> researching -> extracting -> reflecting -> (researching | finalizing) -> done.
//!
//! The continue/finalize decision is a pure function ([`decide`]) so it can be
//! tested without any collaborator.

use crate::config::{ModelsConfig, RadarConfig, ResearchConfig};
use crate::error::{RadarError, ResearchError};
use crate::model::{LanguageModel, SearchProvider};
use crate::radar::extraction::extract_elements;
use crate::radar::finalize::{FinalizeContext, RadarOutcome, finalize};
use crate::radar::prompts::prompt_date;
use crate::radar::queries::generate_queries;
use crate::radar::reflection::reflect;
use crate::radar::session::{NoOpRadarCallback, RadarCallback, RadarPhase, ResearchLoopState};
use crate::radar::url_lookup::{StaticUrlTable, UrlLookup};
use crate::radar::web_research::research_round;
use crate::types::RadarReflection;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Follow-up rounds near the target run at most this many queries.
pub const NEAR_TARGET_MAX_QUERIES: usize = 2;

/// Why the loop stopped researching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Reflection judged the radar sufficient.
    Sufficient,
    /// `research_loop_count` reached `max_research_loops`.
    LoopBudgetExhausted,
    /// The element count reached the target.
    TargetAchieved,
    /// The element count reached 150% of the target.
    TargetSignificantlyExceeded,
    /// Reflection asked to continue but proposed nothing to search.
    NoFollowUpQueries,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::Sufficient => "sufficient",
            StopReason::LoopBudgetExhausted => "loop_budget_exhausted",
            StopReason::TargetAchieved => "target_achieved",
            StopReason::TargetSignificantlyExceeded => "target_significantly_exceeded",
            StopReason::NoFollowUpQueries => "no_follow_up_queries",
        };
        f.write_str(s)
    }
}

/// Outcome of the reflecting phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopDecision {
    Finalize(StopReason),
    /// Research again with these queries.
    Continue(Vec<String>),
}

/// Decide whether to finalize or run another round.
///
/// Rules are checked in order and the first match wins:
/// sufficient, loop budget, target achieved, target exceeded by 50%.
/// Otherwise the follow-ups become the next round, truncated to two when
/// the count is at or above 85% of the target.
pub fn decide(
    reflection: &RadarReflection,
    research_loop_count: usize,
    max_research_loops: usize,
    current_count: usize,
    target_count: usize,
) -> LoopDecision {
    if reflection.is_sufficient {
        return LoopDecision::Finalize(StopReason::Sufficient);
    }
    if research_loop_count >= max_research_loops {
        return LoopDecision::Finalize(StopReason::LoopBudgetExhausted);
    }
    if current_count >= target_count {
        return LoopDecision::Finalize(StopReason::TargetAchieved);
    }
    // Implied by the rule above.
    if reached_fraction(current_count, target_count, 3, 2) {
        return LoopDecision::Finalize(StopReason::TargetSignificantlyExceeded);
    }

    let mut follow_ups = reflection.follow_up_queries.clone();
    if reached_fraction(current_count, target_count, 85, 100) {
        follow_ups.truncate(NEAR_TARGET_MAX_QUERIES);
    }
    if follow_ups.is_empty() {
        return LoopDecision::Finalize(StopReason::NoFollowUpQueries);
    }
    LoopDecision::Continue(follow_ups)
}

/// `current >= target * numerator / denominator`, computed in `u128` so no count overflows.
fn reached_fraction(current: usize, target: usize, numerator: u128, denominator: u128) -> bool {
    current as u128 * denominator >= target as u128 * numerator
}

/// Per-run options of the invocation surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarRequest {
    pub topic: String,
    pub initial_query_count: usize,
    pub max_research_loops: usize,
    pub target_element_count: usize,
    /// Overrides the extraction, reflection and narrative models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_model: Option<String>,
}

impl RadarRequest {
    /// A request for `topic` using the configured research budget.
    pub fn from_config(topic: impl Into<String>, research: &ResearchConfig) -> Self {
        Self {
            topic: topic.into(),
            initial_query_count: research.number_of_initial_queries,
            max_research_loops: research.max_research_loops,
            target_element_count: research.target_element_count,
            reasoning_model: None,
        }
    }
}

/// Runs radar research sessions against a model and a search provider.
pub struct RadarController {
    model: Arc<dyn LanguageModel>,
    search: Arc<dyn SearchProvider>,
    models: ModelsConfig,
    research: ResearchConfig,
    output_path: PathBuf,
    url_lookup: Arc<dyn UrlLookup>,
    callback: Arc<dyn RadarCallback>,
    cancel: CancellationToken,
}

impl RadarController {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        search: Arc<dyn SearchProvider>,
        config: &RadarConfig,
    ) -> Self {
        Self {
            model,
            search,
            models: config.models.clone(),
            research: config.research.clone(),
            output_path: config.output.path.clone(),
            url_lookup: Arc::new(StaticUrlTable::default()),
            callback: Arc::new(NoOpRadarCallback),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_callback(mut self, callback: Arc<dyn RadarCallback>) -> Self {
        self.callback = callback;
        self
    }

    pub fn with_url_lookup(mut self, url_lookup: Arc<dyn UrlLookup>) -> Self {
        self.url_lookup = url_lookup;
        self
    }

    /// Use `token` to cancel the run between rounds.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run a radar for `topic` with the configured budget.
    pub async fn run(&self, topic: &str) -> Result<RadarOutcome, RadarError> {
        self.run_request(RadarRequest::from_config(topic, &self.research))
            .await
    }

    /// Run a radar with explicit per-run options.
    ///
    /// Any collaborator failure aborts the run; there is no partial radar.
    pub async fn run_request(&self, request: RadarRequest) -> Result<RadarOutcome, RadarError> {
        let current_date = prompt_date(&Local::now());
        let query_model = self.models.query_generator_model.as_str();
        let reasoning_model = request
            .reasoning_model
            .as_deref()
            .unwrap_or_else(|| self.models.extraction_model());
        let narrative_model = request
            .reasoning_model
            .as_deref()
            .unwrap_or_else(|| self.models.narrative_model());

        let mut state = ResearchLoopState::new(
            request.topic.clone(),
            request.target_element_count,
            request.max_research_loops,
        );
        info!(
            run_id = %state.id,
            topic = state.topic(),
            target = state.target_element_count(),
            max_loops = state.max_research_loops(),
            "Starting radar research"
        );
        self.callback.on_phase_change(RadarPhase::Generating);

        let queries = generate_queries(
            self.model.as_ref(),
            query_model,
            state.topic(),
            request.initial_query_count,
            &current_date,
        )
        .await?;
        if queries.query.is_empty() {
            return Err(ResearchError::NoQueries {
                topic: state.topic().to_string(),
            }
            .into());
        }

        let mut round = queries.query;
        let stop_reason = loop {
            if self.cancel.is_cancelled() {
                info!(loops = state.research_loop_count(), "Radar run cancelled");
                return Err(ResearchError::Cancelled {
                    completed_loops: state.research_loop_count(),
                }
                .into());
            }

            self.enter(&mut state, RadarPhase::Researching)?;
            let results = research_round(
                self.search.as_ref(),
                query_model,
                &round,
                state.queries_run(),
                self.research.max_concurrent_searches,
                &current_date,
            )
            .await?;
            for result in &results {
                self.callback.on_research_step_complete(
                    result.step_id,
                    &result.query,
                    result.sources.len(),
                );
            }
            state.record_research(results);

            self.enter(&mut state, RadarPhase::Extracting)?;
            let proposed =
                extract_elements(self.model.as_ref(), reasoning_model, &state, &current_date)
                    .await?;
            let proposed_count = proposed.len();
            state.merge_elements(proposed);
            self.callback.on_elements_extracted(
                proposed_count,
                state.element_count(),
                state.target_element_count(),
            );

            self.enter(&mut state, RadarPhase::Reflecting)?;
            let reflection =
                reflect(self.model.as_ref(), reasoning_model, &mut state, &current_date).await?;
            self.callback.on_reflection(
                state.research_loop_count(),
                state.progress_percentage(),
                reflection.is_sufficient,
            );

            match decide(
                &reflection,
                state.research_loop_count(),
                state.max_research_loops(),
                state.element_count(),
                state.target_element_count(),
            ) {
                LoopDecision::Finalize(reason) => break reason,
                LoopDecision::Continue(next) => {
                    info!(
                        queries = next.len(),
                        current = state.element_count(),
                        target = state.target_element_count(),
                        "Continuing research"
                    );
                    round = next;
                }
            }
        };

        info!(
            reason = %stop_reason,
            loop_count = state.research_loop_count(),
            current = state.element_count(),
            target = state.target_element_count(),
            "Stopping research"
        );
        self.callback.on_stop(stop_reason);

        self.enter(&mut state, RadarPhase::Finalizing)?;
        let output_file = self
            .output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.output_path.display().to_string());
        let ctx = FinalizeContext {
            model: self.model.as_ref(),
            model_id: narrative_model,
            url_lookup: self.url_lookup.as_ref(),
            output_file: &output_file,
            current_date: &current_date,
            now: Local::now(),
        };
        let outcome = finalize(ctx, &mut state, stop_reason).await;
        self.enter(&mut state, RadarPhase::Done)?;
        Ok(outcome)
    }

    fn enter(&self, state: &mut ResearchLoopState, phase: RadarPhase) -> Result<(), RadarError> {
        state.transition(phase)?;
        self.callback.on_phase_change(phase);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reflection(is_sufficient: bool, follow_ups: &[&str]) -> RadarReflection {
        RadarReflection {
            is_sufficient,
            current_count: 0,
            knowledge_gap: String::new(),
            follow_up_queries: follow_ups.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_sufficient_wins_first() {
        let r = reflection(true, &["q"]);
        assert_eq!(
            decide(&r, 0, 4, 0, 55),
            LoopDecision::Finalize(StopReason::Sufficient)
        );
    }

    #[test]
    fn test_loop_budget_before_target() {
        let r = reflection(false, &["q"]);
        assert_eq!(
            decide(&r, 1, 1, 12, 10),
            LoopDecision::Finalize(StopReason::LoopBudgetExhausted)
        );
    }

    #[test]
    fn test_target_achieved() {
        let r = reflection(false, &["q"]);
        assert_eq!(
            decide(&r, 1, 4, 55, 55),
            LoopDecision::Finalize(StopReason::TargetAchieved)
        );
    }

    #[test]
    fn test_near_target_truncates_follow_ups() {
        let r = reflection(false, &["a", "b", "c", "d", "e"]);
        assert_eq!(
            decide(&r, 1, 4, 51, 60),
            LoopDecision::Continue(vec!["a".into(), "b".into()])
        );
        // Just below 85% keeps every follow-up.
        assert_eq!(
            decide(&r, 1, 4, 50, 60),
            LoopDecision::Continue(r.follow_up_queries.clone())
        );
    }

    #[test]
    fn test_no_follow_ups_finalizes() {
        let r = reflection(false, &[]);
        assert_eq!(
            decide(&r, 1, 4, 3, 55),
            LoopDecision::Finalize(StopReason::NoFollowUpQueries)
        );
    }

    #[test]
    fn test_zero_target_finalizes() {
        let r = reflection(false, &["q"]);
        assert_eq!(
            decide(&r, 1, 4, 0, 0),
            LoopDecision::Finalize(StopReason::TargetAchieved)
        );
    }

    #[test]
    fn test_huge_target_does_not_overflow() {
        let r = reflection(false, &["a", "b", "c"]);
        assert_eq!(
            decide(&r, 1, 4, 3, usize::MAX / 2),
            LoopDecision::Continue(r.follow_up_queries.clone())
        );
        assert_eq!(
            decide(&r, 1, 4, usize::MAX - 1, usize::MAX),
            LoopDecision::Continue(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(StopReason::LoopBudgetExhausted.to_string(), "loop_budget_exhausted");
    }

    #[test]
    fn test_request_from_config() {
        let request = RadarRequest::from_config("Caching", &ResearchConfig::default());
        assert_eq!(request.initial_query_count, 4);
        assert_eq!(request.max_research_loops, 4);
        assert_eq!(request.target_element_count, 55);
        assert!(request.reasoning_model.is_none());
    }
}
