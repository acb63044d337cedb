//! Run state of one radar research session.
//!
//! The state is owned by the controller and mutated only between steps; the
//! research fan-out returns results that are appended after the round joins.

use crate::error::ResearchError;
use crate::radar::citations::CitationSegment;
use crate::radar::controller::StopReason;
use crate::radar::dedup::{dedup_elements, merge_elements};
use crate::types::{RadarReflection, TechnologyElement};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Controller phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RadarPhase {
    /// Producing the first round of queries.
    Generating,
    /// Running web research steps for the current round.
    Researching,
    /// Turning research text into radar elements.
    Extracting,
    /// Assessing coverage and proposing follow-ups.
    Reflecting,
    /// Building the final report.
    Finalizing,
    Done,
}

impl RadarPhase {
    /// Whether the controller may move from `self` to `next`.
    pub fn can_transition_to(self, next: RadarPhase) -> bool {
        use RadarPhase::*;
        matches!(
            (self, next),
            (Generating, Researching)
                | (Researching, Extracting)
                | (Extracting, Reflecting)
                | (Reflecting, Researching)
                | (Reflecting, Finalizing)
                | (Finalizing, Done)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RadarPhase::Generating => "generating",
            RadarPhase::Researching => "researching",
            RadarPhase::Extracting => "extracting",
            RadarPhase::Reflecting => "reflecting",
            RadarPhase::Finalizing => "finalizing",
            RadarPhase::Done => "done",
        }
    }
}

impl fmt::Display for RadarPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one web research step.
#[derive(Debug, Clone, PartialEq)]
pub struct WebResearchResult {
    pub step_id: usize,
    pub query: String,
    /// Research text with citation markers inserted.
    pub annotated_text: String,
    pub sources: Vec<CitationSegment>,
}

/// The evolving state of a radar run.
#[derive(Debug, Clone)]
pub struct ResearchLoopState {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    radar_topic: String,
    target_element_count: usize,
    max_research_loops: usize,
    research_loop_count: usize,
    radar_elements: Vec<TechnologyElement>,
    phase: RadarPhase,
    /// Every query run so far, in completion order of its round.
    pub search_queries: Vec<String>,
    /// Annotated research texts, in the same order as `search_queries`.
    pub web_research_results: Vec<String>,
    /// Every citation segment produced by any research step.
    pub sources_gathered: Vec<CitationSegment>,
    /// Latest reflection output.
    pub reflection: Option<RadarReflection>,
}

impl ResearchLoopState {
    pub fn new(topic: impl Into<String>, target_element_count: usize, max_research_loops: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            radar_topic: topic.into(),
            target_element_count,
            max_research_loops,
            research_loop_count: 0,
            radar_elements: Vec::new(),
            phase: RadarPhase::Generating,
            search_queries: Vec::new(),
            web_research_results: Vec::new(),
            sources_gathered: Vec::new(),
            reflection: None,
        }
    }

    pub fn topic(&self) -> &str {
        &self.radar_topic
    }

    pub fn target_element_count(&self) -> usize {
        self.target_element_count
    }

    pub fn max_research_loops(&self) -> usize {
        self.max_research_loops
    }

    pub fn research_loop_count(&self) -> usize {
        self.research_loop_count
    }

    pub fn phase(&self) -> RadarPhase {
        self.phase
    }

    pub fn elements(&self) -> &[TechnologyElement] {
        &self.radar_elements
    }

    pub fn element_count(&self) -> usize {
        self.radar_elements.len()
    }

    /// Number of research steps already run; the next step id.
    pub fn queries_run(&self) -> usize {
        self.search_queries.len()
    }

    /// Advance the loop counter by one and return the new value.
    ///
    /// This is the only way the counter changes, and it never decreases.
    pub fn advance_loop(&mut self) -> usize {
        self.research_loop_count += 1;
        self.research_loop_count
    }

    /// Move to `next`, rejecting transitions the controller never makes.
    pub fn transition(&mut self, next: RadarPhase) -> Result<(), ResearchError> {
        if !self.phase.can_transition_to(next) {
            return Err(ResearchError::InvalidStateTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(from = %self.phase, to = %next, "Radar phase transition");
        self.phase = next;
        Ok(())
    }

    /// Merge newly extracted elements into the running set.
    pub fn merge_elements(&mut self, incoming: Vec<TechnologyElement>) {
        let existing = std::mem::take(&mut self.radar_elements);
        self.radar_elements = merge_elements(existing, incoming);
    }

    /// Deduplicate the current element set without copying it.
    pub fn dedup_in_place(&mut self) {
        let elements = std::mem::take(&mut self.radar_elements);
        self.radar_elements = dedup_elements(elements);
    }

    /// Replace the element set wholesale. The new set is deduplicated.
    pub fn replace_elements(&mut self, elements: Vec<TechnologyElement>) {
        self.radar_elements = dedup_elements(elements);
    }

    /// Append the results of one research round.
    pub fn record_research(&mut self, results: Vec<WebResearchResult>) {
        for result in results {
            self.search_queries.push(result.query);
            self.web_research_results.push(result.annotated_text);
            self.sources_gathered.extend(result.sources);
        }
    }

    /// Progress toward the target in percent, rounded to one decimal. 0 when the target is 0.
    pub fn progress_percentage(&self) -> f64 {
        progress_percentage(self.element_count(), self.target_element_count)
    }
}

/// `current / target * 100`, rounded to one decimal; 0 when `target` is 0.
pub fn progress_percentage(current: usize, target: usize) -> f64 {
    if target == 0 {
        return 0.0;
    }
    round1(current as f64 / target as f64 * 100.0)
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Callback trait for progress updates during a radar run.
pub trait RadarCallback: Send + Sync {
    /// Called when the controller enters a new phase.
    fn on_phase_change(&self, phase: RadarPhase);
    /// Called when one web research step completes.
    fn on_research_step_complete(&self, step_id: usize, query: &str, sources_found: usize);
    /// Called after extraction merged new elements.
    fn on_elements_extracted(&self, proposed: usize, total: usize, target: usize);
    /// Called after each reflection.
    fn on_reflection(&self, loop_count: usize, progress_percentage: f64, is_sufficient: bool);
    /// Called once when the loop decides to finalize.
    fn on_stop(&self, reason: StopReason);
}

/// No-op callback for testing.
pub struct NoOpRadarCallback;

impl RadarCallback for NoOpRadarCallback {
    fn on_phase_change(&self, _phase: RadarPhase) {}
    fn on_research_step_complete(&self, _step_id: usize, _query: &str, _sources_found: usize) {}
    fn on_elements_extracted(&self, _proposed: usize, _total: usize, _target: usize) {}
    fn on_reflection(&self, _loop_count: usize, _progress_percentage: f64, _is_sufficient: bool) {}
    fn on_stop(&self, _reason: StopReason) {}
}
