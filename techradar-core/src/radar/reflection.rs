//! Coverage reflection after each extraction.

use crate::error::LlmError;
use crate::model::{LanguageModel, LanguageModelExt, ModelRequest};
use crate::radar::finalize::RadarStatistics;
use crate::radar::prompts;
use crate::radar::session::ResearchLoopState;
use crate::types::{Quadrant, RadarReflection, Ring};
use std::fmt::Write;

pub const REFLECTION_TEMPERATURE: f32 = 0.5;

/// Quadrant and ring counts of the current element set, as prompt text.
pub fn elements_summary(state: &ResearchLoopState) -> String {
    let stats = RadarStatistics::from_elements(state.elements());
    let mut summary = format!(
        "\nCurrent element count: {}/{}\n\nQuadrant distribution:\n",
        state.element_count(),
        state.target_element_count()
    );
    for quadrant in Quadrant::ALL {
        let _ = writeln!(summary, "- {}: {}", quadrant, stats.quadrant_count(quadrant));
    }
    summary.push_str("\nRing distribution:\n");
    for ring in Ring::ALL {
        let _ = writeln!(summary, "- {}: {}", ring, stats.ring_count(ring));
    }
    summary
}

/// Assess coverage and propose follow-up queries.
///
/// The loop counter is advanced before anything else and stays advanced even
/// when the model call fails, so a run always terminates. The returned
/// reflection carries the actual element count and is also stored on `state`.
pub async fn reflect(
    model: &dyn LanguageModel,
    model_id: &str,
    state: &mut ResearchLoopState,
    current_date: &str,
) -> Result<RadarReflection, LlmError> {
    let loop_count = state.advance_loop();
    let current = state.element_count();
    let target = state.target_element_count();
    let progress = state.progress_percentage();

    let prompt = prompts::reflection(
        state.topic(),
        current,
        target,
        progress,
        &elements_summary(state),
        current_date,
    );
    let mut reflection: RadarReflection = model
        .generate_structured(ModelRequest::new(model_id, prompt, REFLECTION_TEMPERATURE))
        .await?;

    reflection.current_count = current;
    reflection.follow_up_queries = reflection
        .follow_up_queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();

    tracing::info!(
        loop_count,
        current,
        target,
        progress,
        is_sufficient = reflection.is_sufficient,
        follow_ups = reflection.follow_up_queries.len(),
        "Reflection complete"
    );
    state.reflection = Some(reflection.clone());
    Ok(reflection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MockLanguageModel;
    use crate::types::TechnologyElement;
    use serde_json::json;

    fn element(name: &str, quadrant: Quadrant, ring: Ring) -> TechnologyElement {
        TechnologyElement {
            name: name.into(),
            description: String::new(),
            quadrant,
            ring,
            score: 5,
            rationale: String::new(),
            source_url: String::new(),
        }
    }

    #[test]
    fn test_elements_summary_lists_every_category() {
        let mut state = ResearchLoopState::new("Caching", 10, 2);
        state.merge_elements(vec![
            element("Redis", Quadrant::Platforms, Ring::Adopt),
            element("Varnish", Quadrant::Tools, Ring::Trial),
            element("Memcached", Quadrant::Platforms, Ring::Hold),
        ]);
        let summary = elements_summary(&state);
        assert!(summary.contains("Current element count: 3/10"));
        assert!(summary.contains("- Platforms: 2"));
        assert!(summary.contains("- Languages & Frameworks: 0"));
        assert!(summary.contains("- Hold: 1"));
        assert!(summary.contains("- Assess: 0"));
    }

    #[tokio::test]
    async fn test_reflect_uses_actual_count() {
        let model = MockLanguageModel::new();
        model.queue_json(json!({
            "is_sufficient": false,
            "current_count": 999,
            "knowledge_gap": "no Hold entries",
            "follow_up_queries": ["deprecated caching tools", ""]
        }));
        let mut state = ResearchLoopState::new("Caching", 10, 2);

        let reflection = reflect(&model, "m", &mut state, "today").await.unwrap();
        assert_eq!(reflection.current_count, 0);
        assert_eq!(reflection.follow_up_queries, vec!["deprecated caching tools"]);
        assert_eq!(state.research_loop_count(), 1);
        assert_eq!(state.reflection.as_ref(), Some(&reflection));
        assert_eq!(model.requests()[0].temperature, REFLECTION_TEMPERATURE);
    }

    #[tokio::test]
    async fn test_loop_count_committed_on_failure() {
        let model = MockLanguageModel::new();
        model.queue_json_error(LlmError::Timeout { timeout_secs: 1 });
        let mut state = ResearchLoopState::new("Caching", 10, 2);

        assert!(reflect(&model, "m", &mut state, "today").await.is_err());
        assert_eq!(state.research_loop_count(), 1);
        assert!(state.reflection.is_none());
    }
}
