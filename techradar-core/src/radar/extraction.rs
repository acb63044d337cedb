//! Element extraction from accumulated research text.

use crate::error::LlmError;
use crate::model::{LanguageModel, LanguageModelExt, ModelRequest};
use crate::radar::prompts;
use crate::radar::session::ResearchLoopState;
use crate::types::{RadarElementsList, TechnologyElement};

pub const EXTRACTION_TEMPERATURE: f32 = 0.3;

/// Never ask the extractor for fewer than this many elements.
pub const MIN_ELEMENTS_PER_EXTRACTION: usize = 5;

/// Separator between research texts in the extraction prompt.
pub const RESEARCH_SEPARATOR: &str = "\n\n---\n\n";

/// `max(5, target - current)`, without going negative when `current > target`.
pub fn elements_needed(target_count: usize, current_count: usize) -> usize {
    target_count
        .saturating_sub(current_count)
        .max(MIN_ELEMENTS_PER_EXTRACTION)
}

/// Build the extraction prompt from everything researched so far.
pub fn build_extraction_prompt(state: &ResearchLoopState, current_date: &str) -> String {
    let current = state.element_count();
    let target = state.target_element_count();
    let summaries = format!(
        "{}{}",
        state.web_research_results.join(RESEARCH_SEPARATOR),
        prompts::source_reference_context(&state.sources_gathered)
    );
    prompts::extraction(
        state.topic(),
        elements_needed(target, current),
        current,
        target,
        current_date,
        &summaries,
    )
}

/// Ask the model for new radar elements.
///
/// Returns the proposed elements only; merging into the running set is the
/// caller's job. Elements with a blank name are dropped.
pub async fn extract_elements(
    model: &dyn LanguageModel,
    model_id: &str,
    state: &ResearchLoopState,
    current_date: &str,
) -> Result<Vec<TechnologyElement>, LlmError> {
    let prompt = build_extraction_prompt(state, current_date);
    tracing::debug!(prompt_len = prompt.len(), "Extracting radar elements");

    let list: RadarElementsList = model
        .generate_structured(ModelRequest::new(model_id, prompt, EXTRACTION_TEMPERATURE))
        .await?;

    let proposed = list.elements.len();
    let elements: Vec<TechnologyElement> = list
        .elements
        .into_iter()
        .filter(|e| !e.name.trim().is_empty())
        .map(|mut e| {
            e.name = e.name.trim().to_string();
            e
        })
        .collect();
    if elements.len() < proposed {
        tracing::warn!(
            dropped = proposed - elements.len(),
            "Dropped extracted elements without a name"
        );
    }
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MockLanguageModel;
    use crate::radar::citations::CitationSegment;
    use crate::radar::session::WebResearchResult;
    use serde_json::json;

    #[test]
    fn test_elements_needed_floor() {
        assert_eq!(elements_needed(55, 0), 55);
        assert_eq!(elements_needed(55, 52), 5);
        assert_eq!(elements_needed(10, 12), 5);
        assert_eq!(elements_needed(0, 0), 5);
    }

    #[test]
    fn test_prompt_includes_all_research_and_sources() {
        let mut state = ResearchLoopState::new("Caching", 20, 3);
        state.record_research(vec![
            WebResearchResult {
                step_id: 0,
                query: "q0".into(),
                annotated_text: "first text".into(),
                sources: vec![CitationSegment {
                    label: "redis".into(),
                    short_url: "s0".into(),
                    value: "https://redis.io".into(),
                }],
            },
            WebResearchResult {
                step_id: 1,
                query: "q1".into(),
                annotated_text: "second text".into(),
                sources: vec![],
            },
        ]);

        let prompt = build_extraction_prompt(&state, "today");
        assert!(prompt.contains("first text\n\n---\n\nsecond text"));
        assert!(prompt.contains("[1] redis: https://redis.io"));
        assert!(prompt.contains("Extract 20 technologies"));
        assert!(prompt.contains("Current: 0/20"));
    }

    #[tokio::test]
    async fn test_extract_drops_blank_names() {
        let model = MockLanguageModel::new();
        model.queue_json(json!({
            "elements": [
                { "name": "Redis", "description": "kv store", "quadrant": "Platforms",
                  "ring": "Adopt", "score": 9, "rationale": "standard", "source_url": "https://redis.io" },
                { "name": "  ", "description": "", "quadrant": "Tools",
                  "ring": "Hold", "score": 2, "rationale": "" }
            ],
            "total_found": 2
        }));
        let state = ResearchLoopState::new("Caching", 10, 1);
        let elements = extract_elements(&model, "m", &state, "today").await.unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].name, "Redis");
        assert_eq!(model.requests()[0].temperature, EXTRACTION_TEMPERATURE);
    }

    #[tokio::test]
    async fn test_extract_schema_failure_is_fatal() {
        let model = MockLanguageModel::new();
        model.queue_json(json!({
            "elements": [{ "name": "Redis", "quadrant": "Databases", "ring": "Adopt", "score": 9 }]
        }));
        let state = ResearchLoopState::new("Caching", 10, 1);
        let err = extract_elements(&model, "m", &state, "today").await.unwrap_err();
        assert!(matches!(err, LlmError::SchemaValidation { .. }));
    }
}
