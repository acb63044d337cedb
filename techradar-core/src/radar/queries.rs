//! Initial query generation.

use crate::error::LlmError;
use crate::model::{LanguageModel, LanguageModelExt, ModelRequest};
use crate::radar::prompts;
use crate::types::SearchQueryList;

/// Sampling temperature for query generation.
pub const QUERY_TEMPERATURE: f32 = 1.0;

/// Ask the model for `number_queries` search queries about `topic`.
///
/// Blank queries are dropped; duplicates are kept. An empty list is returned
/// as-is and left for the controller to reject.
pub async fn generate_queries(
    model: &dyn LanguageModel,
    model_id: &str,
    topic: &str,
    number_queries: usize,
    current_date: &str,
) -> Result<SearchQueryList, LlmError> {
    let prompt = prompts::query_writer(topic, number_queries, current_date);
    let mut list: SearchQueryList = model
        .generate_structured(ModelRequest::new(model_id, prompt, QUERY_TEMPERATURE))
        .await?;

    list.query = list
        .query
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();

    tracing::info!(
        topic,
        requested = number_queries,
        generated = list.query.len(),
        "Generated initial queries"
    );
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MockLanguageModel;
    use serde_json::json;

    #[tokio::test]
    async fn test_generate_queries_drops_blank_entries() {
        let model = MockLanguageModel::new();
        model.queue_json(json!({
            "rationale": "cover the space",
            "query": ["redis alternatives", "  ", "cache invalidation patterns", "redis alternatives"]
        }));

        let list = generate_queries(&model, "gemini-2.5-flash", "Caching", 4, "today")
            .await
            .unwrap();
        assert_eq!(
            list.query,
            vec![
                "redis alternatives",
                "cache invalidation patterns",
                "redis alternatives"
            ]
        );
        assert_eq!(list.rationale, "cover the space");

        let request = &model.requests()[0];
        assert_eq!(request.model, "gemini-2.5-flash");
        assert_eq!(request.temperature, QUERY_TEMPERATURE);
        assert!(request.prompt.contains("Generate 4 focused search queries"));
    }

    #[tokio::test]
    async fn test_generate_queries_schema_failure() {
        let model = MockLanguageModel::new();
        model.queue_json(json!({ "queries": "wrong shape" }));
        let err = generate_queries(&model, "m", "Caching", 4, "today")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::SchemaValidation { .. }));
    }
}
