//! Web research steps and the per-round fan-out.

use crate::error::LlmError;
use crate::model::{SearchProvider, SearchRequest};
use crate::radar::citations::{citation_sources, get_citations, insert_citation_markers, resolve_urls};
use crate::radar::prompts;
use crate::radar::session::WebResearchResult;
use futures::{StreamExt, TryStreamExt, stream};

/// Search runs deterministically.
pub const SEARCH_TEMPERATURE: f32 = 0.0;

/// Run one search-grounded research step.
///
/// Citations are scoped to `step_id`, so the same URL gets one short
/// identifier within the step.
pub async fn web_research(
    search: &dyn SearchProvider,
    model_id: &str,
    query: &str,
    step_id: usize,
    current_date: &str,
) -> Result<WebResearchResult, LlmError> {
    let response = search
        .search(SearchRequest {
            model: model_id.to_string(),
            prompt: prompts::web_searcher(query, current_date),
            temperature: SEARCH_TEMPERATURE,
        })
        .await?;

    let resolved = resolve_urls(&response.grounding_chunks, step_id);
    let citations = get_citations(&response, &resolved);
    let annotated_text = insert_citation_markers(&response.text, &citations);
    let sources = citation_sources(&citations);

    tracing::debug!(
        step_id,
        query,
        citations = citations.len(),
        text_len = annotated_text.len(),
        "Web research step complete"
    );

    Ok(WebResearchResult {
        step_id,
        query: query.to_string(),
        annotated_text,
        sources,
    })
}

/// Run one research step per query with at most `max_concurrent` in flight.
///
/// Step ids start at `first_step_id` and follow query order. Results come back
/// in query order; the first failure aborts the round.
pub async fn research_round(
    search: &dyn SearchProvider,
    model_id: &str,
    queries: &[String],
    first_step_id: usize,
    max_concurrent: usize,
    current_date: &str,
) -> Result<Vec<WebResearchResult>, LlmError> {
    stream::iter(queries.iter().enumerate())
        .map(|(offset, query)| {
            web_research(search, model_id, query, first_step_id + offset, current_date)
        })
        .buffered(max_concurrent.max(1))
        .try_collect()
        .await
}
