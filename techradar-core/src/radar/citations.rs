//! Citation resolution for search-grounded research text.
//!
//! Grounding chunks carry long redirect URLs. Each unique URL gets a short
//! identifier scoped to the research step, and supported text spans are
//! annotated with markdown-style markers pointing at that identifier.

use crate::model::{GroundingChunk, SearchResponse};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Prefix of every synthetic short citation identifier.
pub const SHORT_URL_PREFIX: &str = "https://vertexaisearch.cloud.google.com/id/";

/// One attribution of a text span to a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationSegment {
    pub label: String,
    pub short_url: String,
    /// The true source URL.
    pub value: String,
}

/// A supported span of the research text and its sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub start_index: usize,
    pub end_index: usize,
    pub segments: Vec<CitationSegment>,
}

/// Map every chunk URI to a short identifier for `step_id`.
///
/// Repeated URIs reuse the identifier of their first occurrence, so the
/// mapping is stable within one step. The same URI in another step gets a
/// different identifier.
pub fn resolve_urls(chunks: &[GroundingChunk], step_id: usize) -> HashMap<String, String> {
    let mut resolved = HashMap::new();
    for (idx, chunk) in chunks.iter().enumerate() {
        resolved
            .entry(chunk.uri.clone())
            .or_insert_with(|| format!("{SHORT_URL_PREFIX}{step_id}-{idx}"));
    }
    resolved
}

/// Label shown in a citation marker: the title without its last dot-suffix.
pub fn citation_label(title: &str) -> &str {
    match title.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => title,
    }
}

/// Build citations from the grounding supports of a search response.
///
/// Supports without an end offset are skipped, a missing start offset is 0,
/// and chunk indices that point past the chunk list are ignored.
pub fn get_citations(
    response: &SearchResponse,
    resolved_urls: &HashMap<String, String>,
) -> Vec<Citation> {
    let mut citations = Vec::new();
    for support in &response.grounding_supports {
        let Some(end_index) = support.end_index else {
            continue;
        };
        let segments: Vec<CitationSegment> = support
            .chunk_indices
            .iter()
            .filter_map(|&idx| response.grounding_chunks.get(idx))
            .map(|chunk| {
                let title = chunk.title.as_deref().unwrap_or_default();
                CitationSegment {
                    label: citation_label(title).to_string(),
                    short_url: resolved_urls
                        .get(&chunk.uri)
                        .cloned()
                        .unwrap_or_else(|| chunk.uri.clone()),
                    value: chunk.uri.clone(),
                }
            })
            .collect();
        if segments.is_empty() {
            continue;
        }
        citations.push(Citation {
            start_index: support.start_index.unwrap_or(0),
            end_index,
            segments,
        });
    }
    citations
}

/// Insert ` [label](short_url)` markers after each cited span.
///
/// Citations are applied from the end of the text backwards so earlier byte
/// offsets stay valid. Offsets past the end or inside a character are clamped.
pub fn insert_citation_markers(text: &str, citations: &[Citation]) -> String {
    let mut ordered: Vec<&Citation> = citations.iter().collect();
    ordered.sort_by(|a, b| {
        (b.end_index, b.start_index).cmp(&(a.end_index, a.start_index))
    });

    let mut annotated = text.to_string();
    for citation in ordered {
        let marker: String = citation
            .segments
            .iter()
            .map(|seg| format!(" [{}]({})", seg.label, seg.short_url))
            .collect();
        let at = floor_char_boundary(&annotated, citation.end_index);
        annotated.insert_str(at, &marker);
    }
    annotated
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut at = index.min(text.len());
    while !text.is_char_boundary(at) {
        at -= 1;
    }
    at
}

/// Flatten citations into the segment list appended to the run's sources.
pub fn citation_sources(citations: &[Citation]) -> Vec<CitationSegment> {
    citations
        .iter()
        .flat_map(|c| c.segments.iter().cloned())
        .collect()
}
