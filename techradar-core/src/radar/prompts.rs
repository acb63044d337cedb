//! Prompt templates for each research step.

use crate::radar::citations::CitationSegment;
use chrono::{DateTime, TimeZone};

/// Human-readable date used inside prompts, e.g. "October 14, 2026".
pub fn prompt_date<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%B %d, %Y").to_string()
}

pub fn query_writer(topic: &str, number_queries: usize, current_date: &str) -> String {
    format!(
        r#"Generate {number_queries} focused search queries for a "{topic}" technology radar.

Look for tools, techniques, platforms, languages and frameworks. Current date: {current_date}.

Respond with JSON:
{{
    "rationale": "Brief reason these queries cover the topic",
    "query": ["query1", "query2", "query3"]
}}

Topic: {topic}"#
    )
}

pub fn web_searcher(query: &str, current_date: &str) -> String {
    format!(
        r#"Research technologies for the "{query}" radar. Current date: {current_date}.

Find specific technologies with their names, what they do, how mature they are and a source URL.
Prefer concrete, actionable technologies over abstract concepts. Be concise.
Cover both well-known and emerging technologies, and do not favour any vendor.
Give priority to open source and community-driven projects with open governance.
Use diverse sources: project sites, repositories, engineering blogs, papers.

Also research technologies that deserve caution (about 10% of findings):
- deprecated or legacy technologies still in use
- technologies with known security vulnerabilities
- proprietary solutions with heavy vendor lock-in
- abandoned or poorly maintained projects
- technologies with licensing or scalability problems

Research topic: {query}"#
    )
}

/// Unique gathered sources followed by the URL quality rules.
///
/// Returns an empty string when nothing has been gathered yet.
pub fn source_reference_context(sources: &[CitationSegment]) -> String {
    if sources.is_empty() {
        return String::new();
    }
    let mut context = String::from("\n\nSOURCE URLS FOR REFERENCE:\n");
    let mut seen = std::collections::HashSet::new();
    for (i, source) in sources.iter().enumerate() {
        if source.value.is_empty() || !seen.insert(source.value.as_str()) {
            continue;
        }
        context.push_str(&format!("[{}] {}: {}\n", i + 1, source.label, source.value));
    }
    context.push_str(
        "\nURL REQUIREMENTS:
- Each technology MUST include a specific, working source_url, ideally one of the URLs above
- Prefer official project websites, official repositories and official documentation
- NEVER use generic sites like geeksforgeeks.org or wikipedia.org
- NEVER use invalid URLs like 'github.com/github.com'
- NEVER use search placeholders or vertexaisearch URLs
- Each URL should be the primary authoritative source for that technology\n",
    );
    context
}

pub fn extraction(
    topic: &str,
    extraction_limit: usize,
    current_count: usize,
    target_count: usize,
    current_date: &str,
    summaries: &str,
) -> String {
    format!(
        r#"Extract {extraction_limit} technologies from the research below for the "{topic}" radar. Current: {current_count}/{target_count}.

QUADRANTS: Techniques, Tools, Platforms, Languages & Frameworks
RINGS: Adopt (proven), Trial (promising), Assess (exploring), Hold (caution)
SCORES: 1-3 experimental, 4-6 emerging, 7-8 established, 9-10 industry standard

Aim for a balanced radar:
- Rings: roughly Adopt 30%, Trial 35%, Assess 25%, Hold 10%
- Quadrants: roughly 25% each
- Scores: spread across all four maturity bands

Hold is for technologies with caution flags: deprecated or end-of-life, known security
problems, heavy vendor lock-in, abandoned maintenance, licensing issues, or better modern
alternatives. Prioritize finding Hold technologies if the current set has none.

For every technology give name, description, quadrant, ring, score, rationale and source_url.
Use real URLs from the research. Do not repeat technologies.

Current date: {current_date}
Research: {summaries}"#
    )
}

pub fn reflection(
    topic: &str,
    current_count: usize,
    target_count: usize,
    progress_percentage: f64,
    elements_summary: &str,
    current_date: &str,
) -> String {
    format!(
        r#"Analyze the "{topic}" radar. Current: {current_count}/{target_count} ({progress_percentage}%). Current date: {current_date}.

STOP if current_count >= target_count or it is at least 90% of the target.
CONTINUE only if significantly below target with clear gaps.

Check the distribution:
- Rings: about Hold 10%, Adopt 30%, Trial 35%, Assess 25%
- Quadrants: about 25% each
- Maturity: scores spread across 1-3, 4-6, 7-8 and 9-10

If the Hold ring is missing or under 8% of the total, continue with follow-up queries
that target deprecated, legacy, vendor-locked or abandoned {topic} technologies.

Respond with JSON:
{{
    "is_sufficient": true/false,
    "current_count": {current_count},
    "knowledge_gap": "missing areas, ring imbalances, or quadrant clustering",
    "follow_up_queries": ["query1", "query2"]
}}

Elements: {elements_summary}"#
    )
}

pub fn narrative(topic: &str, current_date: &str, summaries: &str) -> String {
    format!(
        r#"Write a strategic analysis of the {topic} technology landscape for technology leadership.
Be specific and substantive. Use clean headers suitable for a PDF report. Minimum 500 words.

# {topic} Technology Radar Analysis

## Executive Summary
One to three paragraphs on the maturity of the space and the trends driving adoption.

## Market Dynamics and Key Trends
Which categories see the most innovation, what drives adoption decisions, where hype and
practice diverge, and which projects or vendors lead.

## Technology Landscape Analysis
Discuss each quadrant: what dominates, which choices are safe bets and which are
opportunities, and any notable absences.

## Strategic Recommendations
Where to invest now, what is becoming table stakes, and how to approach Trial and Assess items.

## Implementation Considerations
Adoption challenges, skills, integration complexity and risk.

## Research Methodology and Scope
Sources analyzed, coverage, selection criteria and limitations.

Reference technologies by name. Research date: {current_date}

Research findings:
{summaries}"#
    )
}
