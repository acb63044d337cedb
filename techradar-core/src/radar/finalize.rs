//! Final radar report: statistics, narrative and the persisted document.

use crate::model::{LanguageModel, ModelRequest};
use crate::radar::citations::CitationSegment;
use crate::radar::controller::StopReason;
use crate::radar::prompts;
use crate::radar::session::{ResearchLoopState, round1};
use crate::radar::url_lookup::{UrlLookup, backfill_source_url};
use crate::types::{Quadrant, Ring, TechnologyElement};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const NARRATIVE_TEMPERATURE: f32 = 0.1;

/// Narratives shorter than this are treated as degraded output.
pub const MIN_NARRATIVE_CHARS: usize = 200;

/// At most this many elements are summarized for the narrative prompt.
pub const MAX_NARRATIVE_ELEMENTS: usize = 50;

/// Quadrant and ring counts keyed by display label.
///
/// Every quadrant and ring is present, with zero counts included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarStatistics {
    pub quadrants: BTreeMap<String, usize>,
    pub rings: BTreeMap<String, usize>,
}

impl RadarStatistics {
    pub fn from_elements(elements: &[TechnologyElement]) -> Self {
        let mut quadrants: BTreeMap<String, usize> = Quadrant::ALL
            .iter()
            .map(|q| (q.label().to_string(), 0))
            .collect();
        let mut rings: BTreeMap<String, usize> =
            Ring::ALL.iter().map(|r| (r.label().to_string(), 0)).collect();

        for element in elements {
            *quadrants.entry(element.quadrant.label().to_string()).or_default() += 1;
            *rings.entry(element.ring.label().to_string()).or_default() += 1;
        }
        Self { quadrants, rings }
    }

    pub fn quadrant_count(&self, quadrant: Quadrant) -> usize {
        self.quadrants.get(quadrant.label()).copied().unwrap_or(0)
    }

    pub fn ring_count(&self, ring: Ring) -> usize {
        self.rings.get(ring.label()).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchMetadata {
    pub research_loops: usize,
    pub sources_analyzed: usize,
    pub target_elements: usize,
    pub completion_rate: f64,
    pub average_score: f64,
}

/// The persisted radar document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarReport {
    pub topic: String,
    pub generated_date: String,
    pub generated_time: String,
    pub total_elements: usize,
    pub summary_report: String,
    pub research_metadata: ResearchMetadata,
    pub radar_data: Vec<TechnologyElement>,
    pub statistics: RadarStatistics,
}

/// Everything a finished run hands back to its caller.
#[derive(Debug, Clone)]
pub struct RadarOutcome {
    pub report: RadarReport,
    /// Narrative plus footer, with short citation ids replaced by real URLs.
    pub final_message: String,
    /// Sources whose short id appeared in the final message.
    pub sources_gathered: Vec<CitationSegment>,
    pub stop_reason: StopReason,
}

/// Mean score rounded to one decimal; 0 for an empty set.
pub fn average_score(elements: &[TechnologyElement]) -> f64 {
    if elements.is_empty() {
        return 0.0;
    }
    let total: f64 = elements.iter().map(|e| f64::from(e.score)).sum();
    round1(total / elements.len() as f64)
}

/// `count / target * 100` rounded to one decimal; 0 when `target` is 0.
pub fn completion_rate(count: usize, target: usize) -> f64 {
    crate::radar::session::progress_percentage(count, target)
}

/// `name: description - rationale` lines for the first 50 elements.
pub fn narrative_summaries(elements: &[TechnologyElement]) -> String {
    elements
        .iter()
        .take(MAX_NARRATIVE_ELEMENTS)
        .map(|e| {
            if e.rationale.is_empty() {
                format!("{}: {}", e.name, e.description)
            } else {
                format!("{}: {} - {}", e.name, e.description, e.rationale)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Deterministic narrative built only from the statistics.
pub fn fallback_narrative(
    topic: &str,
    elements: &[TechnologyElement],
    stats: &RadarStatistics,
    research_loops: usize,
    current_date: &str,
) -> String {
    let top_names: Vec<&str> = elements.iter().take(5).map(|e| e.name.as_str()).collect();
    let count = elements.len();
    format!(
        "{topic} Technology Radar Analysis

THE CURRENT TOPIC LANDSCAPE
This analysis examined {count} technologies in the {lower} space. Key technologies identified include {names} among others. The research shows active development across several technology categories at different levels of maturity and adoption.

NOTABLE PATTERNS AND SURPRISES
The distribution shows {adopt} mature technologies ready for production use, {trial} technologies worth piloting, {assess} emerging technologies to monitor and {hold} technologies to approach with caution.

STRATEGIC IMPLICATIONS
Teams should rely on proven technologies for critical systems while piloting promising newcomers. Favour technologies with strong communities and clear adoption paths.

RESEARCH SCOPE
This analysis processed {count} technologies through {research_loops} research iterations on {current_date}. The detailed narrative could not be generated, so this summary was built from the radar statistics.",
        lower = topic.to_lowercase(),
        names = top_names.join(", "),
        adopt = stats.ring_count(Ring::Adopt),
        trial = stats.ring_count(Ring::Trial),
        assess = stats.ring_count(Ring::Assess),
        hold = stats.ring_count(Ring::Hold),
    )
}

/// Generate the narrative, falling back to the template on failure or short output.
pub async fn generate_narrative(
    model: &dyn LanguageModel,
    model_id: &str,
    topic: &str,
    elements: &[TechnologyElement],
    stats: &RadarStatistics,
    research_loops: usize,
    current_date: &str,
) -> String {
    let prompt = prompts::narrative(topic, current_date, &narrative_summaries(elements));
    match model
        .generate_text(ModelRequest::new(model_id, prompt, NARRATIVE_TEMPERATURE))
        .await
    {
        Ok(text) if text.trim().chars().count() >= MIN_NARRATIVE_CHARS => text.trim().to_string(),
        Ok(text) => {
            tracing::warn!(
                chars = text.trim().chars().count(),
                "Narrative too short, using fallback report"
            );
            fallback_narrative(topic, elements, stats, research_loops, current_date)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Narrative generation failed, using fallback report");
            fallback_narrative(topic, elements, stats, research_loops, current_date)
        }
    }
}

/// Narrative plus the data-outputs footer.
pub fn final_message(
    narrative: &str,
    output_file: &str,
    element_count: usize,
    current_date: &str,
) -> String {
    format!(
        "{narrative}

## Data Outputs
- **Detailed Report**: the analysis above
- **JSON File**: `{output_file}`
- **Visualization Ready**: {element_count} elements structured for radar tools

## Next Steps
1. **Review** the standout technologies in each quadrant
2. **Validate** adoption recommendations against your team's context
3. **Visualize** the generated JSON with a radar visualization tool
4. **Update** the radar quarterly as technologies evolve

---
*Technology radar generated on {current_date} - {element_count} technologies analyzed*
"
    )
}

/// Replace short citation ids with real URLs and keep only the sources used.
pub fn resolve_short_urls(
    message: &str,
    sources: &[CitationSegment],
) -> (String, Vec<CitationSegment>) {
    let mut resolved = message.to_string();
    let mut used = Vec::new();
    for source in sources {
        if !source.short_url.is_empty() && resolved.contains(&source.short_url) {
            resolved = resolved.replace(&source.short_url, &source.value);
            used.push(source.clone());
        }
    }
    (resolved, used)
}

/// Inputs of the finalizer that do not live on the run state.
pub struct FinalizeContext<'a> {
    pub model: &'a dyn LanguageModel,
    pub model_id: &'a str,
    pub url_lookup: &'a dyn UrlLookup,
    pub output_file: &'a str,
    pub current_date: &'a str,
    pub now: DateTime<Local>,
}

/// Build the report, narrative and final message for a finished run.
///
/// Never fails: a failed or degraded narrative is replaced by the template.
pub async fn finalize(
    ctx: FinalizeContext<'_>,
    state: &mut ResearchLoopState,
    stop_reason: StopReason,
) -> RadarOutcome {
    state.dedup_in_place();
    let mut elements = state.elements().to_vec();
    for element in &mut elements {
        backfill_source_url(element, ctx.url_lookup);
    }

    let stats = RadarStatistics::from_elements(&elements);
    let loops = state.research_loop_count();
    let target = state.target_element_count();

    let narrative = generate_narrative(
        ctx.model,
        ctx.model_id,
        state.topic(),
        state.elements(),
        &stats,
        loops,
        ctx.current_date,
    )
    .await;

    let report = RadarReport {
        topic: state.topic().to_string(),
        generated_date: ctx.now.format("%Y-%m-%d").to_string(),
        generated_time: ctx.now.format("%H:%M:%S").to_string(),
        total_elements: elements.len(),
        summary_report: narrative.clone(),
        research_metadata: ResearchMetadata {
            research_loops: loops,
            sources_analyzed: state.sources_gathered.len(),
            target_elements: target,
            completion_rate: completion_rate(elements.len(), target),
            average_score: average_score(&elements),
        },
        statistics: stats,
        radar_data: elements,
    };

    let message = final_message(
        &narrative,
        ctx.output_file,
        report.total_elements,
        ctx.current_date,
    );
    let (final_message, sources_gathered) = resolve_short_urls(&message, &state.sources_gathered);

    tracing::info!(
        topic = report.topic.as_str(),
        total_elements = report.total_elements,
        loops,
        sources = sources_gathered.len(),
        "Radar finalized"
    );

    RadarOutcome {
        report,
        final_message,
        sources_gathered,
        stop_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::model::MockLanguageModel;
    use crate::radar::url_lookup::StaticUrlTable;

    fn element(name: &str, quadrant: Quadrant, ring: Ring, score: u8) -> TechnologyElement {
        TechnologyElement {
            name: name.into(),
            description: format!("{name} description"),
            quadrant,
            ring,
            score,
            rationale: format!("{name} rationale"),
            source_url: String::new(),
        }
    }

    fn sample_elements() -> Vec<TechnologyElement> {
        vec![
            element("Redis", Quadrant::Platforms, Ring::Adopt, 9),
            element("Varnish", Quadrant::Tools, Ring::Trial, 6),
            element("Write-through caching", Quadrant::Techniques, Ring::Assess, 4),
        ]
    }

    #[test]
    fn test_statistics_include_zero_counts() {
        let stats = RadarStatistics::from_elements(&sample_elements());
        assert_eq!(stats.quadrants.len(), 4);
        assert_eq!(stats.rings.len(), 4);
        assert_eq!(stats.quadrants["Languages & Frameworks"], 0);
        assert_eq!(stats.rings["Hold"], 0);
        assert_eq!(stats.quadrant_count(Quadrant::Platforms), 1);
    }

    #[test]
    fn test_average_and_completion() {
        assert_eq!(average_score(&sample_elements()), 6.3);
        assert_eq!(average_score(&[]), 0.0);
        assert_eq!(completion_rate(12, 10), 120.0);
        assert_eq!(completion_rate(5, 0), 0.0);
    }

    #[test]
    fn test_narrative_summaries_capped() {
        let many: Vec<TechnologyElement> = (0..60)
            .map(|i| element(&format!("T{i}"), Quadrant::Tools, Ring::Trial, 5))
            .collect();
        let summaries = narrative_summaries(&many);
        assert_eq!(summaries.lines().count(), MAX_NARRATIVE_ELEMENTS);
        assert_eq!(
            summaries.lines().next(),
            Some("T0: T0 description - T0 rationale")
        );
    }

    #[test]
    fn test_fallback_narrative_mentions_topic_and_counts() {
        let elements = sample_elements();
        let stats = RadarStatistics::from_elements(&elements);
        let text = fallback_narrative("Caching", &elements, &stats, 2, "October 14, 2026");
        assert!(text.starts_with("Caching Technology Radar Analysis"));
        assert!(text.contains("examined 3 technologies in the caching space"));
        assert!(text.contains("Redis, Varnish, Write-through caching"));
        assert!(text.contains("1 mature technologies"));
        assert!(text.contains("through 2 research iterations on October 14, 2026"));
        assert!(text.len() >= MIN_NARRATIVE_CHARS);
    }

    #[tokio::test]
    async fn test_short_narrative_falls_back() {
        let model = MockLanguageModel::new();
        model.queue_text("Too short.");
        let elements = sample_elements();
        let stats = RadarStatistics::from_elements(&elements);
        let text = generate_narrative(&model, "m", "Caching", &elements, &stats, 1, "today").await;
        assert!(text.starts_with("Caching Technology Radar Analysis"));
        assert_eq!(model.requests()[0].temperature, NARRATIVE_TEMPERATURE);
    }

    #[tokio::test]
    async fn test_long_narrative_kept() {
        let model = MockLanguageModel::new();
        let long = "Caching landscape analysis. ".repeat(20);
        model.queue_text(long.clone());
        let elements = sample_elements();
        let stats = RadarStatistics::from_elements(&elements);
        let text = generate_narrative(&model, "m", "Caching", &elements, &stats, 1, "today").await;
        assert_eq!(text, long.trim());
    }

    #[test]
    fn test_resolve_short_urls_keeps_used_sources() {
        let sources = vec![
            CitationSegment {
                label: "redis".into(),
                short_url: "https://vertexaisearch.cloud.google.com/id/0-0".into(),
                value: "https://redis.io".into(),
            },
            CitationSegment {
                label: "valkey".into(),
                short_url: "https://vertexaisearch.cloud.google.com/id/1-0".into(),
                value: "https://valkey.io".into(),
            },
        ];
        let (text, used) = resolve_short_urls(
            "See [redis](https://vertexaisearch.cloud.google.com/id/0-0).",
            &sources,
        );
        assert_eq!(text, "See [redis](https://redis.io).");
        assert_eq!(used.len(), 1);
        assert_eq!(used[0].label, "redis");
    }

    #[tokio::test]
    async fn test_finalize_backfills_and_reports() {
        let model = MockLanguageModel::new();
        model.queue_text_error(LlmError::Timeout { timeout_secs: 1 });
        let mut state = ResearchLoopState::new("Caching", 10, 1);
        state.merge_elements(sample_elements());
        state.advance_loop();

        let lookup = StaticUrlTable::default();
        let ctx = FinalizeContext {
            model: &model,
            model_id: "m",
            url_lookup: &lookup,
            output_file: "radar_output.json",
            current_date: "October 14, 2026",
            now: Local::now(),
        };
        let outcome = finalize(ctx, &mut state, StopReason::LoopBudgetExhausted).await;

        let report = &outcome.report;
        assert_eq!(report.total_elements, 3);
        assert_eq!(report.radar_data[0].source_url, "https://redis.io");
        assert_eq!(report.research_metadata.research_loops, 1);
        assert_eq!(report.research_metadata.completion_rate, 30.0);
        assert!(report.summary_report.contains("Caching"));
        assert!(outcome.final_message.contains("`radar_output.json`"));
        assert!(outcome.final_message.contains("3 elements structured"));
        assert_eq!(outcome.stop_reason, StopReason::LoopBudgetExhausted);
    }
}
