//! Core data types for the technology radar.
//!
//! The record shapes here double as structured-output schemas: each derives
//! `JsonSchema`, and the doc comments on model-facing fields become the field
//! descriptions the model sees.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four radar quadrants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema)]
pub enum Quadrant {
    Techniques,
    Tools,
    Platforms,
    #[serde(rename = "Languages & Frameworks")]
    LanguagesAndFrameworks,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::Techniques,
        Quadrant::Tools,
        Quadrant::Platforms,
        Quadrant::LanguagesAndFrameworks,
    ];

    /// Display label, identical to the serialized form.
    pub fn label(self) -> &'static str {
        match self {
            Quadrant::Techniques => "Techniques",
            Quadrant::Tools => "Tools",
            Quadrant::Platforms => "Platforms",
            Quadrant::LanguagesAndFrameworks => "Languages & Frameworks",
        }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Quadrant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "techniques" | "technique" => Ok(Quadrant::Techniques),
            "tools" | "tool" => Ok(Quadrant::Tools),
            "platforms" | "platform" => Ok(Quadrant::Platforms),
            "languages and frameworks" | "language and frameworks" | "languages"
            | "frameworks" => Ok(Quadrant::LanguagesAndFrameworks),
            _ => Err(format!("unknown quadrant '{s}'")),
        }
    }
}

impl<'de> Deserialize<'de> for Quadrant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The four radar rings, from most to least recommended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema)]
pub enum Ring {
    Adopt,
    Trial,
    Assess,
    Hold,
}

impl Ring {
    pub const ALL: [Ring; 4] = [Ring::Adopt, Ring::Trial, Ring::Assess, Ring::Hold];

    pub fn label(self) -> &'static str {
        match self {
            Ring::Adopt => "Adopt",
            Ring::Trial => "Trial",
            Ring::Assess => "Assess",
            Ring::Hold => "Hold",
        }
    }
}

impl fmt::Display for Ring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Ring {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "adopt" => Ok(Ring::Adopt),
            "trial" => Ok(Ring::Trial),
            "assess" => Ok(Ring::Assess),
            "hold" => Ok(Ring::Hold),
            _ => Err(format!("unknown ring '{s}'")),
        }
    }
}

impl<'de> Deserialize<'de> for Ring {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn normalize_label(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .replace('&', " and ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;

/// One radar entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TechnologyElement {
    /// Name of the technology, tool, technique, or platform
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    /// Brief description of what this element is
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    /// Which quadrant this element belongs to
    pub quadrant: Quadrant,
    /// Which ring this element belongs to
    pub ring: Ring,
    /// Relevance/maturity score from 1-10
    #[serde(deserialize_with = "lenient_score")]
    pub score: u8,
    /// Explanation for the quadrant, ring, and score assignment
    #[serde(default, deserialize_with = "lenient_string")]
    pub rationale: String,
    /// Primary source URL where information about this technology was found
    #[serde(default, deserialize_with = "lenient_string")]
    pub source_url: String,
}

impl TechnologyElement {
    /// Identity key used for deduplication.
    pub fn key(&self) -> String {
        self.name.trim().to_lowercase()
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    let raw = match &value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let raw = raw.ok_or_else(|| serde::de::Error::custom(format!("invalid score {value}")))?;
    Ok(clamp_score(raw))
}

/// Round and clamp a raw score into the 1..=10 range.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return MIN_SCORE;
    }
    raw.round().clamp(MIN_SCORE as f64, MAX_SCORE as f64) as u8
}

/// Initial search queries produced for a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchQueryList {
    /// A list of search queries to be used for web research.
    pub query: Vec<String>,
    /// A brief explanation of why these queries are relevant to the research topic.
    #[serde(default, deserialize_with = "lenient_string")]
    pub rationale: String,
}

/// Elements proposed by one extraction pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RadarElementsList {
    /// List of radar elements extracted from research
    pub elements: Vec<TechnologyElement>,
    /// Total number of elements found in this research iteration
    #[serde(default)]
    pub total_found: usize,
}

/// Coverage assessment returned by the reflection step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RadarReflection {
    /// Whether we have enough elements for a comprehensive radar
    pub is_sufficient: bool,
    /// Current number of unique elements found
    #[serde(default)]
    pub current_count: usize,
    /// What areas need more research to reach the target element count
    #[serde(default, deserialize_with = "lenient_string")]
    pub knowledge_gap: String,
    /// Specific queries to find more elements in underrepresented areas
    #[serde(default)]
    pub follow_up_queries: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quadrant_serializes_to_display_label() {
        let json = serde_json::to_string(&Quadrant::LanguagesAndFrameworks).unwrap();
        assert_eq!(json, "\"Languages & Frameworks\"");
        assert_eq!(Quadrant::Tools.to_string(), "Tools");
    }

    #[test]
    fn test_quadrant_parse_tolerance() {
        assert_eq!(
            "languages and frameworks".parse::<Quadrant>(),
            Ok(Quadrant::LanguagesAndFrameworks)
        );
        assert_eq!(
            "Languages&Frameworks".parse::<Quadrant>(),
            Ok(Quadrant::LanguagesAndFrameworks)
        );
        assert_eq!(" PLATFORMS ".parse::<Quadrant>(), Ok(Quadrant::Platforms));
        assert!("Databases".parse::<Quadrant>().is_err());
    }

    #[test]
    fn test_ring_parse_tolerance() {
        assert_eq!("adopt".parse::<Ring>(), Ok(Ring::Adopt));
        assert_eq!("HOLD".parse::<Ring>(), Ok(Ring::Hold));
        assert!("Avoid".parse::<Ring>().is_err());
    }

    #[test]
    fn test_element_lenient_fields() {
        let value = json!({
            "name": "Redis",
            "description": null,
            "quadrant": "platforms",
            "ring": "Adopt",
            "score": "8.6",
            "rationale": "Widely deployed"
        });
        let element: TechnologyElement = serde_json::from_value(value).unwrap();
        assert_eq!(element.name, "Redis");
        assert_eq!(element.description, "");
        assert_eq!(element.quadrant, Quadrant::Platforms);
        assert_eq!(element.score, 9);
        assert_eq!(element.source_url, "");
        assert_eq!(element.key(), "redis");
    }

    #[test]
    fn test_score_clamped() {
        assert_eq!(clamp_score(0.0), 1);
        assert_eq!(clamp_score(42.0), 10);
        assert_eq!(clamp_score(-3.0), 1);
        assert_eq!(clamp_score(f64::NAN), 1);

        let value = json!({
            "name": "Memcached",
            "quadrant": "Tools",
            "ring": "Hold",
            "score": 15
        });
        let element: TechnologyElement = serde_json::from_value(value).unwrap();
        assert_eq!(element.score, 10);
    }

    #[test]
    fn test_invalid_score_rejected() {
        let value = json!({
            "name": "Memcached",
            "quadrant": "Tools",
            "ring": "Hold",
            "score": "high"
        });
        assert!(serde_json::from_value::<TechnologyElement>(value).is_err());
    }

    #[test]
    fn test_reflection_defaults() {
        let reflection: RadarReflection =
            serde_json::from_value(json!({ "is_sufficient": false })).unwrap();
        assert!(reflection.follow_up_queries.is_empty());
        assert_eq!(reflection.knowledge_gap, "");
    }
}
