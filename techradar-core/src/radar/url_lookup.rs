//! Best-effort source URL backfill for radar elements.

use crate::types::TechnologyElement;

/// URL fragments that never count as an authoritative source.
pub const BLACKLISTED_URL_PATTERNS: &[&str] = &[
    "geeksforgeeks",
    "wikipedia",
    "github.com/github",
    "vertexaisearch",
];

/// Source of replacement URLs keyed by technology name.
///
/// "No match" is a normal answer, not an error.
pub trait UrlLookup: Send + Sync {
    fn lookup(&self, name: &str) -> Option<String>;
}

/// A lookup that never finds anything.
pub struct NoUrlLookup;

impl UrlLookup for NoUrlLookup {
    fn lookup(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Whether `url` is empty or matches a blacklisted pattern.
pub fn needs_backfill(url: &str) -> bool {
    let lower = url.trim().to_lowercase();
    lower.is_empty() || BLACKLISTED_URL_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Replace an unusable `source_url` with a lookup result, or clear it.
pub fn backfill_source_url(element: &mut TechnologyElement, lookup: &dyn UrlLookup) {
    if !needs_backfill(&element.source_url) {
        return;
    }
    element.source_url = lookup.lookup(&element.name).unwrap_or_default();
}

fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .collect()
}

/// Shortest name that may take part in a partial match.
const MIN_PARTIAL_MATCH_LEN: usize = 4;

/// Static table of well-known project homepages.
pub struct StaticUrlTable {
    entries: Vec<(String, String)>,
}

impl StaticUrlTable {
    /// Build a table from `(name, url)` pairs. Order decides partial-match priority.
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (normalize_name(k.as_ref()), v.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StaticUrlTable {
    fn default() -> Self {
        Self::new(WELL_KNOWN_URLS.iter().copied())
    }
}

impl UrlLookup for StaticUrlTable {
    fn lookup(&self, name: &str) -> Option<String> {
        let needle = normalize_name(name);
        if needle.is_empty() {
            return None;
        }
        if let Some((_, url)) = self.entries.iter().find(|(key, _)| *key == needle) {
            return Some(url.clone());
        }
        self.entries
            .iter()
            .find(|(key, _)| {
                let shorter = key.len().min(needle.len());
                shorter >= MIN_PARTIAL_MATCH_LEN
                    && (needle.contains(key.as_str()) || key.contains(needle.as_str()))
            })
            .map(|(_, url)| url.clone())
    }
}

const WELL_KNOWN_URLS: &[(&str, &str)] = &[
    ("tensorflow", "https://tensorflow.org"),
    ("pytorch", "https://pytorch.org"),
    ("keras", "https://keras.io"),
    ("numpy", "https://numpy.org"),
    ("pandas", "https://pandas.pydata.org"),
    ("scikit-learn", "https://scikit-learn.org"),
    ("docker", "https://docker.com"),
    ("kubernetes", "https://kubernetes.io"),
    ("react", "https://reactjs.org"),
    ("vue", "https://vuejs.org"),
    ("angular", "https://angular.io"),
    ("nodejs", "https://nodejs.org"),
    ("python", "https://python.org"),
    ("java", "https://oracle.com/java"),
    ("typescript", "https://typescriptlang.org"),
    ("javascript", "https://developer.mozilla.org/docs/Web/JavaScript"),
    ("mysql", "https://mysql.com"),
    ("postgresql", "https://postgresql.org"),
    ("mongodb", "https://mongodb.com"),
    ("redis", "https://redis.io"),
    ("elasticsearch", "https://elastic.co"),
    ("apache", "https://apache.org"),
    ("nginx", "https://nginx.org"),
    ("aws", "https://aws.amazon.com"),
    ("azure", "https://azure.microsoft.com"),
    ("gcp", "https://cloud.google.com"),
    ("langchain", "https://github.com/langchain/langchain"),
    ("openai", "https://openai.com"),
    ("huggingface", "https://huggingface.co"),
    ("github", "https://github.com"),
    ("gitlab", "https://gitlab.com"),
    ("jupyter", "https://jupyter.org"),
    ("streamlit", "https://streamlit.io"),
    ("fastapi", "https://fastapi.tiangolo.com"),
    ("django", "https://djangoproject.com"),
    ("flask", "https://flask.palletsprojects.com"),
    ("express", "https://expressjs.com"),
    ("spring", "https://spring.io"),
    ("rust", "https://rust-lang.org"),
    ("go", "https://golang.org"),
    ("kotlin", "https://kotlinlang.org"),
    ("swift", "https://swift.org"),
    ("flutter", "https://flutter.dev"),
    ("reactnative", "https://reactnative.dev"),
    ("xamarin", "https://dotnet.microsoft.com/apps/xamarin"),
    ("unity", "https://unity.com"),
    ("unreal", "https://unrealengine.com"),
    ("blender", "https://blender.org"),
    ("tensorflow.js", "https://tensorflow.org/js"),
    ("pytorch.mobile", "https://pytorch.org/mobile"),
    ("opencv", "https://opencv.org"),
    ("spark", "https://spark.apache.org"),
    ("hadoop", "https://hadoop.apache.org"),
    ("kafka", "https://kafka.apache.org"),
    ("airflow", "https://airflow.apache.org"),
    ("dbt", "https://getdbt.com"),
    ("snowflake", "https://snowflake.com"),
    ("databricks", "https://databricks.com"),
    ("tableau", "https://tableau.com"),
    ("powerbi", "https://powerbi.microsoft.com"),
    ("grafana", "https://grafana.com"),
    ("prometheus", "https://prometheus.io"),
    ("jenkins", "https://jenkins.io"),
    ("gitlab ci", "https://docs.gitlab.com/ee/ci"),
    ("github actions", "https://github.com/features/actions"),
    ("terraform", "https://terraform.io"),
    ("ansible", "https://ansible.com"),
    ("puppet", "https://puppet.com"),
    ("chef", "https://chef.io"),
];
