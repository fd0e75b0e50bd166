// Suggestion types shared across the autocomplete pipeline

use serde::{Deserialize, Serialize};

/// Where a suggestion came from. A deduplicated suggestion can carry
/// several sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    /// Substring match against stored titles.
    DirectMatch,
    /// Vector-similarity match against stored embeddings.
    Semantic,
    /// The caller's own successful past queries.
    History,
    /// Recently frequent queries across all callers.
    Trending,
}

impl SuggestionSource {
    /// Wire name of the source.
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionSource::DirectMatch => "direct_match",
            SuggestionSource::Semantic => "semantic",
            SuggestionSource::History => "history",
            SuggestionSource::Trending => "trending",
        }
    }
}

/// One autocomplete suggestion.
///
/// `text` is the dedup key: the engine keeps at most one suggestion per
/// distinct text, unioning `sources` and keeping the highest score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    /// Suggested completion text
    pub text: String,

    /// Content kind for title suggestions, "query" for logged queries
    pub kind: String,

    /// Confidence in [0, 1]
    pub score: f32,

    /// Sources that produced this text, in placement order
    pub sources: Vec<SuggestionSource>,

    /// Open per-suggestion detail (record id, match counts, ...)
    pub metadata: serde_json::Value,
}

/// Per-request knobs for [`crate::AutocompleteEngine::suggest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestOptions {
    /// Maximum suggestions returned.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Enable the vector-similarity source.
    #[serde(default = "default_true")]
    pub include_semantic: bool,

    /// Enable the caller-history source.
    #[serde(default = "default_true")]
    pub include_history: bool,

    /// Enable the trending source.
    #[serde(default = "default_true")]
    pub include_trending: bool,

    /// Restrict title suggestions to one content type.
    #[serde(default)]
    pub content_type: Option<String>,

    /// History scope and query-log correlation key.
    #[serde(default)]
    pub user_id: Option<String>,

    /// History scope and query-log correlation key.
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_limit() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl Default for SuggestOptions {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            include_semantic: true,
            include_history: true,
            include_trending: true,
            content_type: None,
            user_id: None,
            project_id: None,
        }
    }
}

/// Outcome of one autocomplete call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutocompleteOutcome {
    /// Partial query as submitted (trimmed)
    pub query: String,

    /// Suggestions in placement order, deduplicated by text
    pub suggestions: Vec<Suggestion>,

    /// Distinct source names that contributed, in placement order
    pub suggestion_sources: Vec<String>,

    /// True when served from the TTL cache
    pub cache_hit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_wire_names() {
        assert_eq!(SuggestionSource::DirectMatch.as_str(), "direct_match");
        assert_eq!(
            serde_json::to_string(&SuggestionSource::DirectMatch).unwrap(),
            "\"direct_match\""
        );
        assert_eq!(
            serde_json::to_string(&SuggestionSource::Trending).unwrap(),
            "\"trending\""
        );
    }

    #[test]
    fn test_options_defaults() {
        let options: SuggestOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.limit, 10);
        assert!(options.include_semantic);
        assert!(options.include_history);
        assert!(options.include_trending);
        assert!(options.content_type.is_none());
    }
}
