use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Results scoring strictly above this value are marked as validated.
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Which provider table the application runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Any enabled, credentialed provider; demo data when none is usable.
    #[default]
    Multi,
    /// Tavily alone; a missing credential is an error.
    #[serde(alias = "tavily-only", rename = "tavily")]
    TavilyOnly,
}

impl SearchMode {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Multi => "multi",
            Self::TavilyOnly => "tavily",
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A configured AI or search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub description: String,
    pub api_key_required: bool,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Provider {
    /// The API key, if one is set and not blank.
    #[must_use]
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Enabled and holding a non-empty credential.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.enabled && self.credential().is_some()
    }

    pub fn apply(&mut self, update: ProviderUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(api_key) = update.api_key {
            self.api_key = api_key;
        }
    }
}

/// Partial set of provider fields merged by `update_provider`.
///
/// `api_key: Some(None)` clears the stored key, `None` leaves it alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub api_key: Option<Option<String>>,
}

impl ProviderUpdate {
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(Some(api_key.into()));
        self
    }

    #[must_use]
    pub fn clear_api_key(mut self) -> Self {
        self.api_key = Some(None);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.enabled.is_none()
            && self.api_key.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub state: String,
    pub county: String,
}

impl SearchParams {
    pub fn new(state: impl Into<String>, county: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            county: county.into(),
        }
    }
}

/// A candidate feature/map server URL in the shape every adapter normalizes to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub provider: String,
    pub confidence: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub validated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SearchResult {
    /// Builds a freshly identified result stamped with the current time.
    pub fn new(
        provider: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        confidence: f64,
    ) -> Self {
        let confidence = clamp_confidence(confidence);
        Self {
            id: Uuid::new_v4().to_string(),
            url: url.into(),
            title: title.into(),
            description: description.into(),
            provider: provider.into(),
            confidence,
            timestamp: OffsetDateTime::now_utc(),
            validated: is_validated(confidence),
            notes: None,
        }
    }

    #[must_use]
    pub fn from_hit(hit: RawHit, provider: &str) -> Self {
        Self::new(provider, hit.url, hit.title, hit.description, hit.confidence)
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// One entry of the `results` array a model is asked to return.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawHit {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub confidence: f64,
}

/// Adapter output after the error boundary: never fails, may carry a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[must_use]
pub fn is_validated(confidence: f64) -> bool {
    confidence > HIGH_CONFIDENCE_THRESHOLD
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(enabled: bool, api_key: Option<&str>) -> Provider {
        Provider {
            id: "openai".to_string(),
            name: "OpenAI".to_string(),
            description: String::new(),
            api_key_required: true,
            enabled,
            api_key: api_key.map(str::to_string),
        }
    }

    #[test]
    fn validation_threshold_is_strict() {
        assert!(SearchResult::new("openai", "u", "t", "d", 0.81).validated);
        assert!(!SearchResult::new("openai", "u", "t", "d", 0.80).validated);
    }

    #[test]
    fn confidence_is_clamped() {
        assert!((SearchResult::new("x", "u", "t", "d", 4.0).confidence - 1.0).abs() < f64::EPSILON);
        assert!(SearchResult::new("x", "u", "t", "d", -1.0).confidence.abs() < f64::EPSILON);
        assert!(SearchResult::new("x", "u", "t", "d", f64::NAN).confidence.abs() < f64::EPSILON);
    }

    #[test]
    fn fresh_results_get_distinct_ids() {
        let a = SearchResult::new("x", "u", "t", "d", 0.5);
        let b = SearchResult::new("x", "u", "t", "d", 0.5);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn enabled_without_key_is_not_usable() {
        assert!(!provider(true, None).is_usable());
        assert!(!provider(true, Some("   ")).is_usable());
        assert!(!provider(false, Some("sk-test")).is_usable());
        assert!(provider(true, Some("sk-test")).is_usable());
    }

    #[test]
    fn update_merges_only_given_fields() {
        let mut target = provider(true, Some("sk-old"));
        target.apply(ProviderUpdate::default().enabled(false));
        assert!(!target.enabled);
        assert_eq!(target.api_key.as_deref(), Some("sk-old"));

        target.apply(ProviderUpdate::default().clear_api_key());
        assert_eq!(target.api_key, None);
        assert_eq!(target.name, "OpenAI");
    }

    #[test]
    fn provider_serializes_with_camel_case_keys() {
        let value = serde_json::to_value(provider(true, Some("k"))).expect("serialize");
        assert_eq!(value["apiKeyRequired"], true);
        assert_eq!(value["apiKey"], "k");
    }

    #[test]
    fn search_mode_accepts_aliases() {
        let mode: SearchMode = serde_json::from_str("\"tavily-only\"").expect("alias");
        assert_eq!(mode, SearchMode::TavilyOnly);
        assert_eq!(SearchMode::TavilyOnly.to_string(), "tavily");
    }
}
