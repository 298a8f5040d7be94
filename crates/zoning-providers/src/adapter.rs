use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{RawHit, SearchResponse, SearchResult};

static FENCED_JSON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)\s*```").expect("fenced json regex"));
static FEATURE_SERVICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)featureserver|mapserver").expect("feature service regex"));

/// Longest error body kept from a failed provider response.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("no API key configured for {0}")]
    MissingCredential(String),
    #[error("request to {provider} failed: {message}")]
    Http { provider: String, message: String },
    #[error("{provider} returned status {status}: {body}")]
    Status {
        provider: String,
        status: StatusCode,
        body: String,
    },
    #[error("no content in {0} response")]
    EmptyResponse(String),
    #[error("failed to parse {provider} response: {message}")]
    Parse { provider: String, message: String },
    #[error("{0} response did not contain a results array")]
    MissingResults(String),
    #[error("{provider} did not respond within {seconds}s")]
    Timeout { provider: String, seconds: u64 },
    #[error("no adapter registered for provider {0}")]
    Unsupported(String),
}

/// Capability shared by every provider integration.
#[async_trait]
pub trait SearchAdapter: Send + Sync {
    fn provider_id(&self) -> &str;

    async fn search(
        &self,
        api_key: &str,
        state: &str,
        county: &str,
    ) -> Result<Vec<SearchResult>, AdapterError>;

    /// Runs `search` and folds any failure into an empty response with a message.
    async fn search_response(&self, api_key: &str, state: &str, county: &str) -> SearchResponse {
        match self.search(api_key, state, county).await {
            Ok(results) => SearchResponse {
                results,
                error: None,
            },
            Err(error) => {
                warn!(
                    target: "zoning_providers",
                    provider = self.provider_id(),
                    error = %error,
                    "provider search failed"
                );
                SearchResponse {
                    results: Vec::new(),
                    error: Some(error.to_string()),
                }
            }
        }
    }
}

/// Endpoints, models and HTTP limits for the bundled adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterSettings {
    pub openai_base_url: String,
    pub openai_model: String,
    pub anthropic_base_url: String,
    pub anthropic_model: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub tavily_base_url: String,
    pub tavily_max_results: u32,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            openai_base_url: "https://api.openai.com".to_string(),
            openai_model: "gpt-4o".to_string(),
            anthropic_base_url: "https://api.anthropic.com".to_string(),
            anthropic_model: "claude-3-opus-20240229".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            gemini_model: "gemini-1.5-pro".to_string(),
            tavily_base_url: "https://api.tavily.com".to_string(),
            tavily_max_results: 10,
            temperature: 0.3,
            max_output_tokens: 1000,
            request_timeout_secs: 45,
            user_agent: "ZoningFinder/0.1".to_string(),
        }
    }
}

pub fn build_http_client(settings: &AdapterSettings) -> Result<Client> {
    Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(StdDuration::from_secs(settings.request_timeout_secs))
        .gzip(true)
        .build()
        .context("failed to build reqwest client")
}

pub(crate) fn require_key<'a>(provider: &str, api_key: &'a str) -> Result<&'a str, AdapterError> {
    let key = api_key.trim();
    if key.is_empty() {
        return Err(AdapterError::MissingCredential(provider.to_string()));
    }
    Ok(key)
}

/// Sends a prepared request and decodes a JSON body, mapping every failure to `AdapterError`.
pub(crate) async fn send_json<T>(provider: &str, request: RequestBuilder) -> Result<T, AdapterError>
where
    T: DeserializeOwned,
{
    let response = request.send().await.map_err(|err| AdapterError::Http {
        provider: provider.to_string(),
        message: err.to_string(),
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|err| AdapterError::Http {
        provider: provider.to_string(),
        message: err.to_string(),
    })?;

    if !status.is_success() {
        warn!(target: "zoning_providers", provider, %status, "provider request rejected");
        return Err(AdapterError::Status {
            provider: provider.to_string(),
            status,
            body: truncate(&body, MAX_ERROR_BODY),
        });
    }

    serde_json::from_str(&body).map_err(|err| AdapterError::Parse {
        provider: provider.to_string(),
        message: err.to_string(),
    })
}

/// Strips Markdown code fences and surrounding prose from a model reply.
#[must_use]
pub fn extract_json_block(text: &str) -> &str {
    let block = FENCED_JSON_RE
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map_or(text, |inner| inner.as_str());

    match (block.find('{'), block.rfind('}')) {
        (Some(start), Some(end)) if start < end => &block[start..=end],
        _ => block.trim(),
    }
}

/// Parses the `{"results": [...]}` payload a model was asked to produce.
///
/// Entries that do not deserialize or carry an empty URL are skipped.
pub fn parse_hits(provider: &str, text: &str) -> Result<Vec<RawHit>, AdapterError> {
    let value: Value =
        serde_json::from_str(extract_json_block(text)).map_err(|err| AdapterError::Parse {
            provider: provider.to_string(),
            message: err.to_string(),
        })?;

    let Some(items) = value.get("results").and_then(Value::as_array) else {
        return Err(AdapterError::MissingResults(provider.to_string()));
    };

    let hits = items
        .iter()
        .filter_map(|item| match RawHit::deserialize(item) {
            Ok(hit) if !hit.url.trim().is_empty() => Some(hit),
            Ok(_) => {
                debug!(target: "zoning_providers", provider, "skipping hit without url");
                None
            }
            Err(error) => {
                debug!(target: "zoning_providers", provider, error = %error, "skipping malformed hit");
                None
            }
        })
        .collect();
    Ok(hits)
}

/// Parses a model reply and normalizes every hit for `provider`.
pub fn normalize_reply(provider: &str, text: &str) -> Result<Vec<SearchResult>, AdapterError> {
    Ok(parse_hits(provider, text)?
        .into_iter()
        .map(|hit| SearchResult::from_hit(hit, provider))
        .collect())
}

/// True when the URL points at an ArcGIS FeatureServer or MapServer.
#[must_use]
pub fn is_feature_service_url(url: &str) -> bool {
    FEATURE_SERVICE_RE.is_match(url)
}

fn truncate(value: &str, max: usize) -> String {
    if value.len() <= max {
        value.to_string()
    } else {
        let mut truncated = value.chars().take(max).collect::<String>();
        truncated.push('…');
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_reply_is_unwrapped() {
        let text = "Here you go:\n```json\n{\"results\": []}\n```\nGood luck.";
        assert_eq!(extract_json_block(text), "{\"results\": []}");
    }

    #[test]
    fn fence_info_string_is_ignored() {
        let body = "{\"results\":[{\"url\":\"https://a/FeatureServer\",\"confidence\":0.9}]}";
        for fence in ["```JSON", "```javascript", "```", "```json5"] {
            let text = format!("{fence}\n{body}\n```");
            let results = normalize_reply("openai", &text).expect("fenced reply parses");
            assert_eq!(results.len(), 1, "{fence}");
            assert_eq!(results[0].url, "https://a/FeatureServer");
        }
    }

    #[test]
    fn single_line_fence_is_unwrapped() {
        assert_eq!(extract_json_block("```{\"results\": []}```"), "{\"results\": []}");
    }

    #[test]
    fn prose_around_object_is_dropped() {
        let text = "Sure! {\"results\": [{\"url\": \"https://a/FeatureServer\"}]} Hope that helps.";
        assert_eq!(
            extract_json_block(text),
            "{\"results\": [{\"url\": \"https://a/FeatureServer\"}]}"
        );
    }

    #[test]
    fn hits_are_normalized_with_provider_and_validation() {
        let text = r#"{"results": [
            {"url": "https://gis.example.gov/arcgis/rest/services/Zoning/FeatureServer", "title": "Zoning", "description": "County zoning", "confidence": 0.92},
            {"url": "https://maps.example.com/arcgis/rest/services/Zoning/MapServer", "title": "Zones", "confidence": 0.6}
        ]}"#;
        let results = normalize_reply("openai", text).expect("parse");
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.provider == "openai"));
        assert!(results[0].validated);
        assert!(!results[1].validated);
        assert_eq!(results[1].description, "");
    }

    #[test]
    fn malformed_and_urlless_hits_are_skipped() {
        let text = r#"{"results": [{"title": "no url"}, {"url": ""}, {"url": "https://x/FeatureServer", "confidence": 0.5}]}"#;
        let hits = parse_hits("anthropic", text).expect("parse");
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn missing_results_array_is_an_error() {
        let error = parse_hits("openai", r#"{"urls": []}"#).expect_err("missing results");
        assert!(matches!(error, AdapterError::MissingResults(_)));
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let error = parse_hits("openai", "I could not find anything.").expect_err("no json");
        assert!(matches!(error, AdapterError::Parse { .. }));
    }

    #[test]
    fn feature_service_filter_is_case_insensitive() {
        assert!(is_feature_service_url(
            "https://x.gov/arcgis/rest/services/A/FeatureServer"
        ));
        assert!(is_feature_service_url("https://x.gov/arcgis/rest/services/A/mapserver/0"));
        assert!(!is_feature_service_url("https://x.gov/page.html"));
    }

    #[test]
    fn blank_key_is_rejected() {
        assert!(matches!(
            require_key("tavily", "  "),
            Err(AdapterError::MissingCredential(_))
        ));
        assert_eq!(require_key("tavily", " k ").ok(), Some("k"));
    }
}
