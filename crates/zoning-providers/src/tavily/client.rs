use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use super::types::{TavilySearchRequest, TavilySearchResponse};
use crate::adapter::{
    is_feature_service_url, require_key, send_json, AdapterError, AdapterSettings, SearchAdapter,
};
use crate::prompts;
use crate::registry::ids;
use crate::types::SearchResult;

#[derive(Debug, Clone)]
pub struct TavilyAdapter {
    http: Client,
    base_url: String,
    max_results: u32,
}

impl TavilyAdapter {
    #[must_use]
    pub fn new(http: Client, settings: &AdapterSettings) -> Self {
        Self {
            http,
            base_url: settings.tavily_base_url.trim_end_matches('/').to_string(),
            max_results: settings.tavily_max_results,
        }
    }

    #[must_use]
    pub fn build_request(&self, api_key: &str, state: &str, county: &str) -> TavilySearchRequest {
        TavilySearchRequest {
            api_key: api_key.to_string(),
            query: prompts::tavily_query(state, county),
            search_depth: "advanced".to_string(),
            include_answer: true,
            max_results: self.max_results,
        }
    }

    /// Keeps feature/map server hits and normalizes them in Tavily's ranking order.
    pub fn normalize(response: TavilySearchResponse) -> Result<Vec<SearchResult>, AdapterError> {
        let hits = response
            .results
            .ok_or_else(|| AdapterError::MissingResults(ids::TAVILY.to_string()))?;
        let notes = response
            .answer
            .map(|answer| answer.trim().to_string())
            .filter(|answer| !answer.is_empty());

        let total = hits.len();
        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|hit| is_feature_service_url(&hit.url))
            .map(|hit| {
                let result =
                    SearchResult::new(ids::TAVILY, hit.url, hit.title, hit.content, hit.score);
                match &notes {
                    Some(notes) => result.with_notes(notes.clone()),
                    None => result,
                }
            })
            .collect();

        debug!(
            target: "zoning_providers",
            total,
            kept = results.len(),
            "filtered tavily hits to feature services"
        );
        Ok(results)
    }
}

#[async_trait]
impl SearchAdapter for TavilyAdapter {
    fn provider_id(&self) -> &str {
        ids::TAVILY
    }

    #[instrument(name = "tavily_adapter.search", skip(self, api_key))]
    async fn search(
        &self,
        api_key: &str,
        state: &str,
        county: &str,
    ) -> Result<Vec<SearchResult>, AdapterError> {
        let key = require_key(ids::TAVILY, api_key)?;
        let url = format!("{}/search", self.base_url);

        let request = self
            .http
            .post(&url)
            .json(&self.build_request(key, state, county));
        let response: TavilySearchResponse = send_json(ids::TAVILY, request).await?;
        Self::normalize(response)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn response(value: serde_json::Value) -> TavilySearchResponse {
        serde_json::from_value(value).expect("tavily response")
    }

    #[test]
    fn only_feature_service_hits_survive() {
        let results = TavilyAdapter::normalize(response(json!({
            "answer": "Travis County publishes zoning through ArcGIS.",
            "results": [
                {"url": "https://x.gov/arcgis/rest/services/A/FeatureServer", "title": "A", "content": "layer", "score": 0.91},
                {"url": "https://x.gov/page.html", "title": "Page", "content": "text", "score": 0.99}
            ]
        })))
        .expect("results");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://x.gov/arcgis/rest/services/A/FeatureServer");
        assert_eq!(results[0].provider, ids::TAVILY);
        assert!(results[0].validated);
        assert_eq!(
            results[0].notes.as_deref(),
            Some("Travis County publishes zoning through ArcGIS.")
        );
    }

    #[test]
    fn score_drives_validation() {
        let results = TavilyAdapter::normalize(response(json!({
            "results": [
                {"url": "https://a/MapServer", "score": 0.81},
                {"url": "https://b/MapServer", "score": 0.8}
            ]
        })))
        .expect("results");
        assert!(results[0].validated);
        assert!(!results[1].validated);
        assert!(results.iter().all(|r| r.notes.is_none()));
    }

    #[test]
    fn missing_results_is_an_error() {
        assert!(matches!(
            TavilyAdapter::normalize(response(json!({"answer": "none"}))),
            Err(AdapterError::MissingResults(_))
        ));
    }

    #[test]
    fn request_asks_for_answer() {
        let adapter = TavilyAdapter::new(Client::new(), &AdapterSettings::default());
        let request = adapter.build_request("tvly-key", "Ohio", "Franklin");
        assert!(request.include_answer);
        assert_eq!(request.max_results, 10);
        assert!(request.query.contains("Franklin County Ohio"));
    }
}
