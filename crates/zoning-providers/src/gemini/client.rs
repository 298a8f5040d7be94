use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use super::types::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part};
use crate::adapter::{
    normalize_reply, require_key, send_json, AdapterError, AdapterSettings, SearchAdapter,
};
use crate::prompts;
use crate::registry::ids;
use crate::types::SearchResult;

#[derive(Debug, Clone)]
pub struct GeminiAdapter {
    http: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiAdapter {
    #[must_use]
    pub fn new(http: Client, settings: &AdapterSettings) -> Self {
        Self {
            http,
            base_url: settings.gemini_base_url.trim_end_matches('/').to_string(),
            model: settings.gemini_model.clone(),
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
        }
    }

    /// System and user prompts go out as two parts of a single user turn.
    #[must_use]
    pub fn build_request(&self, state: &str, county: &str) -> GenerateContentRequest {
        let prompt = prompts::gemini(state, county);
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(prompt.system), Part::text(prompt.user)],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
                response_mime_type: "application/json".to_string(),
            },
        }
    }

    pub fn parse_response(
        response: &GenerateContentResponse,
    ) -> Result<Vec<SearchResult>, AdapterError> {
        let Some(text) = response.text() else {
            if let Some(reason) = response
                .prompt_feedback
                .as_ref()
                .and_then(|feedback| feedback.block_reason.as_deref())
            {
                warn!(target: "zoning_providers", reason, "gemini blocked the prompt");
            }
            return Err(AdapterError::EmptyResponse(ids::GEMINI.to_string()));
        };
        normalize_reply(ids::GEMINI, &text)
    }
}

#[async_trait]
impl SearchAdapter for GeminiAdapter {
    fn provider_id(&self) -> &str {
        ids::GEMINI
    }

    #[instrument(name = "gemini_adapter.search", skip(self, api_key))]
    async fn search(
        &self,
        api_key: &str,
        state: &str,
        county: &str,
    ) -> Result<Vec<SearchResult>, AdapterError> {
        let key = require_key(ids::GEMINI, api_key)?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        debug!(target: "zoning_providers", model = %self.model, "requesting generated content");

        let request = self
            .http
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&self.build_request(state, county));
        let response: GenerateContentResponse = send_json(ids::GEMINI, request).await?;
        Self::parse_response(&response)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_uses_camel_case_generation_config() {
        let adapter = GeminiAdapter::new(Client::new(), &AdapterSettings::default());
        let request =
            serde_json::to_value(adapter.build_request("Iowa", "Polk")).expect("serialize");
        assert_eq!(request["generationConfig"]["maxOutputTokens"], 1000);
        assert_eq!(request["contents"][0]["parts"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn parts_are_joined_before_parsing() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"text": "{\"results\": [{\"url\": \"https://polkcountyiowa.gov/arcgis/rest/services/"},
                {"text": "Zoning/FeatureServer\", \"title\": \"Polk\", \"description\": \"\", \"confidence\": 0.85}]}"}
            ]}}]
        }))
        .expect("response");
        let results = GeminiAdapter::parse_response(&response).expect("results");
        assert_eq!(results.len(), 1);
        assert!(results[0].url.ends_with("Zoning/FeatureServer"));
        assert_eq!(results[0].provider, ids::GEMINI);
    }

    #[test]
    fn blocked_prompt_is_empty_response() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .expect("response");
        assert!(matches!(
            GeminiAdapter::parse_response(&response),
            Err(AdapterError::EmptyResponse(_))
        ));
    }
}
