use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use super::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ResponseFormat};
use crate::adapter::{
    normalize_reply, require_key, send_json, AdapterError, AdapterSettings, SearchAdapter,
};
use crate::prompts;
use crate::registry::ids;
use crate::types::SearchResult;

#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    http: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiAdapter {
    #[must_use]
    pub fn new(http: Client, settings: &AdapterSettings) -> Self {
        Self {
            http,
            base_url: settings.openai_base_url.trim_end_matches('/').to_string(),
            model: settings.openai_model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_output_tokens,
        }
    }

    #[must_use]
    pub fn build_request(&self, state: &str, county: &str) -> ChatCompletionRequest {
        let prompt = prompts::openai(state, county);
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(prompt.system), ChatMessage::user(prompt.user)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat::json_object(),
        }
    }

    pub fn parse_response(
        response: &ChatCompletionResponse,
    ) -> Result<Vec<SearchResult>, AdapterError> {
        let content = response
            .first_content()
            .ok_or_else(|| AdapterError::EmptyResponse(ids::OPENAI.to_string()))?;
        normalize_reply(ids::OPENAI, content)
    }
}

#[async_trait]
impl SearchAdapter for OpenAiAdapter {
    fn provider_id(&self) -> &str {
        ids::OPENAI
    }

    #[instrument(name = "openai_adapter.search", skip(self, api_key))]
    async fn search(
        &self,
        api_key: &str,
        state: &str,
        county: &str,
    ) -> Result<Vec<SearchResult>, AdapterError> {
        let key = require_key(ids::OPENAI, api_key)?;
        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!(target: "zoning_providers", model = %self.model, "requesting chat completion");

        let request = self
            .http
            .post(&url)
            .bearer_auth(key)
            .json(&self.build_request(state, county));
        let response: ChatCompletionResponse = send_json(ids::OPENAI, request).await?;
        Self::parse_response(&response)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn adapter() -> OpenAiAdapter {
        OpenAiAdapter::new(Client::new(), &AdapterSettings::default())
    }

    #[test]
    fn request_is_bounded_and_asks_for_json() {
        let request = serde_json::to_value(adapter().build_request("Texas", "Travis"))
            .expect("serialize");
        assert_eq!(request["model"], "gpt-4o");
        assert_eq!(request["response_format"]["type"], "json_object");
        assert_eq!(request["messages"][0]["role"], "system");
        assert_eq!(request["max_tokens"], 1000);
        assert!(request["temperature"].as_f64().is_some_and(|t| t < 0.5));
    }

    #[test]
    fn completion_content_is_normalized() {
        let response: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content":
                "{\"results\": [{\"url\": \"https://gis.travis.gov/arcgis/rest/services/Zoning/FeatureServer\", \"title\": \"Travis Zoning\", \"description\": \"\", \"confidence\": 0.9}]}"
            }}]
        }))
        .expect("response");
        let results = OpenAiAdapter::parse_response(&response).expect("results");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].provider, ids::OPENAI);
        assert!(results[0].validated);
    }

    #[test]
    fn missing_content_is_empty_response() {
        let response: ChatCompletionResponse =
            serde_json::from_value(json!({"choices": []})).expect("response");
        assert!(matches!(
            OpenAiAdapter::parse_response(&response),
            Err(AdapterError::EmptyResponse(_))
        ));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let response = adapter().search_response("", "Texas", "Travis").await;
        assert!(response.results.is_empty());
        assert!(response.error.expect("error").contains("no API key"));
    }
}
