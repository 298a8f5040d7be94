use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use super::types::{InputMessage, MessagesRequest, MessagesResponse, ANTHROPIC_VERSION};
use crate::adapter::{
    normalize_reply, require_key, send_json, AdapterError, AdapterSettings, SearchAdapter,
};
use crate::prompts;
use crate::registry::ids;
use crate::types::SearchResult;

#[derive(Debug, Clone)]
pub struct AnthropicAdapter {
    http: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicAdapter {
    #[must_use]
    pub fn new(http: Client, settings: &AdapterSettings) -> Self {
        Self {
            http,
            base_url: settings.anthropic_base_url.trim_end_matches('/').to_string(),
            model: settings.anthropic_model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_output_tokens,
        }
    }

    #[must_use]
    pub fn build_request(&self, state: &str, county: &str) -> MessagesRequest {
        let prompt = prompts::anthropic(state, county);
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: prompt.system,
            messages: vec![InputMessage {
                role: "user".to_string(),
                content: prompt.user,
            }],
            temperature: self.temperature,
        }
    }

    pub fn parse_response(response: &MessagesResponse) -> Result<Vec<SearchResult>, AdapterError> {
        let text = response
            .first_text()
            .ok_or_else(|| AdapterError::EmptyResponse(ids::ANTHROPIC.to_string()))?;
        normalize_reply(ids::ANTHROPIC, text)
    }
}

#[async_trait]
impl SearchAdapter for AnthropicAdapter {
    fn provider_id(&self) -> &str {
        ids::ANTHROPIC
    }

    #[instrument(name = "anthropic_adapter.search", skip(self, api_key))]
    async fn search(
        &self,
        api_key: &str,
        state: &str,
        county: &str,
    ) -> Result<Vec<SearchResult>, AdapterError> {
        let key = require_key(ids::ANTHROPIC, api_key)?;
        let url = format!("{}/v1/messages", self.base_url);
        debug!(target: "zoning_providers", model = %self.model, "requesting message");

        let request = self
            .http
            .post(&url)
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.build_request(state, county));
        let response: MessagesResponse = send_json(ids::ANTHROPIC, request).await?;
        if response.stop_reason.as_deref() == Some("max_tokens") {
            debug!(target: "zoning_providers", "anthropic reply hit the token cap");
        }
        Self::parse_response(&response)
    }
}
