pub mod adapter;
pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod prompts;
pub mod registry;
pub mod tavily;
pub mod types;

use std::{collections::HashMap, fmt, sync::Arc, time::Duration, time::Instant};

use anyhow::Result;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

pub use adapter::{AdapterError, AdapterSettings, SearchAdapter};
use anthropic::AnthropicAdapter;
use gemini::GeminiAdapter;
use openai::OpenAiAdapter;
use tavily::TavilyAdapter;
use types::{Provider, SearchResponse, SearchResult};

/// How one provider fared during a fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOutcome {
    pub provider: String,
    pub result_count: usize,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Merged output of a fan-out, results in provider-list order.
#[derive(Debug, Clone, Default)]
pub struct FanOutReport {
    pub results: Vec<SearchResult>,
    pub outcomes: Vec<ProviderOutcome>,
}

/// Maps provider ids to the adapters that serve them.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn SearchAdapter>>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("providers", &self.provider_ids())
            .finish()
    }
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the OpenAI, Anthropic, Gemini and Tavily adapters sharing one HTTP client.
    pub fn with_defaults(settings: &AdapterSettings) -> Result<Self> {
        let http = adapter::build_http_client(settings)?;
        let mut registry = Self::new();
        registry.register(Arc::new(OpenAiAdapter::new(http.clone(), settings)));
        registry.register(Arc::new(AnthropicAdapter::new(http.clone(), settings)));
        registry.register(Arc::new(GeminiAdapter::new(http.clone(), settings)));
        registry.register(Arc::new(TavilyAdapter::new(http, settings)));
        Ok(registry)
    }

    /// Adds an adapter, returning the one it replaced.
    pub fn register(&mut self, adapter: Arc<dyn SearchAdapter>) -> Option<Arc<dyn SearchAdapter>> {
        self.adapters
            .insert(adapter.provider_id().to_string(), adapter)
    }

    #[must_use]
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn SearchAdapter>> {
        self.adapters.get(provider_id).cloned()
    }

    #[must_use]
    pub fn contains(&self, provider_id: &str) -> bool {
        self.adapters.contains_key(provider_id)
    }

    #[must_use]
    pub fn provider_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Queries every usable provider concurrently and waits for all of them.
    ///
    /// Providers without an adapter, failing adapters and adapters that exceed
    /// `timeout` all contribute zero results; nothing here returns an error.
    pub async fn search_all(
        &self,
        providers: &[Provider],
        state: &str,
        county: &str,
        timeout: Option<Duration>,
    ) -> FanOutReport {
        let calls = providers
            .iter()
            .filter(|provider| provider.is_usable())
            .map(|provider| {
                let adapter = self.get(&provider.id);
                let api_key = provider.credential().unwrap_or_default().to_string();
                let provider_id = provider.id.clone();
                async move {
                    let started = Instant::now();
                    let response = match adapter {
                        Some(adapter) => {
                            run_adapter(adapter.as_ref(), &api_key, state, county, timeout).await
                        }
                        None => {
                            debug!(
                                target: "zoning_providers",
                                provider = %provider_id,
                                "no adapter registered; provider contributes no results"
                            );
                            SearchResponse {
                                results: Vec::new(),
                                error: Some(AdapterError::Unsupported(provider_id.clone()).to_string()),
                            }
                        }
                    };
                    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                    (provider_id, response, latency_ms)
                }
            });

        let settled = join_all(calls).await;

        let mut report = FanOutReport::default();
        for (provider, response, latency_ms) in settled {
            info!(
                target: "zoning_providers",
                provider = %provider,
                results = response.results.len(),
                latency_ms,
                failed = response.error.is_some(),
                "provider settled"
            );
            report.outcomes.push(ProviderOutcome {
                provider,
                result_count: response.results.len(),
                latency_ms,
                error: response.error,
            });
            report.results.extend(response.results);
        }
        report
    }
}

async fn run_adapter(
    adapter: &dyn SearchAdapter,
    api_key: &str,
    state: &str,
    county: &str,
    timeout: Option<Duration>,
) -> SearchResponse {
    let call = adapter.search_response(api_key, state, county);
    let Some(limit) = timeout else {
        return call.await;
    };

    if let Ok(response) = tokio::time::timeout(limit, call).await {
        response
    } else {
        let error = AdapterError::Timeout {
            provider: adapter.provider_id().to_string(),
            seconds: limit.as_secs(),
        };
        warn!(target: "zoning_providers", error = %error, "provider timed out");
        SearchResponse {
            results: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}
