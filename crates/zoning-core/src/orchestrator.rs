use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tracing::{info, instrument};
use zoning_providers::{
    registry::ids,
    types::{Provider, SearchMode, SearchParams, SearchResult},
    AdapterRegistry, ProviderOutcome,
};

use crate::demo::demo_results;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("{0} API key is not configured")]
    MissingCredential(String),
    #[error("search task failed: {0}")]
    Aborted(String),
}

/// Merged result of one orchestrated search.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub outcomes: Vec<ProviderOutcome>,
    /// The results are the built-in demo dataset.
    pub demo: bool,
}

/// Picks the providers a search may use and fans the query out to them.
#[derive(Debug, Clone)]
pub struct SearchOrchestrator {
    registry: Arc<AdapterRegistry>,
    mode: SearchMode,
    timeout: Option<Duration>,
}

impl SearchOrchestrator {
    pub fn new(registry: AdapterRegistry, mode: SearchMode) -> Self {
        Self {
            registry: Arc::new(registry),
            mode,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// Providers eligible for the fan-out under the current mode.
    pub fn usable_providers(&self, providers: &[Provider]) -> Vec<Provider> {
        providers
            .iter()
            .filter(|provider| provider.is_usable())
            .filter(|provider| match self.mode {
                SearchMode::Multi => true,
                SearchMode::TavilyOnly => provider.id == ids::TAVILY,
            })
            .cloned()
            .collect()
    }

    #[instrument(name = "orchestrator.run", skip(self, providers), fields(mode = %self.mode))]
    pub async fn run(
        &self,
        providers: &[Provider],
        params: &SearchParams,
    ) -> Result<SearchOutcome, SearchError> {
        let usable = self.usable_providers(providers);

        if usable.is_empty() {
            return match self.mode {
                SearchMode::Multi => {
                    info!(target: "zoning_core", "no configured providers; serving demo results");
                    Ok(SearchOutcome {
                        results: demo_results(),
                        outcomes: Vec::new(),
                        demo: true,
                    })
                }
                SearchMode::TavilyOnly => {
                    Err(SearchError::MissingCredential("Tavily".to_string()))
                }
            };
        }

        let report = self
            .registry
            .search_all(&usable, &params.state, &params.county, self.timeout)
            .await;

        info!(
            target: "zoning_core",
            providers = usable.len(),
            results = report.results.len(),
            "fan-out settled"
        );

        Ok(SearchOutcome {
            results: report.results,
            outcomes: report.outcomes,
            demo: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use zoning_providers::registry::{default_providers, tavily_providers};

    use super::*;

    #[tokio::test]
    async fn multi_mode_without_credentials_serves_demo() {
        let orchestrator = SearchOrchestrator::new(AdapterRegistry::new(), SearchMode::Multi);
        let outcome = orchestrator
            .run(&default_providers(), &SearchParams::new("Texas", "Travis"))
            .await
            .expect("demo outcome");
        assert!(outcome.demo);
        assert_eq!(outcome.results, demo_results());
    }

    #[tokio::test]
    async fn tavily_mode_without_credentials_fails() {
        let orchestrator = SearchOrchestrator::new(AdapterRegistry::new(), SearchMode::TavilyOnly);
        let error = orchestrator
            .run(&tavily_providers(), &SearchParams::new("Texas", "Travis"))
            .await
            .expect_err("missing credential");
        assert_eq!(error, SearchError::MissingCredential("Tavily".to_string()));
        assert_eq!(error.to_string(), "Tavily API key is not configured");
    }

    #[test]
    fn tavily_mode_ignores_other_providers() {
        let orchestrator = SearchOrchestrator::new(AdapterRegistry::new(), SearchMode::TavilyOnly);
        let mut providers = default_providers();
        for provider in &mut providers {
            provider.enabled = true;
            provider.api_key = Some("key".to_string());
        }
        let usable = orchestrator.usable_providers(&providers);
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].id, ids::TAVILY);
    }
}
