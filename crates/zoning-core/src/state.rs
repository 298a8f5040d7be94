use std::{collections::HashSet, sync::Arc};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zoning_providers::{
    registry::{ids, providers_for},
    types::{Provider, ProviderUpdate, SearchMode, SearchParams, SearchResult},
    ProviderOutcome,
};

use crate::{
    orchestrator::{SearchError, SearchOrchestrator, SearchOutcome},
    secrets,
    storage::{load_or_default, save_json, Storage},
};

pub const PROVIDERS_KEY: &str = "aiProviders";
pub const HISTORY_KEY: &str = "searchHistory";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchStatus {
    #[default]
    Idle,
    Searching,
    Success,
    Error,
}

impl SearchStatus {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Searching => "searching",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One completed search, kept newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub id: String,
    pub state: String,
    pub county: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub results: Vec<SearchResult>,
}

impl SearchHistoryEntry {
    pub fn new(params: &SearchParams, results: Vec<SearchResult>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: params.state.clone(),
            county: params.county.clone(),
            timestamp: OffsetDateTime::now_utc(),
            results,
        }
    }

    /// Replaces the result sharing `result.id`; returns whether one was found.
    pub fn replace_result(&mut self, result: &SearchResult) -> bool {
        match self.results.iter_mut().find(|r| r.id == result.id) {
            Some(existing) => {
                *existing = result.clone();
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    providers: Vec<Provider>,
    history: Vec<SearchHistoryEntry>,
    current_search: Option<SearchParams>,
    results: Vec<SearchResult>,
    status: SearchStatus,
    last_error: Option<String>,
    outcomes: Vec<ProviderOutcome>,
    /// Bumped by every search start and clear; a search only writes live state
    /// while its generation is still current.
    generation: u64,
}

type SecretLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct AppStoreBuilder {
    storage: Arc<dyn Storage>,
    orchestrator: SearchOrchestrator,
    env_prefix: Option<String>,
    lookup: SecretLookup,
}

impl AppStoreBuilder {
    pub fn new(storage: Arc<dyn Storage>, orchestrator: SearchOrchestrator) -> Self {
        Self {
            storage,
            orchestrator,
            env_prefix: None,
            lookup: Box::new(secrets::process_env),
        }
    }

    /// Overlay `<prefix>_<PROVIDER>_API_KEY` values onto the loaded providers.
    #[must_use]
    pub fn env_secrets(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Replaces the process environment as the source of secrets.
    #[must_use]
    pub fn secret_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.lookup = Box::new(lookup);
        self
    }

    /// Restores persisted providers and history, falling back to the static tables.
    pub async fn load(self) -> AppStore {
        let mode = self.orchestrator.mode();
        let mut providers: Vec<Provider> =
            load_or_default(self.storage.as_ref(), PROVIDERS_KEY, || providers_for(mode)).await;
        reconcile_with_defaults(&mut providers, mode);

        if let Some(prefix) = &self.env_prefix {
            let applied = secrets::apply_env_secrets(&mut providers, prefix, &self.lookup);
            debug!(target: "zoning_core", applied, prefix = %prefix, "applied environment secrets");
        }

        let history: Vec<SearchHistoryEntry> =
            load_or_default(self.storage.as_ref(), HISTORY_KEY, Vec::new).await;

        info!(
            target: "zoning_core",
            mode = %mode,
            providers = providers.len(),
            history = history.len(),
            "application state loaded"
        );

        AppStore {
            storage: self.storage,
            orchestrator: Arc::new(self.orchestrator),
            state: RwLock::new(StoreState {
                providers,
                history,
                ..StoreState::default()
            }),
        }
    }
}

/// Appends table providers missing from a restored list and drops duplicate ids.
fn reconcile_with_defaults(providers: &mut Vec<Provider>, mode: SearchMode) {
    let mut seen = HashSet::new();
    providers.retain(|provider| seen.insert(provider.id.clone()));
    for default in providers_for(mode) {
        if seen.insert(default.id.clone()) {
            providers.push(default);
        }
    }
}

/// Single owner of all mutable application state.
///
/// Every change to providers or history is written through to storage while the
/// state lock is held, so stored documents follow mutation order.
pub struct AppStore {
    storage: Arc<dyn Storage>,
    orchestrator: Arc<SearchOrchestrator>,
    state: RwLock<StoreState>,
}

impl std::fmt::Debug for AppStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppStore")
            .field("storage", &self.storage)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl AppStore {
    pub fn builder(storage: Arc<dyn Storage>, orchestrator: SearchOrchestrator) -> AppStoreBuilder {
        AppStoreBuilder::new(storage, orchestrator)
    }

    pub fn mode(&self) -> SearchMode {
        self.orchestrator.mode()
    }

    pub async fn providers(&self) -> Vec<Provider> {
        self.state.read().await.providers.clone()
    }

    pub async fn search_history(&self) -> Vec<SearchHistoryEntry> {
        self.state.read().await.history.clone()
    }

    pub async fn current_search(&self) -> Option<SearchParams> {
        self.state.read().await.current_search.clone()
    }

    pub async fn search_results(&self) -> Vec<SearchResult> {
        self.state.read().await.results.clone()
    }

    pub async fn search_status(&self) -> SearchStatus {
        self.state.read().await.status
    }

    /// Message explaining the last ERROR status, if any.
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    /// Per-provider diagnostics from the most recent fan-out.
    pub async fn provider_outcomes(&self) -> Vec<ProviderOutcome> {
        self.state.read().await.outcomes.clone()
    }

    /// True when at least one provider can be searched with.
    pub async fn has_configured_providers(&self) -> bool {
        let state = self.state.read().await;
        !self.orchestrator.usable_providers(&state.providers).is_empty()
    }

    /// Looks a result up in the live list first, then newest-first through history.
    pub async fn find_result(&self, id: &str) -> Option<SearchResult> {
        let state = self.state.read().await;
        state
            .results
            .iter()
            .chain(state.history.iter().flat_map(|entry| entry.results.iter()))
            .find(|result| result.id == id)
            .cloned()
    }

    /// Merges `update` into the provider with `id`; returns false for an unknown id.
    pub async fn update_provider(&self, id: &str, update: ProviderUpdate) -> bool {
        let mut state = self.state.write().await;
        let Some(provider) = state.providers.iter_mut().find(|p| p.id == id) else {
            debug!(target: "zoning_core", provider = id, "ignoring update for unknown provider");
            return false;
        };
        provider.apply(update);
        self.persist(PROVIDERS_KEY, &state.providers).await;
        true
    }

    /// Upserts `result` into the live results and patches every history entry holding it.
    pub async fn save_result(&self, result: SearchResult) {
        let mut state = self.state.write().await;

        match state.results.iter_mut().find(|r| r.id == result.id) {
            Some(existing) => *existing = result.clone(),
            None => state.results.push(result.clone()),
        }

        let mut history_changed = false;
        for entry in &mut state.history {
            history_changed |= entry.replace_result(&result);
        }
        if history_changed {
            self.persist(HISTORY_KEY, &state.history).await;
        }
    }

    pub async fn clear_results(&self) {
        let mut state = self.state.write().await;
        state.generation += 1;
        state.results.clear();
        state.status = SearchStatus::Idle;
        state.current_search = None;
        state.last_error = None;
        state.outcomes.clear();
    }

    /// Runs one search and folds its outcome into state.
    ///
    /// The fan-out runs on its own task without holding the state lock; a panic
    /// there is reported as an ERROR status rather than unwinding into the caller.
    pub async fn start_search(&self, params: SearchParams) {
        let (generation, providers) = {
            let mut state = self.state.write().await;
            state.generation += 1;
            state.current_search = Some(params.clone());
            state.status = SearchStatus::Searching;
            state.last_error = None;
            state.outcomes.clear();
            (state.generation, state.providers.clone())
        };

        info!(
            target: "zoning_core",
            state = %params.state,
            county = %params.county,
            "search started"
        );

        let orchestrator = self.orchestrator.clone();
        let task_params = params.clone();
        let joined =
            tokio::spawn(async move { orchestrator.run(&providers, &task_params).await }).await;
        let outcome = joined.unwrap_or_else(|error| Err(SearchError::Aborted(error.to_string())));

        let mut state = self.state.write().await;
        let current = state.generation == generation;
        match outcome {
            Ok(SearchOutcome {
                results, outcomes, ..
            }) => {
                if results.is_empty() {
                    info!(target: "zoning_core", "search finished without results");
                } else {
                    let entry = SearchHistoryEntry::new(&params, results.clone());
                    info!(
                        target: "zoning_core",
                        entry = %entry.id,
                        results = results.len(),
                        "search finished"
                    );
                    state.history.insert(0, entry);
                    self.persist(HISTORY_KEY, &state.history).await;
                }
                if current {
                    state.outcomes = outcomes;
                    state.status = SearchStatus::Success;
                    state.results = results;
                } else {
                    debug!(target: "zoning_core", "search superseded; live results left untouched");
                }
            }
            Err(error) => {
                warn!(target: "zoning_core", error = %error, "search failed");
                if !current {
                    return;
                }
                state.status = SearchStatus::Error;
                state.results.clear();
                state.last_error = Some(error.to_string());
            }
        }
    }

    async fn persist<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(error) = save_json(self.storage.as_ref(), key, value).await {
            warn!(target: "zoning_core", key, error = %error, "failed to persist state");
        }
    }
}
