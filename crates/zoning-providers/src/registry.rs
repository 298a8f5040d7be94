//! Static provider tables and reference data.
//!
//! These only seed application state when nothing has been persisted yet.

use crate::types::{Provider, SearchMode};

pub mod ids {
    pub const OPENAI: &str = "openai";
    pub const ANTHROPIC: &str = "anthropic";
    pub const GEMINI: &str = "google-gemini";
    pub const TAVILY: &str = "tavily";
    pub const JINA: &str = "jina-ai";
    pub const SERPER: &str = "serper-api";
    pub const CUSTOM_SEARCH: &str = "custom-search";
    /// Provider id stamped on the built-in demo results.
    pub const DEMO: &str = "demo";
}

#[derive(Debug, Clone, Copy)]
pub struct ProviderDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub api_key_required: bool,
    pub enabled: bool,
}

impl ProviderDescriptor {
    #[must_use]
    pub fn to_provider(&self) -> Provider {
        Provider {
            id: self.id.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            api_key_required: self.api_key_required,
            enabled: self.enabled,
            api_key: None,
        }
    }
}

pub const MULTI_PROVIDER_TABLE: &[ProviderDescriptor] = &[
    ProviderDescriptor {
        id: ids::OPENAI,
        name: "OpenAI",
        description: "GPT chat models prompted to locate and rate zoning feature server URLs.",
        api_key_required: true,
        enabled: true,
    },
    ProviderDescriptor {
        id: ids::ANTHROPIC,
        name: "Anthropic",
        description: "Claude models prompted to locate and rate zoning feature server URLs.",
        api_key_required: true,
        enabled: false,
    },
    ProviderDescriptor {
        id: ids::GEMINI,
        name: "Google Gemini",
        description: "Google's Gemini models prompted for county GIS zoning endpoints.",
        api_key_required: true,
        enabled: false,
    },
    ProviderDescriptor {
        id: ids::TAVILY,
        name: "Tavily",
        description: "Web search API; hits are kept only when they point at a FeatureServer or MapServer.",
        api_key_required: true,
        enabled: false,
    },
    ProviderDescriptor {
        id: ids::JINA,
        name: "Jina AI",
        description: "Search and content tooling. Catalogued only; no adapter ships yet.",
        api_key_required: true,
        enabled: false,
    },
    ProviderDescriptor {
        id: ids::SERPER,
        name: "Serper API",
        description: "Google search results API. Catalogued only; no adapter ships yet.",
        api_key_required: true,
        enabled: false,
    },
    ProviderDescriptor {
        id: ids::CUSTOM_SEARCH,
        name: "Custom Search Engine",
        description: "Placeholder for an in-house search backend.",
        api_key_required: true,
        enabled: false,
    },
];

pub const TAVILY_ONLY_TABLE: &[ProviderDescriptor] = &[ProviderDescriptor {
    id: ids::TAVILY,
    name: "Tavily",
    description: "Web search API; hits are kept only when they point at a FeatureServer or MapServer.",
    api_key_required: true,
    enabled: true,
}];

#[must_use]
pub fn default_providers() -> Vec<Provider> {
    MULTI_PROVIDER_TABLE
        .iter()
        .map(ProviderDescriptor::to_provider)
        .collect()
}

#[must_use]
pub fn tavily_providers() -> Vec<Provider> {
    TAVILY_ONLY_TABLE
        .iter()
        .map(ProviderDescriptor::to_provider)
        .collect()
}

#[must_use]
pub fn providers_for(mode: SearchMode) -> Vec<Provider> {
    match mode {
        SearchMode::Multi => default_providers(),
        SearchMode::TavilyOnly => tavily_providers(),
    }
}

pub const US_STATES: &[&str] = &[
    "Alabama",
    "Alaska",
    "Arizona",
    "Arkansas",
    "California",
    "Colorado",
    "Connecticut",
    "Delaware",
    "Florida",
    "Georgia",
    "Hawaii",
    "Idaho",
    "Illinois",
    "Indiana",
    "Iowa",
    "Kansas",
    "Kentucky",
    "Louisiana",
    "Maine",
    "Maryland",
    "Massachusetts",
    "Michigan",
    "Minnesota",
    "Mississippi",
    "Missouri",
    "Montana",
    "Nebraska",
    "Nevada",
    "New Hampshire",
    "New Jersey",
    "New Mexico",
    "New York",
    "North Carolina",
    "North Dakota",
    "Ohio",
    "Oklahoma",
    "Oregon",
    "Pennsylvania",
    "Rhode Island",
    "South Carolina",
    "South Dakota",
    "Tennessee",
    "Texas",
    "Utah",
    "Vermont",
    "Virginia",
    "Washington",
    "West Virginia",
    "Wisconsin",
    "Wyoming",
];

/// Canonical spelling of a state name, matched case-insensitively.
#[must_use]
pub fn canonical_state(name: &str) -> Option<&'static str> {
    let trimmed = name.trim();
    US_STATES
        .iter()
        .copied()
        .find(|state| state.eq_ignore_ascii_case(trimmed))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn provider_ids_are_unique() {
        let ids: HashSet<_> = MULTI_PROVIDER_TABLE.iter().map(|d| d.id).collect();
        assert_eq!(ids.len(), MULTI_PROVIDER_TABLE.len());
    }

    #[test]
    fn only_openai_enabled_by_default() {
        let enabled: Vec<_> = default_providers()
            .into_iter()
            .filter(|p| p.enabled)
            .map(|p| p.id)
            .collect();
        assert_eq!(enabled, vec![ids::OPENAI.to_string()]);
    }

    #[test]
    fn defaults_carry_no_credentials() {
        assert!(default_providers().iter().all(|p| p.api_key.is_none()));
        assert!(!tavily_providers()[0].is_usable());
    }

    #[test]
    fn tavily_table_has_single_enabled_entry() {
        let providers = providers_for(SearchMode::TavilyOnly);
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].id, ids::TAVILY);
        assert!(providers[0].enabled);
    }

    #[test]
    fn state_lookup_is_case_insensitive() {
        assert_eq!(US_STATES.len(), 50);
        assert_eq!(canonical_state("new york"), Some("New York"));
        assert_eq!(canonical_state(" Texas "), Some("Texas"));
        assert_eq!(canonical_state("Ontario"), None);
    }
}
