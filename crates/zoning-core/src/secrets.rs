//! API keys supplied through the environment.
//!
//! A variable named `<PREFIX>_<PROVIDER_ID>_API_KEY` (id upper-cased, `-` mapped to
//! `_`) overrides the stored key for that provider and enables it.

use tracing::debug;
use zoning_providers::types::Provider;

pub const DEFAULT_ENV_PREFIX: &str = "ZONING";

#[must_use]
pub fn env_var_name(prefix: &str, provider_id: &str) -> String {
    let id = provider_id.to_ascii_uppercase().replace('-', "_");
    format!("{prefix}_{id}_API_KEY")
}

/// Applies environment keys found through `lookup`; returns how many providers changed.
pub fn apply_env_secrets<F>(providers: &mut [Provider], prefix: &str, lookup: F) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = 0;
    for provider in providers.iter_mut() {
        let name = env_var_name(prefix, &provider.id);
        let Some(key) = lookup(&name).filter(|value| !value.trim().is_empty()) else {
            continue;
        };
        provider.api_key = Some(key);
        provider.enabled = true;
        applied += 1;
        debug!(
            target: "zoning_core",
            provider = %provider.id,
            variable = %name,
            "provider key supplied by environment"
        );
    }
    applied
}

#[must_use]
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
