//! Fixed results served when no provider is usable, so the tool can be explored
//! without credentials.

use once_cell::sync::Lazy;
use time::OffsetDateTime;
use zoning_providers::{registry::ids, types::SearchResult};

const DEMO_NOTE: &str = "This is a mock result for demonstration purposes.";

static DEMO_RESULTS: Lazy<Vec<SearchResult>> = Lazy::new(|| {
    let captured_at = OffsetDateTime::now_utc();
    vec![
        SearchResult {
            id: "demo-1".to_string(),
            url: "https://gis.example.gov/arcgis/rest/services/Planning/ZoningDistricts/FeatureServer"
                .to_string(),
            title: "Example County Zoning Districts".to_string(),
            description: "Official zoning district boundaries and classifications for Example \
                          County. This is demo data for preview purposes."
                .to_string(),
            provider: ids::DEMO.to_string(),
            confidence: 0.95,
            timestamp: captured_at,
            validated: true,
            notes: Some(DEMO_NOTE.to_string()),
        },
        SearchResult {
            id: "demo-2".to_string(),
            url: "https://maps.example.com/arcgis/rest/services/Zoning/MapServer".to_string(),
            title: "Example City Planning Zones".to_string(),
            description: "Zoning information including district boundaries, land use, and \
                          development regulations. This is demo data."
                .to_string(),
            provider: ids::DEMO.to_string(),
            confidence: 0.85,
            timestamp: captured_at,
            validated: true,
            notes: Some(DEMO_NOTE.to_string()),
        },
    ]
});

#[must_use]
pub fn demo_results() -> Vec<SearchResult> {
    DEMO_RESULTS.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_is_stable_across_calls() {
        assert_eq!(demo_results(), demo_results());
        assert_eq!(demo_results().len(), 2);
    }

    #[test]
    fn demo_entries_point_at_feature_services() {
        for result in demo_results() {
            assert!(zoning_providers::adapter::is_feature_service_url(&result.url));
            assert_eq!(result.provider, ids::DEMO);
            assert!(result.validated);
        }
    }
}
