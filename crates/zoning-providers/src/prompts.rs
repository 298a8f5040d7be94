//! Prompt and query text sent to each provider.

const RESPONSE_FORMAT: &str = r#"Respond with a single JSON object of the form {"results": [{"url": string, "title": string, "description": string, "confidence": number between 0 and 1}]}. Return {"results": []} when nothing credible is found."#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPrompt {
    pub system: String,
    pub user: String,
}

#[must_use]
pub fn openai(state: &str, county: &str) -> SearchPrompt {
    SearchPrompt {
        system: format!(
            "You locate ArcGIS feature server URLs that publish zoning district layers.\n\
             1. Find feature server URLs for zoning districts in the requested county.\n\
             2. Only return URLs whose path contains FeatureServer or MapServer.\n\
             3. Prefer official government (.gov) sources and established GIS portals.\n\
             4. Score confidence from the reliability of the source and the URL structure.\n\
             {RESPONSE_FORMAT}"
        ),
        user: format!(
            "Find the ArcGIS feature server URL for zoning districts in {county} County, {state}. \
             Focus on official government sources and GIS portals."
        ),
    }
}

#[must_use]
pub fn anthropic(state: &str, county: &str) -> SearchPrompt {
    SearchPrompt {
        system: format!(
            "You are an assistant that finds ArcGIS REST endpoints for zoning districts.\n\
             1. Look for feature server URLs that serve zoning district polygons.\n\
             2. Reject any URL that does not contain FeatureServer or MapServer.\n\
             3. Rank official county, city and state sources above third parties.\n\
             4. Lower confidence when the URL or its publisher cannot be verified.\n\
             {RESPONSE_FORMAT}"
        ),
        user: format!(
            "I need the ArcGIS feature server URL for zoning districts in {county} County, {state}. \
             Please focus on official sources."
        ),
    }
}

#[must_use]
pub fn gemini(state: &str, county: &str) -> SearchPrompt {
    SearchPrompt {
        system: format!(
            "You are a GIS data specialist who locates zoning district feature servers.\n\
             1. Identify ArcGIS feature server URLs for the county's zoning districts.\n\
             2. Verify the path contains featureserver or mapserver.\n\
             3. Prioritize official county and state portals.\n\
             4. Base confidence on source reliability and URL format.\n\
             {RESPONSE_FORMAT}"
        ),
        user: format!(
            "Locate the ArcGIS feature server URL that provides zoning district data for \
             {county} County, {state}. Prioritize official government sources."
        ),
    }
}

/// Keyword query for search-engine style providers.
#[must_use]
pub fn tavily_query(state: &str, county: &str) -> String {
    format!("{county} County {state} zoning districts ArcGIS FeatureServer OR MapServer")
}
