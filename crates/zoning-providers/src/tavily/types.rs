use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct TavilySearchRequest {
    pub api_key: String,
    pub query: String,
    pub search_depth: String,
    pub include_answer: bool,
    pub max_results: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TavilySearchResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub results: Option<Vec<TavilyHit>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TavilyHit {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: f64,
}
