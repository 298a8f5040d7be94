//! Tavily web search adapter.
//!
//! Unlike the LLM adapters, Tavily returns ranked web hits. Only hits pointing at an
//! ArcGIS FeatureServer or MapServer are kept, the relevance score becomes the
//! confidence, and Tavily's summary answer is attached to every result as notes.

pub mod client;
pub mod types;

pub use client::TavilyAdapter;
