//! Anthropic messages adapter.

pub mod client;
pub mod types;

pub use client::AnthropicAdapter;
