//! Google Gemini `generateContent` adapter.

pub mod client;
pub mod types;

pub use client::GeminiAdapter;
