//! Vertex AI generateContent client and types
//!
//! Speaks the publisher-model REST endpoint with bearer-token auth.

pub mod builder;
pub mod client;
pub mod types;

pub use builder::MessageBuilder;
pub use client::VertexClient;
pub use types::*;

// Re-export model constants
pub use crate::models::gemini::*;
