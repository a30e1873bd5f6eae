//! Model constants for Vertex AI
//!
//! Official model IDs as published in the Vertex AI model garden.

/// Gemini model constants
pub mod gemini {
    /// Gemini 2.0 Flash - fast general-purpose model, the service default
    pub const GEMINI_2_0_FLASH: &str = "gemini-2.0-flash";
}

pub use gemini::*;
