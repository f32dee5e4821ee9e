//! External service clients.
//!
//! This module provides:
//! - The [`TextGenerator`] contract with OpenAI and Ollama implementations
//! - Ollama model management (availability check, list, pull)
//! - Shared HTTP response handling and NDJSON streaming

pub(crate) mod http;
mod llm;
pub mod ndjson;
pub mod ollama;
mod openai;

#[cfg(test)]
pub use llm::MockTextGenerator;
pub use llm::{LlmResponse, TextGenerator};
pub use ollama::{OllamaClient, OllamaModel, SmokeTest};
pub use openai::OpenAiChat;
