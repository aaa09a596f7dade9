//! Backend module for model generation
//!
//! This module provides the core abstraction for generation backends
//! and the local (Ollama) and remote (OpenAI-compatible) implementations.

mod ollama;
mod openai;
mod registry;
mod traits;

#[cfg(test)]
mod mock;

pub use ollama::OllamaBackend;
pub use openai::{OpenAiBackend, OpenAiConfig};
pub use registry::ModelRegistry;
pub use traits::*;

#[cfg(test)]
pub use mock::{MockBackend, MockBehavior};
