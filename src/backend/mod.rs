// Model backend abstraction
//
// The translator only needs three remote operations (list, pull, chat) plus a
// way to cancel whatever is in flight. `OllamaBackend` speaks the Ollama HTTP
// API; tests substitute their own implementations.

pub mod ollama;

use std::sync::Arc;

use async_trait::async_trait;

pub use ollama::{OllamaBackend, DEFAULT_ADDRESS};
use crate::config::Config;
use crate::error::Result;

/// Operations the translator consumes from a model server
#[async_trait]
pub trait Backend: Send + Sync {
    /// Identifiers of the models available locally on the server
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Fetch `model` from the registry, returning once the pull has finished
    async fn pull_model(&self, model: &str) -> Result<()>;

    /// Run a single chat exchange: one system message, then one user message
    async fn chat(&self, model: &str, system_prompt: &str, text: &str) -> Result<String>;

    /// Cancel every request issued through this handle that is still running
    fn abort_all(&self);
}

/// Factory for creating backend instances
pub struct BackendFactory;

impl BackendFactory {
    /// Create the Ollama backend described by the configuration
    pub fn create_backend(config: &Config) -> Result<Arc<dyn Backend>> {
        Ok(Arc::new(OllamaBackend::new(config.address.as_deref())?))
    }
}
