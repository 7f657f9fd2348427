//! Shared test helpers: a scriptable in-process backend.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use ollama_translate::backend::Backend;
use ollama_translate::config::Config;
use ollama_translate::error::{Result, TranslateError};

pub const MODEL: &str = "mistral-small:latest";

pub fn config(language: &str) -> Config {
    Config {
        language: language.to_string(),
        model: MODEL.to_string(),
        ..Config::default()
    }
}

/// Backend whose answers are set up per test. Chat replies default to the
/// input wrapped in brackets.
#[derive(Default)]
pub struct StubBackend {
    models: Vec<String>,
    list_error: Option<String>,
    pull_error: Option<String>,
    pull_gate: Option<Arc<Notify>>,
    replies: HashMap<String, String>,
    failing: HashSet<String>,
    hanging: HashMap<String, Arc<Notify>>,
    list_calls: AtomicUsize,
    pull_calls: AtomicUsize,
    chat_calls: AtomicUsize,
    aborts: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StubBackend {
    pub fn with_models(models: &[&str]) -> Self {
        Self {
            models: models.iter().map(|m| m.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn list_error(message: &str) -> Self {
        Self {
            list_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn pull_error(mut self, message: &str) -> Self {
        self.pull_error = Some(message.to_string());
        self
    }

    /// Pulls wait until `gate` is notified
    pub fn hold_pull(mut self, gate: Arc<Notify>) -> Self {
        self.pull_gate = Some(gate);
        self
    }

    pub fn reply(mut self, text: &str, translation: &str) -> Self {
        self.replies.insert(text.to_string(), translation.to_string());
        self
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }

    /// Chat requests for `text` wait until `release` is notified
    pub fn hanging_on(mut self, text: &str, release: Arc<Notify>) -> Self {
        self.hanging.insert(text.to_string(), release);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn pull_calls(&self) -> usize {
        self.pull_calls.load(Ordering::SeqCst)
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl Backend for StubBackend {
    async fn list_models(&self) -> Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        match &self.list_error {
            Some(message) => Err(TranslateError::Backend(message.clone())),
            None => Ok(self.models.clone()),
        }
    }

    async fn pull_model(&self, model: &str) -> Result<()> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.pull_gate {
            gate.notified().await;
        }
        match &self.pull_error {
            Some(message) => Err(TranslateError::Backend(format!("{}: {}", model, message))),
            None => Ok(()),
        }
    }

    async fn chat(&self, _model: &str, system_prompt: &str, text: &str) -> Result<String> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(system_prompt.to_string());

        if let Some(release) = self.hanging.get(text) {
            release.notified().await;
        }
        if self.failing.contains(text) {
            return Err(TranslateError::Backend(format!("model crashed on '{}'", text)));
        }

        Ok(self
            .replies
            .get(text)
            .cloned()
            .unwrap_or_else(|| format!("[{}]", text)))
    }

    fn abort_all(&self) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
    }
}
