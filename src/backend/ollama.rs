use std::future::Future;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Backend;
use crate::error::{Result, TranslateError};

/// Address of a local Ollama server
pub const DEFAULT_ADDRESS: &str = "http://127.0.0.1:11434";

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

/// One line of the newline-delimited pull progress stream
#[derive(Debug, Deserialize)]
struct PullProgress {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    completed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// Ollama HTTP client.
///
/// All requests share one cancellation token. `abort_all` cancels it and
/// installs a fresh one, so requests issued afterwards run normally.
pub struct OllamaBackend {
    client: Client,
    endpoint: String,
    abort: Mutex<CancellationToken>,
}

impl OllamaBackend {
    pub fn new(address: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("ollama-translate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: normalize_endpoint(address.unwrap_or(DEFAULT_ADDRESS)),
            abort: Mutex::new(CancellationToken::new()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn cancellable<T, F>(&self, request: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let token = self.abort.lock().clone();
        tokio::select! {
            _ = token.cancelled() => Err(TranslateError::Aborted),
            result = request => result,
        }
    }

    async fn check_status(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        Err(TranslateError::Backend(format!(
            "Ollama API error {}: {}", status, error_text.trim()
        )))
    }

    async fn list_models_request(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.endpoint);
        debug!("Listing models at: {}", url);

        let response = self.client.get(&url).send().await
            .map_err(|e| TranslateError::Backend(format!("Failed to connect to Ollama: {}", e)))?;
        let tags: TagsResponse = Self::check_status(response).await?.json().await
            .map_err(|e| TranslateError::Backend(format!("Failed to parse model list: {}", e)))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn pull_model_request(&self, model: &str) -> Result<()> {
        let url = format!("{}/api/pull", self.endpoint);
        info!("Pulling model '{}' from {}", model, url);

        let response = self.client
            .post(&url)
            .json(&PullRequest { model, stream: true })
            .send()
            .await
            .map_err(|e| TranslateError::Backend(format!("Pull request failed: {}", e)))?;
        let mut response = Self::check_status(response).await?;

        let mut pending = Vec::new();
        while let Some(chunk) = response.chunk().await
            .map_err(|e| TranslateError::Backend(format!("Pull stream interrupted: {}", e)))?
        {
            pending.extend_from_slice(&chunk);
            while let Some(newline) = pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = pending.drain(..=newline).collect();
                report_pull_progress(model, &line)?;
            }
        }
        report_pull_progress(model, &pending)?;

        info!("Finished pulling model '{}'", model);
        Ok(())
    }

    async fn chat_request(&self, model: &str, system_prompt: &str, text: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.endpoint);
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage { role: "system".to_string(), content: system_prompt.to_string() },
                ChatMessage { role: "user".to_string(), content: text.to_string() },
            ],
            stream: false,
        };

        debug!("Sending chat request to: {}", url);

        let response = self.client.post(&url).json(&request).send().await
            .map_err(|e| TranslateError::Backend(format!("HTTP request failed: {}", e)))?;
        let chat: ChatResponse = Self::check_status(response).await?.json().await
            .map_err(|e| TranslateError::Backend(format!("Failed to parse response: {}", e)))?;

        Ok(chat.message.content)
    }
}

#[async_trait]
impl Backend for OllamaBackend {
    async fn list_models(&self) -> Result<Vec<String>> {
        self.cancellable(self.list_models_request()).await
    }

    async fn pull_model(&self, model: &str) -> Result<()> {
        self.cancellable(self.pull_model_request(model)).await
    }

    async fn chat(&self, model: &str, system_prompt: &str, text: &str) -> Result<String> {
        self.cancellable(self.chat_request(model, system_prompt, text)).await
    }

    fn abort_all(&self) {
        let previous = std::mem::replace(&mut *self.abort.lock(), CancellationToken::new());
        previous.cancel();
    }
}

fn report_pull_progress(model: &str, line: &[u8]) -> Result<()> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }

    let progress: PullProgress = serde_json::from_str(line)?;
    if let Some(error) = progress.error {
        return Err(TranslateError::Backend(format!("Failed to pull model '{}': {}", model, error)));
    }

    match (progress.completed, progress.total) {
        (Some(completed), Some(total)) if total > 0 => debug!(
            "Pull {}: {} ({:.1}%)",
            model,
            progress.status.as_deref().unwrap_or("downloading"),
            completed as f64 / total as f64 * 100.0
        ),
        _ => debug!("Pull {}: {}", model, progress.status.as_deref().unwrap_or("")),
    }

    Ok(())
}

/// Accept `host:port` as well as full URLs, the way the Ollama clients do
fn normalize_endpoint(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}
