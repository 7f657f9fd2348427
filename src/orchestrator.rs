//! Translation of comment blocks against the configured model.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::cache::TranslationCache;
use crate::comment::{aggregate, CommentBlock, CommentRange};
use crate::config::Config;
use crate::decorations::DecorationSet;
use crate::error::{Result, TranslateError};
use crate::model::{ModelHandle, ModelLifecycle, ModelState};
use crate::prompt::system_prompt;

/// A translated comment block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Translation {
    pub range: CommentRange,
    pub source: String,
    pub text: String,
    /// Served from the cache without a backend call
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", content = "message", rename_all = "lowercase")]
pub enum SkipReason {
    /// The model was not ready when the block was reached
    Unavailable(String),
    /// The backend call for this block failed
    Failed(String),
    /// The call was still running when the orchestrator was aborted
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skipped {
    pub range: CommentRange,
    pub reason: SkipReason,
}

/// Result of one pass over a document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub pass: u64,
    /// Resolved blocks, in document order
    pub translations: Vec<Translation>,
    pub skipped: Vec<Skipped>,
    /// Whether the outcome replaced the applied decorations
    pub applied: bool,
}

impl BatchOutcome {
    pub fn new(pass: u64) -> Self {
        Self {
            pass,
            translations: Vec::new(),
            skipped: Vec::new(),
            applied: false,
        }
    }
}

/// Owns everything one configuration needs: backend handle, model lifecycle,
/// cache and applied decorations.
///
/// Configuration changes are handled by `reload`, which tears this instance
/// down and returns a fresh one for the host to keep instead.
pub struct Orchestrator {
    config: Config,
    backend: Arc<dyn Backend>,
    lifecycle: Arc<ModelLifecycle>,
    cache: TranslationCache,
    decorations: DecorationSet,
    system_prompt: String,
    last_pass: AtomicU64,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Build an orchestrator whose model is still `Loading`. Nothing talks to
    /// the backend until the lifecycle check runs (see `start`).
    pub fn new(config: Config, backend: Arc<dyn Backend>) -> Self {
        let lifecycle = Arc::new(ModelLifecycle::new(Arc::clone(&backend), config.model.clone()));
        let system_prompt = system_prompt(&config.language);

        Self {
            config,
            backend,
            lifecycle,
            cache: TranslationCache::new(),
            decorations: DecorationSet::new(),
            system_prompt,
            last_pass: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        }
    }

    /// Build an orchestrator and start the model check in the background.
    /// Must be called from within a tokio runtime.
    pub fn start(config: Config, backend: Arc<dyn Backend>) -> Self {
        let orchestrator = Self::new(config, backend);
        orchestrator.lifecycle.spawn_check();
        orchestrator
    }

    /// Abort this instance and start a replacement with an empty cache and a
    /// new model lifecycle
    pub fn reload(&self, config: Config, backend: Arc<dyn Backend>) -> Self {
        info!("Reloading translator (language: {}, model: {})", config.language, config.model);
        self.abort();
        Self::start(config, backend)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn lifecycle(&self) -> &Arc<ModelLifecycle> {
        &self.lifecycle
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn decorations(&self) -> &DecorationSet {
        &self.decorations
    }

    pub fn state(&self) -> ModelState {
        self.lifecycle.state()
    }

    pub fn status_message(&self) -> String {
        self.lifecycle.status_message()
    }

    /// Translate every comment block of `document`
    pub async fn translate_document(&self, document: &str) -> BatchOutcome {
        self.translate_blocks(aggregate(document)).await
    }

    /// Translate `blocks` as one pass.
    ///
    /// Cache hits resolve immediately. Misses are sent to the model together
    /// and awaited as a group; blocks that cannot be translated are listed in
    /// `skipped` and never fail the pass.
    pub async fn translate_blocks(&self, blocks: Vec<CommentBlock>) -> BatchOutcome {
        let pass = self.last_pass.fetch_add(1, Ordering::SeqCst) + 1;
        let mut outcome = BatchOutcome::new(pass);

        if !self.config.enabled {
            debug!("Pass {}: translation disabled", pass);
            return outcome;
        }

        let mut pending = Vec::new();
        for block in blocks {
            if let Some(text) = self.cache.get(&block.text) {
                outcome.translations.push(Translation {
                    range: block.range,
                    source: block.text,
                    text,
                    cached: true,
                });
                continue;
            }

            match self.lifecycle.ensure_ready() {
                Ok(handle) => pending.push(async move {
                    let result = self.dispatch(&handle, &block.text).await;
                    (block, result)
                }),
                Err(e) => {
                    warn!("Skipping comment at line {}: {}", block.range.start_line + 1, e);
                    outcome.skipped.push(Skipped {
                        range: block.range,
                        reason: SkipReason::Unavailable(e.to_string()),
                    });
                }
            }
        }

        let dispatched = pending.len();
        for (block, result) in join_all(pending).await {
            match result {
                Ok(text) => outcome.translations.push(Translation {
                    range: block.range,
                    source: block.text,
                    text,
                    cached: false,
                }),
                Err(TranslateError::Aborted) => outcome.skipped.push(Skipped {
                    range: block.range,
                    reason: SkipReason::Aborted,
                }),
                Err(e) => {
                    warn!("Failed to translate comment at line {}: {}", block.range.start_line + 1, e);
                    outcome.skipped.push(Skipped {
                        range: block.range,
                        reason: SkipReason::Failed(e.to_string()),
                    });
                }
            }
        }

        outcome.translations.sort_by_key(|t| (t.range.start_line, t.range.start_column));
        outcome.skipped.sort_by_key(|s| (s.range.start_line, s.range.start_column));

        info!(
            "Pass {}: {} translated ({} from cache, {} requested), {} skipped",
            pass,
            outcome.translations.len(),
            outcome.translations.iter().filter(|t| t.cached).count(),
            dispatched,
            outcome.skipped.len()
        );

        outcome
    }

    /// Translate `document` and apply the result as the current decorations,
    /// unless a newer pass has already been applied
    pub async fn update_decorations(&self, document: &str) -> BatchOutcome {
        let mut outcome = self.translate_document(document).await;
        outcome.applied = self.decorations.apply(&outcome);
        outcome
    }

    /// `update_decorations`, abandoned when `interrupt` resolves first. The
    /// orchestrator is aborted in that case and the pass fails with `Aborted`.
    pub async fn update_decorations_until<F>(&self, document: &str, interrupt: F) -> Result<BatchOutcome>
    where
        F: Future,
    {
        tokio::select! {
            outcome = self.update_decorations(document) => Ok(outcome),
            _ = interrupt => {
                warn!("Interrupted, aborting translation");
                self.abort();
                Err(TranslateError::Aborted)
            }
        }
    }

    /// Translate an explicit selection. Unlike a document pass, an unready
    /// model or a backend failure is returned to the caller.
    pub async fn translate_range(&self, text: &str, range: CommentRange) -> Result<Translation> {
        if let Some(cached) = self.cache.get(text) {
            return Ok(Translation {
                range,
                source: text.to_string(),
                text: cached,
                cached: true,
            });
        }

        let handle = self.lifecycle.ensure_ready()?;
        let translated = self.dispatch(&handle, text).await?;

        Ok(Translation {
            range,
            source: text.to_string(),
            text: translated,
            cached: false,
        })
    }

    /// Cancel the model check or pull and every translation in flight. The
    /// orchestrator is finished afterwards; later requests resolve as aborted.
    pub fn abort(&self) {
        debug!("Aborting translator for model '{}'", self.config.model);
        self.cancel.cancel();
        self.lifecycle.abort();
        self.backend.abort_all();
    }

    async fn dispatch(&self, handle: &ModelHandle, text: &str) -> Result<String> {
        let translated = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TranslateError::Aborted),
            result = handle.chat(&self.system_prompt, text) => result,
        }?;

        if self.cancel.is_cancelled() {
            return Err(TranslateError::Aborted);
        }

        self.cache.put(text, &translated);
        Ok(translated)
    }
}
