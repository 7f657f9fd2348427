//! Availability of the configured model on the backend.
//!
//! A `ModelLifecycle` starts in `Loading`, asks the backend for its model list
//! and either becomes `Ready`, pulls the model first, or records the failure.
//! `Ready` and `Failed` are final: recovering means building a new lifecycle
//! (which the orchestrator does on reload). Callers never block on readiness
//! through `ensure_ready`; they poll it, or subscribe to state changes.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::error::{Result, TranslateError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ModelState {
    Loading,
    Pulling,
    Ready,
    Failed { error: String },
}

impl ModelState {
    /// `Ready` and `Failed` never change for the lifetime of a controller
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed { .. })
    }

    /// Human-readable description of this state for `model`
    pub fn status_message(&self, model: &str) -> String {
        match self {
            Self::Loading => format!("Checking whether model '{}' is available...", model),
            Self::Pulling => format!("Model '{}' not found locally, pulling it from the registry...", model),
            Self::Ready => format!("Model '{}' is ready", model),
            Self::Failed { error } => format!("Model '{}' is unavailable: {}", model, error),
        }
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Pulling => write!(f, "pulling"),
            Self::Ready => write!(f, "ready"),
            Self::Failed { .. } => write!(f, "failed"),
        }
    }
}

/// A model confirmed to be present on the backend
#[derive(Clone)]
pub struct ModelHandle {
    backend: Arc<dyn Backend>,
    model: String,
}

impl ModelHandle {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn chat(&self, system_prompt: &str, text: &str) -> Result<String> {
        self.backend.chat(&self.model, system_prompt, text).await
    }
}

pub struct ModelLifecycle {
    backend: Arc<dyn Backend>,
    model: String,
    state: watch::Sender<ModelState>,
    checking: AtomicBool,
    cancel: CancellationToken,
}

impl ModelLifecycle {
    pub fn new(backend: Arc<dyn Backend>, model: impl Into<String>) -> Self {
        let (state, _) = watch::channel(ModelState::Loading);
        Self {
            backend,
            model: model.into(),
            state,
            checking: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn state(&self) -> ModelState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state transition
    pub fn subscribe(&self) -> watch::Receiver<ModelState> {
        self.state.subscribe()
    }

    pub fn status_message(&self) -> String {
        self.state.borrow().status_message(&self.model)
    }

    /// Run `check` on the runtime in the background
    pub fn spawn_check(self: &Arc<Self>) -> JoinHandle<()> {
        let lifecycle = Arc::clone(self);
        tokio::spawn(async move { lifecycle.check().await })
    }

    /// Drive the controller out of `Loading`. Only the first call does any work.
    pub async fn check(&self) {
        if self.checking.swap(true, Ordering::SeqCst) || *self.state.borrow() != ModelState::Loading {
            debug!("Model check for '{}' already started", self.model);
            return;
        }

        info!("Checking for model '{}'", self.model);
        let listed = tokio::select! {
            _ = self.cancel.cancelled() => Err(TranslateError::Aborted),
            result = self.backend.list_models() => result,
        };

        match listed {
            Ok(models) if models.iter().any(|name| name == &self.model) => {
                self.settle(ModelState::Ready);
            }
            Ok(_) => {
                info!("Model '{}' not found locally", self.model);
                self.pull().await;
            }
            Err(e) => self.settle(ModelState::Failed { error: e.to_string() }),
        }
    }

    /// Pull the model from the registry. Only honoured from `Loading`; while a
    /// pull is running, further requests return immediately.
    pub async fn pull(&self) {
        let started = self.state.send_if_modified(|state| {
            if *state == ModelState::Loading {
                *state = ModelState::Pulling;
                true
            } else {
                false
            }
        });
        if !started {
            debug!("Ignoring pull request for '{}' while {}", self.model, *self.state.borrow());
            return;
        }

        info!("{}", self.status_message());
        let pulled = tokio::select! {
            _ = self.cancel.cancelled() => Err(TranslateError::Aborted),
            result = self.backend.pull_model(&self.model) => result,
        };

        match pulled {
            Ok(()) => self.settle(ModelState::Ready),
            Err(e) => self.settle(ModelState::Failed { error: e.to_string() }),
        }
    }

    /// Hand out the model if it is ready, without waiting
    pub fn ensure_ready(&self) -> Result<ModelHandle> {
        match &*self.state.borrow() {
            ModelState::Ready => Ok(ModelHandle {
                backend: Arc::clone(&self.backend),
                model: self.model.clone(),
            }),
            state => Err(TranslateError::ModelUnavailable(state.status_message(&self.model))),
        }
    }

    /// Wait until the controller reaches `Ready` or `Failed`
    pub async fn wait_settled(&self) -> ModelState {
        let mut receiver = self.state.subscribe();
        match receiver.wait_for(ModelState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Cancel an in-flight check or pull. Safe in any state.
    pub fn abort(&self) {
        self.cancel.cancel();
        self.settle(ModelState::Failed { error: TranslateError::Aborted.to_string() });
    }

    fn settle(&self, next: ModelState) {
        let model = &self.model;
        self.state.send_if_modified(|state| {
            if state.is_settled() {
                return false;
            }
            match &next {
                ModelState::Failed { error } => warn!("Model '{}' failed: {}", model, error),
                _ => info!("Model '{}' is now {}", model, next),
            }
            *state = next.clone();
            true
        });
    }
}
