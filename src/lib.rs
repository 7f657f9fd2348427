//! ollama-translate - Source Comment Translation
//!
//! Finds the comment blocks of a source file and translates them with a
//! locally hosted Ollama model, pulling the model first when it is missing.

pub mod cli;
pub mod config;
pub mod error;
pub mod comment;
pub mod cache;
pub mod prompt;
pub mod backend;
pub mod model;
pub mod decorations;
pub mod orchestrator;
pub mod render;

pub use comment::{aggregate, match_line, CommentBlock, CommentMatch, CommentRange};
pub use error::{Result, TranslateError};
pub use model::{ModelHandle, ModelLifecycle, ModelState};
pub use orchestrator::{BatchOutcome, Orchestrator, SkipReason, Skipped, Translation};
