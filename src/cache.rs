use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use tracing::debug;

/// In-memory translation cache keyed by the exact source text.
///
/// Entries live as long as the owning orchestrator and are never evicted.
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct TranslationCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
    hits: Arc<AtomicUsize>,
    misses: Arc<AtomicUsize>,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a previous translation of `text`
    pub fn get(&self, text: &str) -> Option<String> {
        match self.entries.read().get(text) {
            Some(translation) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Translation cache hit for '{}'", preview(text));
                Some(translation.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a translation. A second write for the same text replaces the first.
    pub fn put(&self, text: &str, translation: &str) {
        self.entries
            .write()
            .insert(text.to_string(), translation.to_string());
        debug!("Cached translation for '{}'", preview(text));
    }

    pub fn contains(&self, text: &str) -> bool {
        self.entries.read().contains_key(text)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Hit count, miss count and hit rate since creation
    pub fn stats(&self) -> (usize, usize, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        (hits, misses, hit_rate)
    }
}

fn preview(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() > 30 {
        format!("{}...", first_line.chars().take(30).collect::<String>())
    } else {
        first_line.to_string()
    }
}
