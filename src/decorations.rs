use parking_lot::Mutex;
use tracing::debug;

use crate::orchestrator::{BatchOutcome, Translation};

#[derive(Debug, Default)]
struct Applied {
    pass: u64,
    translations: Vec<Translation>,
}

/// The annotations currently shown for a document.
///
/// A batch replaces the whole set at once, and only when it comes from a pass
/// newer than the one already applied. A slow pass that finishes after a later
/// one is dropped.
#[derive(Debug, Default)]
pub struct DecorationSet {
    applied: Mutex<Applied>,
}

impl DecorationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the applied set with `outcome`. Returns false for stale passes.
    pub fn apply(&self, outcome: &BatchOutcome) -> bool {
        let mut applied = self.applied.lock();
        if outcome.pass <= applied.pass {
            debug!(
                "Discarding pass {} (pass {} already applied)",
                outcome.pass, applied.pass
            );
            return false;
        }

        applied.pass = outcome.pass;
        applied.translations = outcome.translations.clone();
        true
    }

    /// Pass number of the applied set, 0 before anything was applied
    pub fn pass(&self) -> u64 {
        self.applied.lock().pass
    }

    pub fn current(&self) -> Vec<Translation> {
        self.applied.lock().translations.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.lock().translations.is_empty()
    }
}
