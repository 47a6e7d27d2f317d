//! Suppression of repeated block dialogs.
//!
//! A burst of redirects or script-driven navigations to the same blocked
//! domain would otherwise stack identical modal dialogs. Only the most recent
//! shown dialog is remembered; a different key or kind always shows.

use cs_core::BlockKind;
use std::time::Duration;
use std::time::Instant;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
struct DebounceEntry {
    key: String,
    kind: BlockKind,
    at: Instant,
}

/// Time-windowed gate in front of the block dialog.
#[derive(Debug, Clone)]
pub struct DialogDebouncer {
    window: Duration,
    last: Option<DebounceEntry>,
}

impl DialogDebouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns true if a dialog for `key` should be shown now, and records it.
    pub fn should_show(&mut self, key: &str, kind: BlockKind) -> bool {
        self.should_show_at(key, kind, Instant::now())
    }

    /// Same as [`Self::should_show`] with an explicit clock reading.
    ///
    /// A suppressed call does not refresh the timestamp, so a steady stream
    /// of duplicates still shows one dialog per window.
    pub fn should_show_at(&mut self, key: &str, kind: BlockKind, now: Instant) -> bool {
        if let Some(last) = &self.last {
            let elapsed = now.saturating_duration_since(last.at);
            if last.key == key && last.kind == kind && elapsed < self.window {
                trace!(key, kind = kind.as_str(), ?elapsed, "block dialog suppressed");
                return false;
            }
        }

        self.last = Some(DebounceEntry {
            key: key.to_owned(),
            kind,
            at: now,
        });
        true
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
