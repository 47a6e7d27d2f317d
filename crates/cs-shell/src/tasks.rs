//! Deferred follow-up actions.
//!
//! Event callbacks only decide; anything that creates, loads or closes runs
//! from this queue on a later turn of the loop.

use cs_host::WindowId;
use std::collections::BTreeMap;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellTask {
    /// Return a window to its home after a blocked redirect.
    LoadFallback { window: WindowId, url: String },
    LoadUrl { window: WindowId, url: String },
    OpenAuxiliary { url: String, opener: WindowId },
    OpenExternal { url: String },
    CloseWindow { window: WindowId },
    /// Show a window that never reported its first paint.
    ForceShow { window: WindowId },
    RefreshToolbar,
}

impl ShellTask {
    pub fn label(&self) -> &'static str {
        match self {
            Self::LoadFallback { .. } => "load-fallback",
            Self::LoadUrl { .. } => "load-url",
            Self::OpenAuxiliary { .. } => "open-auxiliary",
            Self::OpenExternal { .. } => "open-external",
            Self::CloseWindow { .. } => "close-window",
            Self::ForceShow { .. } => "force-show",
            Self::RefreshToolbar => "refresh-toolbar",
        }
    }

    /// Window whose lifetime bounds this task.
    pub fn window(&self) -> Option<WindowId> {
        match self {
            Self::LoadFallback { window, .. }
            | Self::LoadUrl { window, .. }
            | Self::CloseWindow { window }
            | Self::ForceShow { window } => Some(*window),
            Self::OpenAuxiliary { opener, .. } => Some(*opener),
            Self::OpenExternal { .. } | Self::RefreshToolbar => None,
        }
    }
}

/// Tasks ordered by due time, then by insertion.
#[derive(Debug, Default)]
pub struct TaskQueue {
    seq: u64,
    entries: BTreeMap<(Instant, u64), ShellTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, due: Instant, task: ShellTask) {
        self.seq += 1;
        self.entries.insert((due, self.seq), task);
    }

    /// Removes and returns the earliest task due at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<ShellTask> {
        let key = *self.entries.keys().next()?;
        if key.0 > now {
            return None;
        }
        self.entries.remove(&key)
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(due, _)| *due)
    }

    /// Drops every task bound to `window`.
    pub fn drop_for_window(&mut self, window: WindowId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, task| task.window() != Some(window));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (Instant, &ShellTask)> {
        self.entries.iter().map(|((due, _), task)| (*due, task))
    }
}
