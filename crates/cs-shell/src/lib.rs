//! Window and view lifecycle coordinator.
//!
//! Wires the policy engine, redirect probes and dialog debouncer to a
//! [`cs_host::ShellHost`]. Host callbacks are answered synchronously with a
//! decision; every side effect that could re-enter the host (new windows,
//! fallback loads, closes, external opens) goes through a deferred task
//! queue driven by [`Coordinator::run_due_tasks`] or [`run_event_loop`].

mod coordinator;
mod runtime;
mod shortcuts;
mod state;
mod tasks;

pub use coordinator::Coordinator;
pub use runtime::HostMessage;
pub use runtime::run_event_loop;
pub use shortcuts::Platform;
pub use shortcuts::ShortcutMap;
pub use shortcuts::is_devtools_chord;
pub use state::FallbackState;
pub use state::WindowState;
pub use tasks::ShellTask;

use cs_host::IconImage;
use cs_host::ToolbarIcons;

/// Decoded images handed to the host when windows and toolbars are created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellAssets {
    pub window_icon: Option<IconImage>,
    pub toolbar_icons: ToolbarIcons,
}
