//! Interfaces to the windowing and rendering host.
//!
//! The coordinator never talks to a concrete webview toolkit. It drives a
//! [`ShellHost`]: windows, render surfaces (in-window or offscreen) and
//! browser chrome (toolbar, dialogs, the OS browser). [`SimulatedHost`] is
//! the in-memory implementation used by tests and the `replay` command.

mod event;
mod sim;

pub use event::EventResponse;
pub use event::HostEvent;
pub use event::KeyChord;
pub use event::NavAction;
pub use sim::HostCall;
pub use sim::SimulatedHost;

use cs_config::WindowDimensions;
use cs_core::BlockKind;
use cs_core::ShellResult;
use cs_core::WindowRole;
use std::collections::BTreeMap;
use std::fmt;

macro_rules! host_id {
    ($name:ident, $label:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

host_id!(WindowId, "window");
host_id!(SurfaceId, "surface");
host_id!(ToolbarId, "toolbar");
host_id!(DialogTicket, "dialog");

/// Decoded RGBA8 image handed to the host.
#[derive(Clone, PartialEq, Eq)]
pub struct IconImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl fmt::Debug for IconImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IconImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

/// Toolbar button icons; a missing entry makes the host fall back to a text
/// label.
pub type ToolbarIcons = BTreeMap<NavAction, IconImage>;

/// Parameters for a new top-level window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    pub role: WindowRole,
    pub title: String,
    pub size: WindowDimensions,
    pub icon: Option<IconImage>,
}

/// Where a render surface is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceAttachment {
    Window(WindowId),
    /// Never displayed; used by redirect probes.
    Offscreen,
}

/// Back/forward availability of one surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryState {
    pub can_go_back: bool,
    pub can_go_forward: bool,
}

/// Enabled state of the toolbar buttons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigationState {
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub can_refresh: bool,
    pub can_go_home: bool,
}

impl NavigationState {
    pub fn from_history(history: HistoryState) -> Self {
        Self {
            can_go_back: history.can_go_back,
            can_go_forward: history.can_go_forward,
            can_refresh: true,
            can_go_home: true,
        }
    }
}

/// Contents of the modal "navigation blocked" dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockNotice {
    pub domain: String,
    pub reason: String,
    pub kind: BlockKind,
}

impl BlockNotice {
    pub fn title(&self) -> &'static str {
        match self.kind {
            BlockKind::Default => "Navigation blocked",
            BlockKind::Redirect => "Redirect blocked",
        }
    }
}

/// Contents of the system information dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInfo {
    pub product: String,
    pub version: String,
    pub platform: String,
    pub arch: String,
    pub user_agent: String,
}

/// Top-level window management.
pub trait WindowHost {
    fn create_window(&mut self, spec: &WindowSpec) -> ShellResult<WindowId>;
    fn show_window(&mut self, window: WindowId) -> ShellResult<()>;
    fn hide_window(&mut self, window: WindowId) -> ShellResult<()>;
    fn close_window(&mut self, window: WindowId) -> ShellResult<()>;
    fn focus_window(&mut self, window: WindowId) -> ShellResult<()>;
    fn window_size(&self, window: WindowId) -> Option<WindowDimensions>;
    fn is_window_alive(&self, window: WindowId) -> bool;
}

/// Web content surfaces.
pub trait RenderHost {
    fn create_surface(&mut self, attachment: SurfaceAttachment) -> ShellResult<SurfaceId>;
    fn destroy_surface(&mut self, surface: SurfaceId) -> ShellResult<()>;
    fn is_surface_alive(&self, surface: SurfaceId) -> bool;
    fn load_url(&mut self, surface: SurfaceId, url: &str) -> ShellResult<()>;
    /// URL the surface has committed, if any.
    fn current_url(&self, surface: SurfaceId) -> Option<String>;
    fn history(&self, surface: SurfaceId) -> Option<HistoryState>;
    fn go_back(&mut self, surface: SurfaceId) -> ShellResult<()>;
    fn go_forward(&mut self, surface: SurfaceId) -> ShellResult<()>;
    fn reload(&mut self, surface: SurfaceId) -> ShellResult<()>;
    fn default_user_agent(&self) -> String;
    fn set_user_agent(&mut self, surface: SurfaceId, user_agent: &str) -> ShellResult<()>;

    /// Events the host queued since the last call.
    ///
    /// Hosts that deliver events through their own loop leave this empty.
    fn drain_events(&mut self) -> Vec<HostEvent> {
        Vec::new()
    }
}

/// Browser chrome around the content.
pub trait ChromeHost {
    fn create_toolbar(&mut self, window: WindowId, icons: &ToolbarIcons) -> ShellResult<ToolbarId>;
    fn update_navigation_state(
        &mut self,
        toolbar: ToolbarId,
        state: NavigationState,
    ) -> ShellResult<()>;
    fn show_blocked_dialog(
        &mut self,
        window: WindowId,
        notice: &BlockNotice,
    ) -> ShellResult<DialogTicket>;
    fn show_info_dialog(&mut self, window: WindowId, info: &SystemInfo) -> ShellResult<()>;
    fn open_external(&mut self, url: &str) -> ShellResult<()>;
}

/// Everything the coordinator needs from the host.
pub trait ShellHost: WindowHost + RenderHost + ChromeHost {}

impl<T> ShellHost for T where T: WindowHost + RenderHost + ChromeHost {}
