use crate::DialogTicket;
use crate::SurfaceId;
use crate::WindowId;
use cs_core::ShellError;
use cs_core::ShellResult;

/// Toolbar and shortcut navigation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NavAction {
    Back,
    Forward,
    Refresh,
    Home,
}

impl NavAction {
    pub const ALL: [Self; 4] = [Self::Back, Self::Forward, Self::Refresh, Self::Home];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Back => "back",
            Self::Forward => "forward",
            Self::Refresh => "refresh",
            Self::Home => "home",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value {
            "back" => Some(Self::Back),
            "forward" => Some(Self::Forward),
            "refresh" => Some(Self::Refresh),
            "home" => Some(Self::Home),
            _ => None,
        }
    }
}

/// A key press with its modifiers.
///
/// `key` holds the key name as the host reports it (`Left`, `F5`, `R`);
/// comparisons are ASCII case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyChord {
    pub key: String,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl KeyChord {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_owned(),
            ..Self::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    /// Parses accelerator notation such as `Alt+Left` or `Cmd+Shift+H`.
    pub fn parse(text: &str) -> ShellResult<Self> {
        let mut chord = Self::default();
        let mut key = None;
        for part in text.split('+').map(str::trim) {
            match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => chord.ctrl = true,
                "alt" | "option" => chord.alt = true,
                "shift" => chord.shift = true,
                "cmd" | "command" | "meta" | "super" => chord.meta = true,
                "" => {
                    return Err(ShellError::new(
                        "host.key_chord_invalid",
                        format!("empty segment in key chord `{text}`"),
                    ));
                }
                _ if key.is_some() => {
                    return Err(ShellError::new(
                        "host.key_chord_invalid",
                        format!("key chord `{text}` names more than one key"),
                    ));
                }
                _ => key = Some(part.to_owned()),
            }
        }

        let Some(key) = key else {
            return Err(ShellError::new(
                "host.key_chord_invalid",
                format!("key chord `{text}` has no key"),
            ));
        };
        chord.key = key;
        Ok(chord)
    }

    pub fn matches(&self, other: &Self) -> bool {
        self.key.eq_ignore_ascii_case(&other.key)
            && self.ctrl == other.ctrl
            && self.alt == other.alt
            && self.shift == other.shift
            && self.meta == other.meta
    }

    /// True if `pressed` is this key with at least this chord's modifiers
    /// held; extra modifiers are ignored.
    pub fn is_held_in(&self, pressed: &Self) -> bool {
        self.key.eq_ignore_ascii_case(&pressed.key)
            && (!self.ctrl || pressed.ctrl)
            && (!self.alt || pressed.alt)
            && (!self.shift || pressed.shift)
            && (!self.meta || pressed.meta)
    }
}

/// Events raised by the windowing/rendering host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    WillNavigate {
        surface: SurfaceId,
        target_url: String,
        current_url: Option<String>,
    },
    WillRedirect {
        surface: SurfaceId,
        target_url: String,
        current_url: Option<String>,
    },
    WindowOpenRequest {
        surface: SurfaceId,
        target_url: String,
        current_url: Option<String>,
    },
    DidNavigate {
        surface: SurfaceId,
        url: String,
    },
    DidFinishLoad {
        surface: SurfaceId,
    },
    DidFailLoad {
        surface: SurfaceId,
        error: String,
    },
    FirstPaint {
        window: WindowId,
    },
    WindowFocused {
        window: WindowId,
    },
    WindowClosed {
        window: WindowId,
    },
    DialogDismissed {
        window: WindowId,
        ticket: DialogTicket,
    },
    ToolbarAction {
        window: WindowId,
        action: NavAction,
    },
    KeyInput {
        window: WindowId,
        chord: KeyChord,
    },
    /// Right click inside a page.
    ContextMenu {
        surface: SurfaceId,
    },
}

impl HostEvent {
    pub fn label(&self) -> &'static str {
        match self {
            Self::WillNavigate { .. } => "will-navigate",
            Self::WillRedirect { .. } => "will-redirect",
            Self::WindowOpenRequest { .. } => "window-open",
            Self::DidNavigate { .. } => "did-navigate",
            Self::DidFinishLoad { .. } => "did-finish-load",
            Self::DidFailLoad { .. } => "did-fail-load",
            Self::FirstPaint { .. } => "first-paint",
            Self::WindowFocused { .. } => "window-focused",
            Self::WindowClosed { .. } => "window-closed",
            Self::DialogDismissed { .. } => "dialog-dismissed",
            Self::ToolbarAction { .. } => "toolbar-action",
            Self::KeyInput { .. } => "key-input",
            Self::ContextMenu { .. } => "context-menu",
        }
    }

    /// Surface the event belongs to, for surface-scoped events.
    pub fn surface(&self) -> Option<SurfaceId> {
        match self {
            Self::WillNavigate { surface, .. }
            | Self::WillRedirect { surface, .. }
            | Self::WindowOpenRequest { surface, .. }
            | Self::DidNavigate { surface, .. }
            | Self::DidFinishLoad { surface }
            | Self::DidFailLoad { surface, .. }
            | Self::ContextMenu { surface } => Some(*surface),
            _ => None,
        }
    }
}

/// Answer to a cancellable host event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResponse {
    Proceed,
    Cancel,
}

impl EventResponse {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Proceed => "proceed",
            Self::Cancel => "cancel",
        }
    }
}
