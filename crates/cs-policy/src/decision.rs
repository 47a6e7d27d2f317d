use cs_core::BlockKind;
use cs_core::WindowRole;
use cs_domain::RejectReason;

/// Navigation lifecycle event being decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// Page-initiated navigation of the same surface (link click, form, script).
    WillNavigate,
    /// Server or client redirect while a navigation is in flight.
    WillRedirect,
    /// `window.open` or a `target=_blank` link.
    WindowOpen,
    /// First load of a freshly created window.
    InitialLoad,
}

impl NavigationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WillNavigate => "will-navigate",
            Self::WillRedirect => "will-redirect",
            Self::WindowOpen => "window-open",
            Self::InitialLoad => "initial-load",
        }
    }

    pub(crate) fn block_kind(self) -> BlockKind {
        match self {
            Self::WillRedirect => BlockKind::Redirect,
            Self::WillNavigate | Self::WindowOpen | Self::InitialLoad => BlockKind::Default,
        }
    }
}

/// Snapshot of the window a navigation happens in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowContext<'a> {
    pub role: WindowRole,
    pub current_url: Option<&'a str>,
    pub initial_url: &'a str,
    pub last_good_url: Option<&'a str>,
    /// A blocked redirect already sent this window back to its home.
    pub recovering: bool,
    pub first_load_committed: bool,
}

impl<'a> WindowContext<'a> {
    /// Context of a window that has not loaded anything yet.
    pub fn fresh(role: WindowRole, initial_url: &'a str) -> Self {
        Self {
            role,
            current_url: None,
            initial_url,
            last_good_url: None,
            recovering: false,
            first_load_committed: false,
        }
    }
}

/// One decision request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationRequest<'a> {
    pub kind: NavigationKind,
    pub target_url: &'a str,
    pub window: WindowContext<'a>,
}

/// Details shown to the user when a navigation is blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedNavigation {
    pub domain: String,
    pub reason: RejectReason,
    pub kind: BlockKind,
}

/// Outcome of a policy decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    AllowInNewWindow {
        url: String,
    },
    /// Hand the URL to the OS browser; the in-app popup is denied.
    OpenExternal {
        url: String,
    },
    /// Same-window hop to a whitelisted foreign domain; the landing URL must
    /// be discovered before deciding.
    EscalateToProbe {
        url: String,
    },
    BlockSilent,
    BlockWithDialog(BlockedNavigation),
    RedirectToSafeHome {
        target_url: String,
        notice: BlockedNavigation,
    },
}

impl PolicyDecision {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::AllowInNewWindow { .. } => "allow-in-new-window",
            Self::OpenExternal { .. } => "open-external",
            Self::EscalateToProbe { .. } => "escalate-to-probe",
            Self::BlockSilent => "block-silent",
            Self::BlockWithDialog(_) => "block-with-dialog",
            Self::RedirectToSafeHome { .. } => "redirect-to-safe-home",
        }
    }

    /// True if the navigation proceeds in the window that raised it.
    pub fn proceeds_in_place(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn notice(&self) -> Option<&BlockedNavigation> {
        match self {
            Self::BlockWithDialog(notice) | Self::RedirectToSafeHome { notice, .. } => {
                Some(notice)
            }
            _ => None,
        }
    }
}
