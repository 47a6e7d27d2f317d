use cs_core::WindowRole;
use cs_host::DialogTicket;
use cs_host::SurfaceId;
use cs_policy::PolicyDecision;
use cs_policy::WindowContext;

/// Progress of the return-to-home load after a blocked redirect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FallbackState {
    #[default]
    Idle,
    /// Queued but not started; further blocked redirects are duplicates.
    Scheduled,
    /// Loading; a blocked redirect now means the home page itself bounced.
    Loading,
}

impl FallbackState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scheduled => "scheduled",
            Self::Loading => "loading",
        }
    }
}

/// Per-window bookkeeping owned by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowState {
    pub role: WindowRole,
    pub surface: SurfaceId,
    pub current_url: Option<String>,
    pub initial_url: String,
    pub last_navigation_outcome: Option<PolicyDecision>,
    pub last_good_url: Option<String>,
    pub fallback: FallbackState,
    pub recovering: bool,
    pub first_load_committed: bool,
    pub shown: bool,
    /// Dialog whose dismissal closes this window.
    pub pending_close: Option<DialogTicket>,
}

impl WindowState {
    pub fn new(role: WindowRole, surface: SurfaceId, initial_url: String) -> Self {
        Self {
            role,
            surface,
            current_url: None,
            initial_url,
            last_navigation_outcome: None,
            last_good_url: None,
            fallback: FallbackState::Idle,
            recovering: false,
            first_load_committed: false,
            shown: false,
            pending_close: None,
        }
    }

    /// Policy view of this window. The host's idea of the current URL wins
    /// over the last commit when the event carries one.
    pub fn context<'a>(&'a self, reported_url: Option<&'a str>) -> WindowContext<'a> {
        WindowContext {
            role: self.role,
            current_url: reported_url.or(self.current_url.as_deref()),
            initial_url: &self.initial_url,
            last_good_url: self.last_good_url.as_deref(),
            recovering: self.recovering,
            first_load_committed: self.first_load_committed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FallbackState;
    use super::WindowState;
    use cs_core::WindowRole;
    use cs_host::SurfaceId;

    #[test]
    fn reported_url_overrides_last_commit() {
        let mut state = WindowState::new(
            WindowRole::Auxiliary,
            SurfaceId(2),
            "https://rank.ac/".to_owned(),
        );
        state.current_url = Some("https://rank.ac/board".to_owned());

        let context = state.context(None);
        assert_eq!(context.current_url, Some("https://rank.ac/board"));
        assert_eq!(context.initial_url, "https://rank.ac/");

        let context = state.context(Some("https://rank.ac/live"));
        assert_eq!(context.current_url, Some("https://rank.ac/live"));
    }

    #[test]
    fn new_windows_start_idle_and_hidden() {
        let state = WindowState::new(WindowRole::Primary, SurfaceId(1), "https://op.sdutacm.cn/".to_owned());
        assert_eq!(state.fallback, FallbackState::Idle);
        assert_eq!(state.fallback.as_str(), "idle");
        assert!(!state.shown);
        assert!(!state.first_load_committed);
    }
}
