//! In-memory host used by tests and the `replay` command.
//!
//! Loads complete synchronously: redirect routes are followed without
//! raising `WillRedirect`, and the resulting `DidNavigate`/`DidFinishLoad`
//! (or `DidFailLoad`) events are queued for [`RenderHost::drain_events`].

use crate::BlockNotice;
use crate::ChromeHost;
use crate::DialogTicket;
use crate::HistoryState;
use crate::HostEvent;
use crate::NavigationState;
use crate::RenderHost;
use crate::SurfaceAttachment;
use crate::SurfaceId;
use crate::SystemInfo;
use crate::ToolbarIcons;
use crate::ToolbarId;
use crate::WindowHost;
use crate::WindowId;
use crate::WindowSpec;
use cs_config::WindowDimensions;
use cs_core::ShellError;
use cs_core::ShellResult;
use cs_core::WindowRole;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;
use tracing::trace;

const MAX_REDIRECT_HOPS: usize = 16;
const SIMULATED_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) SimulatedWebView/1.0";

/// One call the coordinator made into the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    CreateWindow {
        window: WindowId,
        role: WindowRole,
        size: WindowDimensions,
    },
    ShowWindow(WindowId),
    HideWindow(WindowId),
    CloseWindow(WindowId),
    FocusWindow(WindowId),
    CreateSurface {
        surface: SurfaceId,
        attachment: SurfaceAttachment,
    },
    DestroySurface(SurfaceId),
    LoadUrl {
        surface: SurfaceId,
        url: String,
    },
    GoBack(SurfaceId),
    GoForward(SurfaceId),
    Reload(SurfaceId),
    SetUserAgent {
        surface: SurfaceId,
        user_agent: String,
    },
    CreateToolbar(WindowId),
    UpdateNavigationState {
        toolbar: ToolbarId,
        state: NavigationState,
    },
    ShowBlockedDialog {
        window: WindowId,
        notice: BlockNotice,
    },
    ShowInfoDialog {
        window: WindowId,
        info: SystemInfo,
    },
    OpenExternal(String),
}

#[derive(Debug)]
struct SimWindow {
    spec: WindowSpec,
    visible: bool,
    painted: bool,
}

#[derive(Debug)]
struct SimSurface {
    attachment: SurfaceAttachment,
    entries: Vec<String>,
    index: usize,
}

impl SimSurface {
    fn current(&self) -> Option<&str> {
        self.entries.get(self.index).map(String::as_str)
    }
}

/// Scriptable in-memory [`crate::ShellHost`].
#[derive(Debug, Default)]
pub struct SimulatedHost {
    next_id: u64,
    windows: BTreeMap<WindowId, SimWindow>,
    surfaces: BTreeMap<SurfaceId, SimSurface>,
    routes: BTreeMap<String, String>,
    failing: BTreeSet<String>,
    fail_toolbar: bool,
    fail_dialogs: bool,
    auto_dismiss_dialogs: bool,
    events: VecDeque<HostEvent>,
    calls: Vec<HostCall>,
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes a load of `from` end up at `to`.
    pub fn add_redirect(&mut self, from: &str, to: &str) {
        self.routes.insert(from.to_owned(), to.to_owned());
    }

    /// Makes loads that resolve to `url` fail.
    pub fn fail_url(&mut self, url: &str) {
        self.failing.insert(url.to_owned());
    }

    pub fn set_fail_toolbar(&mut self, fail: bool) {
        self.fail_toolbar = fail;
    }

    pub fn set_fail_dialogs(&mut self, fail: bool) {
        self.fail_dialogs = fail;
    }

    /// Queues `DialogDismissed` as soon as a dialog is shown.
    pub fn set_auto_dismiss_dialogs(&mut self, auto: bool) {
        self.auto_dismiss_dialogs = auto;
    }

    /// Queues an event as if the page raised it.
    pub fn push_event(&mut self, event: HostEvent) {
        self.events.push_back(event);
    }

    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<HostCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.windows.keys().copied().collect()
    }

    pub fn is_window_visible(&self, window: WindowId) -> bool {
        self.windows.get(&window).is_some_and(|window| window.visible)
    }

    pub fn window_role(&self, window: WindowId) -> Option<WindowRole> {
        self.windows.get(&window).map(|window| window.spec.role)
    }

    /// Surfaces displayed in `window`.
    pub fn surfaces_of(&self, window: WindowId) -> Vec<SurfaceId> {
        self.surfaces
            .iter()
            .filter(|(_, surface)| surface.attachment == SurfaceAttachment::Window(window))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn offscreen_surface_count(&self) -> usize {
        self.surfaces
            .values()
            .filter(|surface| surface.attachment == SurfaceAttachment::Offscreen)
            .count()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn surface_mut(&mut self, surface: SurfaceId) -> ShellResult<&mut SimSurface> {
        self.surfaces
            .get_mut(&surface)
            .ok_or_else(|| surface_missing(surface))
    }

    fn window_exists(&self, window: WindowId) -> ShellResult<()> {
        if self.windows.contains_key(&window) {
            Ok(())
        } else {
            Err(ShellError::new(
                "host.window_missing",
                format!("{window} does not exist"),
            ))
        }
    }

    fn resolve(&self, url: &str) -> String {
        let mut current = url.to_owned();
        for _ in 0..MAX_REDIRECT_HOPS {
            match self.routes.get(&current) {
                Some(next) => current.clone_from(next),
                None => break,
            }
        }
        current
    }

    /// Queues the events of a completed navigation of `surface` to `url`.
    fn queue_commit(&mut self, surface: SurfaceId, url: String) {
        self.events.push_back(HostEvent::DidNavigate { surface, url });
        self.events.push_back(HostEvent::DidFinishLoad { surface });

        let attached = self
            .surfaces
            .get(&surface)
            .and_then(|surface| match surface.attachment {
                SurfaceAttachment::Window(window) => Some(window),
                SurfaceAttachment::Offscreen => None,
            });
        let Some(window) = attached else {
            return;
        };
        if let Some(state) = self.windows.get_mut(&window) {
            if !state.painted {
                state.painted = true;
                self.events.push_back(HostEvent::FirstPaint { window });
            }
        }
    }
}

impl WindowHost for SimulatedHost {
    fn create_window(&mut self, spec: &WindowSpec) -> ShellResult<WindowId> {
        let window = WindowId(self.next_id());
        self.windows.insert(
            window,
            SimWindow {
                spec: spec.clone(),
                visible: false,
                painted: false,
            },
        );
        self.calls.push(HostCall::CreateWindow {
            window,
            role: spec.role,
            size: spec.size,
        });
        Ok(window)
    }

    fn show_window(&mut self, window: WindowId) -> ShellResult<()> {
        self.window_exists(window)?;
        if let Some(state) = self.windows.get_mut(&window) {
            state.visible = true;
        }
        self.calls.push(HostCall::ShowWindow(window));
        Ok(())
    }

    fn hide_window(&mut self, window: WindowId) -> ShellResult<()> {
        self.window_exists(window)?;
        if let Some(state) = self.windows.get_mut(&window) {
            state.visible = false;
        }
        self.calls.push(HostCall::HideWindow(window));
        Ok(())
    }

    fn close_window(&mut self, window: WindowId) -> ShellResult<()> {
        self.window_exists(window)?;
        self.windows.remove(&window);
        self.surfaces
            .retain(|_, surface| surface.attachment != SurfaceAttachment::Window(window));
        self.calls.push(HostCall::CloseWindow(window));
        self.events.push_back(HostEvent::WindowClosed { window });
        Ok(())
    }

    fn focus_window(&mut self, window: WindowId) -> ShellResult<()> {
        self.window_exists(window)?;
        self.calls.push(HostCall::FocusWindow(window));
        self.events.push_back(HostEvent::WindowFocused { window });
        Ok(())
    }

    fn window_size(&self, window: WindowId) -> Option<WindowDimensions> {
        self.windows.get(&window).map(|window| window.spec.size)
    }

    fn is_window_alive(&self, window: WindowId) -> bool {
        self.windows.contains_key(&window)
    }
}

impl RenderHost for SimulatedHost {
    fn create_surface(&mut self, attachment: SurfaceAttachment) -> ShellResult<SurfaceId> {
        if let SurfaceAttachment::Window(window) = attachment {
            self.window_exists(window)?;
        }

        let surface = SurfaceId(self.next_id());
        self.surfaces.insert(
            surface,
            SimSurface {
                attachment,
                entries: Vec::new(),
                index: 0,
            },
        );
        self.calls.push(HostCall::CreateSurface {
            surface,
            attachment,
        });
        Ok(surface)
    }

    fn destroy_surface(&mut self, surface: SurfaceId) -> ShellResult<()> {
        if self.surfaces.remove(&surface).is_none() {
            return Err(surface_missing(surface));
        }
        self.calls.push(HostCall::DestroySurface(surface));
        Ok(())
    }

    fn is_surface_alive(&self, surface: SurfaceId) -> bool {
        self.surfaces.contains_key(&surface)
    }

    fn load_url(&mut self, surface: SurfaceId, url: &str) -> ShellResult<()> {
        self.surface_mut(surface)?;
        self.calls.push(HostCall::LoadUrl {
            surface,
            url: url.to_owned(),
        });

        let resolved = self.resolve(url);
        if self.failing.contains(&resolved) {
            trace!(%surface, url = %resolved, "simulated load failure");
            self.events.push_back(HostEvent::DidFailLoad {
                surface,
                error: format!("ERR_CONNECTION_REFUSED ({resolved})"),
            });
            return Ok(());
        }

        let state = self.surface_mut(surface)?;
        if !state.entries.is_empty() {
            state.entries.truncate(state.index + 1);
        }
        state.entries.push(resolved.clone());
        state.index = state.entries.len() - 1;
        self.queue_commit(surface, resolved);
        Ok(())
    }

    fn current_url(&self, surface: SurfaceId) -> Option<String> {
        self.surfaces
            .get(&surface)
            .and_then(SimSurface::current)
            .map(str::to_owned)
    }

    fn history(&self, surface: SurfaceId) -> Option<HistoryState> {
        self.surfaces.get(&surface).map(|state| HistoryState {
            can_go_back: state.index > 0,
            can_go_forward: state.index + 1 < state.entries.len(),
        })
    }

    fn go_back(&mut self, surface: SurfaceId) -> ShellResult<()> {
        self.calls.push(HostCall::GoBack(surface));
        let state = self.surface_mut(surface)?;
        if state.index == 0 {
            return Ok(());
        }
        state.index -= 1;
        let url = state.current().map(str::to_owned);
        if let Some(url) = url {
            self.queue_commit(surface, url);
        }
        Ok(())
    }

    fn go_forward(&mut self, surface: SurfaceId) -> ShellResult<()> {
        self.calls.push(HostCall::GoForward(surface));
        let state = self.surface_mut(surface)?;
        if state.index + 1 >= state.entries.len() {
            return Ok(());
        }
        state.index += 1;
        let url = state.current().map(str::to_owned);
        if let Some(url) = url {
            self.queue_commit(surface, url);
        }
        Ok(())
    }

    fn reload(&mut self, surface: SurfaceId) -> ShellResult<()> {
        self.calls.push(HostCall::Reload(surface));
        let url = self.surface_mut(surface)?.current().map(str::to_owned);
        if let Some(url) = url {
            self.queue_commit(surface, url);
        }
        Ok(())
    }

    fn default_user_agent(&self) -> String {
        SIMULATED_USER_AGENT.to_owned()
    }

    fn set_user_agent(&mut self, surface: SurfaceId, user_agent: &str) -> ShellResult<()> {
        self.surface_mut(surface)?;
        self.calls.push(HostCall::SetUserAgent {
            surface,
            user_agent: user_agent.to_owned(),
        });
        Ok(())
    }

    fn drain_events(&mut self) -> Vec<HostEvent> {
        self.events.drain(..).collect()
    }
}

impl ChromeHost for SimulatedHost {
    fn create_toolbar(&mut self, window: WindowId, _icons: &ToolbarIcons) -> ShellResult<ToolbarId> {
        self.window_exists(window)?;
        if self.fail_toolbar {
            return Err(ShellError::new(
                "host.toolbar_failed",
                format!("toolbar could not be attached to {window}"),
            ));
        }
        self.calls.push(HostCall::CreateToolbar(window));
        Ok(ToolbarId(self.next_id()))
    }

    fn update_navigation_state(
        &mut self,
        toolbar: ToolbarId,
        state: NavigationState,
    ) -> ShellResult<()> {
        self.calls
            .push(HostCall::UpdateNavigationState { toolbar, state });
        Ok(())
    }

    fn show_blocked_dialog(
        &mut self,
        window: WindowId,
        notice: &BlockNotice,
    ) -> ShellResult<DialogTicket> {
        self.window_exists(window)?;
        if self.fail_dialogs {
            return Err(ShellError::new(
                "host.dialog_failed",
                format!("dialog could not be shown on {window}"),
            ));
        }
        self.calls.push(HostCall::ShowBlockedDialog {
            window,
            notice: notice.clone(),
        });
        let ticket = DialogTicket(self.next_id());
        if self.auto_dismiss_dialogs {
            self.events
                .push_back(HostEvent::DialogDismissed { window, ticket });
        }
        Ok(ticket)
    }

    fn show_info_dialog(&mut self, window: WindowId, info: &SystemInfo) -> ShellResult<()> {
        self.window_exists(window)?;
        if self.fail_dialogs {
            return Err(ShellError::new(
                "host.dialog_failed",
                format!("info dialog could not be shown on {window}"),
            ));
        }
        self.calls.push(HostCall::ShowInfoDialog {
            window,
            info: info.clone(),
        });
        Ok(())
    }

    fn open_external(&mut self, url: &str) -> ShellResult<()> {
        self.calls.push(HostCall::OpenExternal(url.to_owned()));
        Ok(())
    }
}

fn surface_missing(surface: SurfaceId) -> ShellError {
    ShellError::new(
        "host.surface_missing",
        format!("{surface} has been destroyed"),
    )
}

#[cfg(test)]
mod tests {
    use super::HostCall;
    use super::SimulatedHost;
    use crate::ChromeHost;
    use crate::HostEvent;
    use crate::RenderHost;
    use crate::SurfaceAttachment;
    use crate::ToolbarIcons;
    use crate::WindowHost;
    use crate::WindowId;
    use crate::WindowSpec;
    use cs_config::WindowDimensions;
    use cs_core::WindowRole;
    use pretty_assertions::assert_eq;

    fn open(host: &mut SimulatedHost) -> WindowId {
        let spec = WindowSpec {
            role: WindowRole::Primary,
            title: "test".to_owned(),
            size: WindowDimensions {
                width: 1000,
                height: 800,
            },
            icon: None,
        };
        host.create_window(&spec).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn load_follows_redirect_routes_and_paints_once() {
        let mut host = SimulatedHost::new();
        host.add_redirect("https://rank.ac/go", "https://rank.ac/board");
        let window = open(&mut host);
        let surface = host
            .create_surface(SurfaceAttachment::Window(window))
            .unwrap_or_else(|_| unreachable!());

        assert!(host.load_url(surface, "https://rank.ac/go").is_ok());
        assert!(host.load_url(surface, "https://rank.ac/other").is_ok());
        assert_eq!(
            host.drain_events(),
            vec![
                HostEvent::DidNavigate {
                    surface,
                    url: "https://rank.ac/board".to_owned()
                },
                HostEvent::DidFinishLoad { surface },
                HostEvent::FirstPaint { window },
                HostEvent::DidNavigate {
                    surface,
                    url: "https://rank.ac/other".to_owned()
                },
                HostEvent::DidFinishLoad { surface },
            ]
        );
        assert_eq!(
            host.current_url(surface).as_deref(),
            Some("https://rank.ac/other")
        );
    }

    #[test]
    fn redirect_cycles_terminate() {
        let mut host = SimulatedHost::new();
        host.add_redirect("https://a.test/", "https://b.test/");
        host.add_redirect("https://b.test/", "https://a.test/");
        let surface = host
            .create_surface(SurfaceAttachment::Offscreen)
            .unwrap_or_else(|_| unreachable!());
        assert!(host.load_url(surface, "https://a.test/").is_ok());
        assert!(host.current_url(surface).is_some());
    }

    #[test]
    fn history_navigation_moves_through_entries() {
        let mut host = SimulatedHost::new();
        let window = open(&mut host);
        let surface = host
            .create_surface(SurfaceAttachment::Window(window))
            .unwrap_or_else(|_| unreachable!());
        assert!(host.load_url(surface, "https://op.sdutacm.cn/").is_ok());
        assert!(host.load_url(surface, "https://op.sdutacm.cn/a").is_ok());

        assert!(host.go_back(surface).is_ok());
        let history = host.history(surface).unwrap_or_else(|| unreachable!());
        assert!(!history.can_go_back);
        assert!(history.can_go_forward);

        assert!(host.go_forward(surface).is_ok());
        assert_eq!(
            host.current_url(surface).as_deref(),
            Some("https://op.sdutacm.cn/a")
        );
    }

    #[test]
    fn failing_url_reports_failure_without_commit() {
        let mut host = SimulatedHost::new();
        host.fail_url("https://down.test/");
        let surface = host
            .create_surface(SurfaceAttachment::Offscreen)
            .unwrap_or_else(|_| unreachable!());
        assert!(host.load_url(surface, "https://down.test/").is_ok());
        let events = host.drain_events();
        assert!(matches!(events.as_slice(), [HostEvent::DidFailLoad { .. }]));
        assert_eq!(host.current_url(surface), None);
    }

    #[test]
    fn closing_window_destroys_its_surfaces() {
        let mut host = SimulatedHost::new();
        let window = open(&mut host);
        let surface = host
            .create_surface(SurfaceAttachment::Window(window))
            .unwrap_or_else(|_| unreachable!());
        assert!(host.close_window(window).is_ok());
        assert!(!host.is_surface_alive(surface));
        assert_eq!(
            host.load_url(surface, "https://op.sdutacm.cn/")
                .err()
                .map(|error| error.code),
            Some("host.surface_missing")
        );
        assert_eq!(host.drain_events(), vec![HostEvent::WindowClosed { window }]);
    }

    #[test]
    fn injected_faults_surface_as_errors() {
        let mut host = SimulatedHost::new();
        let window = open(&mut host);
        host.set_fail_toolbar(true);
        host.set_fail_dialogs(true);
        assert!(host.create_toolbar(window, &ToolbarIcons::new()).is_err());
        let notice = crate::BlockNotice {
            domain: "evil.com".to_owned(),
            reason: "explicitly blocked".to_owned(),
            kind: cs_core::BlockKind::Default,
        };
        assert_eq!(
            host.show_blocked_dialog(window, &notice)
                .err()
                .map(|error| error.code),
            Some("host.dialog_failed")
        );
        assert!(!host
            .calls()
            .iter()
            .any(|call| matches!(call, HostCall::ShowBlockedDialog { .. })));
    }
}
