use crate::ShellAssets;
use crate::shortcuts::Platform;
use crate::shortcuts::ShortcutMap;
use crate::shortcuts::is_devtools_chord;
use crate::state::FallbackState;
use crate::state::WindowState;
use crate::tasks::ShellTask;
use crate::tasks::TaskQueue;
use cs_config::PolicyConfig;
use cs_config::ShellSettings;
use cs_config::WindowDimensions;
use cs_core::ShellError;
use cs_core::ShellResult;
use cs_core::WindowRole;
use cs_debounce::DialogDebouncer;
use cs_host::BlockNotice;
use cs_host::DialogTicket;
use cs_host::EventResponse;
use cs_host::HostEvent;
use cs_host::KeyChord;
use cs_host::NavAction;
use cs_host::NavigationState;
use cs_host::ShellHost;
use cs_host::SurfaceAttachment;
use cs_host::SurfaceId;
use cs_host::SystemInfo;
use cs_host::ToolbarId;
use cs_host::WindowId;
use cs_host::WindowSpec;
use cs_policy::BlockedNavigation;
use cs_policy::NavigationKind;
use cs_policy::NavigationRequest;
use cs_policy::PolicyDecision;
use cs_policy::PolicyEngine;
use cs_probe::ProbeOutcome;
use cs_probe::ProbeTracker;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

const WINDOW_TITLE: &str = "Contest Shell";
const MAX_PUMP_ROUNDS: usize = 64;

/// Owns every window, surface and pending follow-up of the shell.
///
/// All state lives behind `&mut self`; the host delivers one event at a
/// time and the coordinator answers synchronously.
#[derive(Debug)]
pub struct Coordinator<H> {
    host: H,
    settings: ShellSettings,
    engine: PolicyEngine,
    probes: ProbeTracker,
    debouncer: DialogDebouncer,
    windows: BTreeMap<WindowId, WindowState>,
    surfaces: BTreeMap<SurfaceId, WindowId>,
    primary: Option<WindowId>,
    focused: Option<WindowId>,
    toolbar: Option<ToolbarId>,
    tasks: TaskQueue,
    shortcuts: ShortcutMap,
    assets: ShellAssets,
    user_agent: String,
    shut_down: bool,
}

impl<H> Coordinator<H>
where
    H: ShellHost,
{
    pub fn new(
        host: H,
        config: Arc<PolicyConfig>,
        settings: ShellSettings,
        assets: ShellAssets,
        platform: Platform,
    ) -> ShellResult<Self> {
        settings.validate()?;
        let engine = PolicyEngine::new(config)?;
        let user_agent = format!(
            "{} {}/{}",
            host.default_user_agent(),
            settings.user_agent_product,
            env!("CARGO_PKG_VERSION")
        );

        Ok(Self {
            probes: ProbeTracker::new(settings.probe_timeout()),
            debouncer: DialogDebouncer::new(settings.dialog_debounce()),
            host,
            settings,
            engine,
            windows: BTreeMap::new(),
            surfaces: BTreeMap::new(),
            primary: None,
            focused: None,
            toolbar: None,
            tasks: TaskQueue::new(),
            shortcuts: ShortcutMap::for_platform(platform),
            assets,
            user_agent,
            shut_down: false,
        })
    }

    /// Opens the primary window on the configured home page.
    pub fn start(&mut self, now: Instant) -> ShellResult<WindowId> {
        if self.shut_down {
            return Err(ShellError::new(
                "shell.shut_down",
                "coordinator has already shut down",
            ));
        }
        let home = self.engine.config().home_url.clone();
        self.open_window(WindowRole::Primary, &home, None, now)
    }

    /// Creates a hidden window with its surface and applies the
    /// initial-load policy to `url`.
    pub fn open_window(
        &mut self,
        role: WindowRole,
        url: &str,
        opener: Option<WindowId>,
        now: Instant,
    ) -> ShellResult<WindowId> {
        if role.is_primary() && self.primary.is_some() {
            return Err(ShellError::new(
                "shell.primary_exists",
                "a primary window is already open",
            ));
        }

        let spec = WindowSpec {
            role,
            title: WINDOW_TITLE.to_owned(),
            size: self.window_size_for(role, opener),
            icon: self.assets.window_icon.clone(),
        };
        let window = self.host.create_window(&spec)?;
        let surface = match self.host.create_surface(SurfaceAttachment::Window(window)) {
            Ok(surface) => surface,
            Err(error) => {
                if let Err(close_error) = self.host.close_window(window) {
                    warn!(%window, error = %close_error, "failed to close half-created window");
                }
                return Err(error);
            }
        };
        if let Err(error) = self.host.set_user_agent(surface, &self.user_agent) {
            warn!(%surface, %error, "failed to set user agent");
        }

        self.windows
            .insert(window, WindowState::new(role, surface, url.to_owned()));
        self.surfaces.insert(surface, window);
        if role.is_primary() {
            self.primary = Some(window);
            self.attach_toolbar(window);
        }
        self.tasks.push(
            now + self.settings.show_timeout(),
            ShellTask::ForceShow { window },
        );
        info!(%window, %surface, role = role.as_str(), url, "window opened");

        let target = self.initial_target(window, url, now);
        self.load_in(window, &target);
        Ok(window)
    }

    /// Routes one host event and answers cancellable ones.
    pub fn handle_event(&mut self, event: HostEvent, now: Instant) -> EventResponse {
        if self.shut_down {
            debug!(event = event.label(), "event after shutdown ignored");
            return EventResponse::Cancel;
        }

        match event {
            HostEvent::WillNavigate {
                surface,
                target_url,
                current_url,
            } => self.on_navigation(
                NavigationKind::WillNavigate,
                surface,
                &target_url,
                current_url.as_deref(),
                now,
            ),
            HostEvent::WillRedirect {
                surface,
                target_url,
                current_url,
            } => self.on_navigation(
                NavigationKind::WillRedirect,
                surface,
                &target_url,
                current_url.as_deref(),
                now,
            ),
            HostEvent::WindowOpenRequest {
                surface,
                target_url,
                current_url,
            } => self.on_window_open(surface, &target_url, current_url.as_deref(), now),
            HostEvent::DidNavigate { surface, url } => {
                self.on_commit(surface, url);
                EventResponse::Proceed
            }
            HostEvent::DidFinishLoad { surface } => {
                if self.probes.owns(surface) {
                    let outcome = self.probes.on_finish_load(&mut self.host, surface);
                    self.on_probe_outcome(outcome, now);
                } else if self.is_primary_surface(surface) {
                    self.sync_toolbar();
                }
                EventResponse::Proceed
            }
            HostEvent::DidFailLoad { surface, error } => {
                if self.probes.owns(surface) {
                    let outcome = self.probes.on_fail_load(&mut self.host, surface, &error);
                    self.on_probe_outcome(outcome, now);
                } else {
                    self.on_load_failed(surface, &error);
                }
                EventResponse::Proceed
            }
            HostEvent::FirstPaint { window } => {
                self.show(window);
                EventResponse::Proceed
            }
            HostEvent::WindowFocused { window } => {
                if self.windows.contains_key(&window) {
                    self.focused = Some(window);
                }
                EventResponse::Proceed
            }
            HostEvent::WindowClosed { window } => {
                self.teardown(window);
                EventResponse::Proceed
            }
            HostEvent::DialogDismissed { window, ticket } => {
                self.on_dialog_dismissed(window, ticket, now);
                EventResponse::Proceed
            }
            HostEvent::ToolbarAction { window, action } => {
                self.perform(window, action, now);
                EventResponse::Proceed
            }
            HostEvent::KeyInput { window, chord } => self.on_key_input(window, &chord, now),
            HostEvent::ContextMenu { surface } => {
                debug!(%surface, "context menu suppressed");
                EventResponse::Cancel
            }
        }
    }

    /// Runs every deferred task and probe deadline due at `now`.
    pub fn run_due_tasks(&mut self, now: Instant) -> usize {
        let mut ran = 0;
        for outcome in self.probes.expire(&mut self.host, now) {
            self.on_probe_outcome(Some(outcome), now);
        }

        while let Some(task) = self.tasks.pop_due(now) {
            if self.shut_down {
                break;
            }
            debug!(task = task.label(), "running deferred task");
            self.execute(task, now);
            ran += 1;
        }
        ran
    }

    /// Feeds queued host events back through [`Self::handle_event`].
    pub fn pump_host_events(&mut self, now: Instant) -> Vec<(HostEvent, EventResponse)> {
        let mut handled = Vec::new();
        for _ in 0..MAX_PUMP_ROUNDS {
            let events = self.host.drain_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                let response = self.handle_event(event.clone(), now);
                handled.push((event, response));
            }
        }
        handled
    }

    /// Earliest instant at which [`Self::run_due_tasks`] has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.tasks.next_due(), self.probes.next_deadline()) {
            (Some(task), Some(probe)) => Some(task.min(probe)),
            (task, probe) => task.or(probe),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    pub fn settings(&self) -> &ShellSettings {
        &self.settings
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn primary(&self) -> Option<WindowId> {
        self.primary
    }

    pub fn focused(&self) -> Option<WindowId> {
        self.focused
    }

    pub fn has_toolbar(&self) -> bool {
        self.toolbar.is_some()
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.windows.keys().copied().collect()
    }

    pub fn window_state(&self, window: WindowId) -> Option<&WindowState> {
        self.windows.get(&window)
    }

    pub fn surface_of(&self, window: WindowId) -> Option<SurfaceId> {
        self.windows.get(&window).map(|state| state.surface)
    }

    pub fn pending_tasks(&self) -> impl Iterator<Item = (Instant, &ShellTask)> {
        self.tasks.iter()
    }

    pub fn active_probes(&self) -> usize {
        self.probes.len()
    }

    fn window_size_for(&self, role: WindowRole, opener: Option<WindowId>) -> WindowDimensions {
        if let Some(size) = opener.and_then(|opener| self.host.window_size(opener)) {
            return size;
        }
        match role {
            WindowRole::Primary => self.settings.primary_window,
            WindowRole::Auxiliary => self.settings.auxiliary_window,
        }
    }

    fn attach_toolbar(&mut self, window: WindowId) {
        match self
            .host
            .create_toolbar(window, &self.assets.toolbar_icons)
        {
            Ok(toolbar) => self.toolbar = Some(toolbar),
            Err(error) => {
                warn!(%window, %error, "toolbar unavailable; continuing without it");
                self.toolbar = None;
            }
        }
    }

    /// Applies the initial-load policy and returns the URL to load.
    fn initial_target(&mut self, window: WindowId, url: &str, now: Instant) -> String {
        let Some(state) = self.windows.get(&window) else {
            return url.to_owned();
        };
        let decision = self.engine.decide(&NavigationRequest {
            kind: NavigationKind::InitialLoad,
            target_url: url,
            window: state.context(None),
        });

        let target = match &decision {
            PolicyDecision::RedirectToSafeHome { target_url, notice } => {
                warn!(
                    %window,
                    domain = %notice.domain,
                    reason = notice.reason.as_str(),
                    fallback = %target_url,
                    "initial load rejected"
                );
                if let Some(state) = self.windows.get_mut(&window) {
                    state.initial_url.clone_from(target_url);
                }
                self.notify_blocked(window, notice, now);
                target_url.clone()
            }
            _ => url.to_owned(),
        };

        if let Some(state) = self.windows.get_mut(&window) {
            state.last_navigation_outcome = Some(decision);
        }
        target
    }

    fn on_navigation(
        &mut self,
        kind: NavigationKind,
        surface: SurfaceId,
        target_url: &str,
        reported_url: Option<&str>,
        now: Instant,
    ) -> EventResponse {
        if self.probes.owns(surface) {
            return EventResponse::Proceed;
        }
        let Some(window) = self.surfaces.get(&surface).copied() else {
            warn!(%surface, target = target_url, "navigation on unknown surface cancelled");
            return EventResponse::Cancel;
        };
        let Some(state) = self.windows.get(&window) else {
            return EventResponse::Cancel;
        };

        let context = state.context(reported_url);
        let decision = self.engine.decide(&NavigationRequest {
            kind,
            target_url,
            window: context,
        });
        let rebased = self
            .engine
            .rebased_home(&context, kind, target_url, &decision);
        let role = state.role;
        // The primary returns to its last good page while the probe runs.
        let redirect_fallback = (kind == NavigationKind::WillRedirect
            && role.is_primary()
            && state.fallback == FallbackState::Idle
            && matches!(decision, PolicyDecision::EscalateToProbe { .. }))
        .then(|| self.engine.fallback_target(&context, target_url));

        if let Some(state) = self.windows.get_mut(&window) {
            if let Some(home) = rebased {
                info!(%window, home = %home, "auxiliary home rebased after redirect");
                state.initial_url = home;
                state.recovering = false;
            }
            state.last_navigation_outcome = Some(decision.clone());
        }

        match decision {
            PolicyDecision::Allow => EventResponse::Proceed,
            PolicyDecision::AllowInNewWindow { url } => {
                self.tasks
                    .push(now, ShellTask::OpenAuxiliary { url, opener: window });
                EventResponse::Cancel
            }
            PolicyDecision::OpenExternal { url } => {
                self.tasks.push(now, ShellTask::OpenExternal { url });
                EventResponse::Cancel
            }
            PolicyDecision::EscalateToProbe { url } => {
                if self.probes.is_probing(window, &url) {
                    debug!(%window, target = %url, "probe already in flight");
                    return EventResponse::Cancel;
                }
                if let Err(error) = self.probes.begin(&mut self.host, window, &url, now) {
                    warn!(%window, target = %url, %error, "probe could not start");
                }
                if let Some(fallback) = redirect_fallback {
                    if let Some(state) = self.windows.get_mut(&window) {
                        state.fallback = FallbackState::Scheduled;
                    }
                    self.tasks.push(
                        now + self.settings.fallback_delay(),
                        ShellTask::LoadFallback {
                            window,
                            url: fallback,
                        },
                    );
                }
                EventResponse::Cancel
            }
            PolicyDecision::BlockSilent => {
                debug!(%window, target = target_url, "hostless navigation dropped");
                EventResponse::Cancel
            }
            PolicyDecision::BlockWithDialog(notice) => {
                warn!(
                    %window,
                    domain = %notice.domain,
                    reason = notice.reason.as_str(),
                    "navigation blocked"
                );
                let ticket = self.notify_blocked(window, &notice, now);
                if kind == NavigationKind::WillNavigate && !role.is_primary() {
                    self.close_after_dialog(window, ticket, now);
                }
                EventResponse::Cancel
            }
            PolicyDecision::RedirectToSafeHome { target_url, notice } => {
                self.on_blocked_redirect(window, target_url, &notice, now);
                EventResponse::Cancel
            }
        }
    }

    fn on_blocked_redirect(
        &mut self,
        window: WindowId,
        fallback_url: String,
        notice: &BlockedNavigation,
        now: Instant,
    ) {
        let Some(state) = self.windows.get(&window) else {
            return;
        };
        let role = state.role;

        match state.fallback {
            FallbackState::Scheduled => {
                debug!(%window, domain = %notice.domain, "duplicate blocked redirect cancelled");
            }
            FallbackState::Loading => {
                warn!(
                    %window,
                    domain = %notice.domain,
                    "return to home redirected to a blocked domain"
                );
                if let Some(state) = self.windows.get_mut(&window) {
                    state.fallback = FallbackState::Idle;
                    state.recovering = false;
                }
                if role.is_primary() {
                    self.notify_blocked(window, notice, now);
                } else {
                    self.tasks.push(now, ShellTask::CloseWindow { window });
                }
            }
            FallbackState::Idle => {
                warn!(
                    %window,
                    domain = %notice.domain,
                    fallback = %fallback_url,
                    "redirect blocked; returning home"
                );
                if let Some(state) = self.windows.get_mut(&window) {
                    state.fallback = FallbackState::Scheduled;
                    state.recovering = true;
                }
                self.notify_blocked(window, notice, now);
                self.tasks.push(
                    now + self.settings.fallback_delay(),
                    ShellTask::LoadFallback {
                        window,
                        url: fallback_url,
                    },
                );
            }
        }
    }

    fn on_window_open(
        &mut self,
        surface: SurfaceId,
        target_url: &str,
        reported_url: Option<&str>,
        now: Instant,
    ) -> EventResponse {
        // The host never creates the popup itself; follow-ups are ours.
        if self.probes.owns(surface) {
            return EventResponse::Cancel;
        }
        let Some(window) = self.surfaces.get(&surface).copied() else {
            warn!(%surface, target = target_url, "window.open on unknown surface denied");
            return EventResponse::Cancel;
        };
        let Some(state) = self.windows.get(&window) else {
            return EventResponse::Cancel;
        };

        let decision = self.engine.decide(&NavigationRequest {
            kind: NavigationKind::WindowOpen,
            target_url,
            window: state.context(reported_url),
        });
        if let Some(state) = self.windows.get_mut(&window) {
            state.last_navigation_outcome = Some(decision.clone());
        }

        match decision {
            PolicyDecision::Allow => self.tasks.push(
                now,
                ShellTask::LoadUrl {
                    window,
                    url: target_url.to_owned(),
                },
            ),
            PolicyDecision::AllowInNewWindow { url } => self
                .tasks
                .push(now, ShellTask::OpenAuxiliary { url, opener: window }),
            PolicyDecision::OpenExternal { url } => {
                info!(%window, url = %url, "handing link to the system browser");
                self.tasks.push(now, ShellTask::OpenExternal { url });
            }
            PolicyDecision::BlockWithDialog(notice) => {
                warn!(
                    %window,
                    domain = %notice.domain,
                    reason = notice.reason.as_str(),
                    "popup blocked"
                );
                self.notify_blocked(window, &notice, now);
            }
            other => {
                debug!(%window, target = target_url, decision = other.label(), "popup dropped");
            }
        }
        EventResponse::Cancel
    }

    fn on_commit(&mut self, surface: SurfaceId, url: String) {
        if self.probes.owns(surface) {
            return;
        }
        let Some(window) = self.surfaces.get(&surface).copied() else {
            return;
        };
        let config = self.engine.config();
        let Some(state) = self.windows.get_mut(&window) else {
            return;
        };

        if state.fallback == FallbackState::Loading {
            info!(%window, url = %url, "returned home after blocked redirect");
        }
        if cs_domain::classify_url(&url, config, state.role).allowed {
            state.last_good_url = Some(url.clone());
        }
        state.current_url = Some(url);
        state.first_load_committed = true;
        state.fallback = FallbackState::Idle;
        state.recovering = false;

        if self.primary == Some(window) {
            self.sync_toolbar();
        }
    }

    fn on_load_failed(&mut self, surface: SurfaceId, error: &str) {
        let Some(window) = self.surfaces.get(&surface).copied() else {
            return;
        };
        if let Some(state) = self.windows.get_mut(&window) {
            warn!(%window, %surface, error, fallback = state.fallback.as_str(), "page load failed");
            if state.fallback == FallbackState::Loading {
                state.fallback = FallbackState::Idle;
            }
        }
        if self.primary == Some(window) {
            self.sync_toolbar();
        }
    }

    fn on_probe_outcome(&mut self, outcome: Option<ProbeOutcome>, now: Instant) {
        let Some(outcome) = outcome else {
            return;
        };

        let (origin, requested, final_url) = match outcome {
            ProbeOutcome::Landed {
                origin,
                requested,
                final_url,
            } => (origin, requested, final_url),
            ProbeOutcome::Failed {
                origin,
                requested,
                error,
            } => {
                warn!(%origin, target = %requested, error = %error, "probe failed; nothing opened");
                return;
            }
            ProbeOutcome::TimedOut { origin, requested } => {
                warn!(%origin, target = %requested, "probe timed out; nothing opened");
                return;
            }
        };

        let Some(state) = self.windows.get(&origin) else {
            debug!(%origin, "probe landed after its window closed");
            return;
        };
        let decision = self
            .engine
            .decide_landing(&state.context(None), &requested, &final_url);
        info!(
            %origin,
            requested = %requested,
            landed = %final_url,
            decision = decision.label(),
            "probe landed"
        );
        if let Some(state) = self.windows.get_mut(&origin) {
            state.last_navigation_outcome = Some(decision.clone());
        }

        match decision {
            PolicyDecision::Allow => {
                if let Some(state) = self.windows.get_mut(&origin) {
                    if state.fallback == FallbackState::Scheduled {
                        state.fallback = FallbackState::Idle;
                    }
                }
                self.tasks.push(
                    now,
                    ShellTask::LoadUrl {
                        window: origin,
                        url: final_url,
                    },
                );
            }
            PolicyDecision::AllowInNewWindow { url } => self
                .tasks
                .push(now, ShellTask::OpenAuxiliary { url, opener: origin }),
            PolicyDecision::BlockWithDialog(notice) => {
                warn!(
                    %origin,
                    domain = %notice.domain,
                    reason = notice.reason.as_str(),
                    "probe landed on a blocked domain"
                );
                self.notify_blocked(origin, &notice, now);
            }
            _ => {}
        }
    }

    fn on_dialog_dismissed(&mut self, window: WindowId, ticket: DialogTicket, now: Instant) {
        let Some(state) = self.windows.get_mut(&window) else {
            return;
        };
        if state.pending_close == Some(ticket) {
            state.pending_close = None;
            self.tasks.push(now, ShellTask::CloseWindow { window });
        }
    }

    fn on_key_input(&mut self, window: WindowId, chord: &KeyChord, now: Instant) -> EventResponse {
        if is_devtools_chord(chord) {
            debug!(%window, key = %chord.key, "developer tools shortcut swallowed");
            return EventResponse::Cancel;
        }
        if self.focused != Some(window) {
            debug!(%window, key = %chord.key, "shortcut from unfocused window ignored");
            return EventResponse::Proceed;
        }
        if self.shortcuts.is_system_info(chord) {
            self.show_system_info(window);
            return EventResponse::Cancel;
        }
        match self.shortcuts.action_for(chord) {
            Some(action) => {
                self.perform(window, action, now);
                EventResponse::Cancel
            }
            None => EventResponse::Proceed,
        }
    }

    /// Shows the block dialog unless an identical one was just shown.
    fn notify_blocked(
        &mut self,
        window: WindowId,
        notice: &BlockedNavigation,
        now: Instant,
    ) -> Option<DialogTicket> {
        if !self
            .debouncer
            .should_show_at(&notice.domain, notice.kind, now)
        {
            debug!(%window, domain = %notice.domain, "block dialog debounced");
            return None;
        }

        let dialog = BlockNotice {
            domain: notice.domain.clone(),
            reason: notice.reason.as_str().to_owned(),
            kind: notice.kind,
        };
        match self.host.show_blocked_dialog(window, &dialog) {
            Ok(ticket) => Some(ticket),
            Err(error) => {
                warn!(%window, %error, "block dialog could not be shown");
                None
            }
        }
    }

    /// Closes an auxiliary window once its block dialog is dismissed, or
    /// right away when no dialog is on screen.
    fn close_after_dialog(&mut self, window: WindowId, ticket: Option<DialogTicket>, now: Instant) {
        match ticket {
            Some(ticket) => {
                if let Some(state) = self.windows.get_mut(&window) {
                    state.pending_close = Some(ticket);
                }
            }
            None => self.tasks.push(now, ShellTask::CloseWindow { window }),
        }
    }

    fn execute(&mut self, task: ShellTask, now: Instant) {
        match task {
            ShellTask::LoadFallback { window, url } => {
                let Some(state) = self.windows.get_mut(&window) else {
                    return;
                };
                if state.fallback != FallbackState::Scheduled {
                    debug!(%window, "fallback no longer needed");
                    return;
                }
                state.fallback = FallbackState::Loading;
                self.load_in(window, &url);
            }
            ShellTask::LoadUrl { window, url } => self.load_in(window, &url),
            ShellTask::OpenAuxiliary { url, opener } => {
                if let Err(error) = self.open_window(WindowRole::Auxiliary, &url, Some(opener), now)
                {
                    warn!(%opener, url = %url, %error, "auxiliary window could not be opened");
                }
            }
            ShellTask::OpenExternal { url } => {
                if let Err(error) = self.host.open_external(&url) {
                    warn!(url = %url, %error, "system browser could not be launched");
                }
            }
            ShellTask::CloseWindow { window } => self.close(window),
            ShellTask::ForceShow { window } => {
                if self.windows.get(&window).is_some_and(|state| !state.shown) {
                    info!(%window, "first paint not reported; showing window anyway");
                    self.show(window);
                }
            }
            ShellTask::RefreshToolbar => self.sync_toolbar(),
        }
    }

    fn perform(&mut self, window: WindowId, action: NavAction, now: Instant) {
        let Some(state) = self.windows.get(&window) else {
            return;
        };
        let surface = state.surface;
        if !self.host.is_surface_alive(surface) {
            debug!(%window, action = action.as_str(), "surface gone; action ignored");
            return;
        }

        let result = match action {
            NavAction::Back => self.host.go_back(surface),
            NavAction::Forward => self.host.go_forward(surface),
            NavAction::Refresh => self.host.reload(surface),
            NavAction::Home => {
                let home = state.initial_url.clone();
                self.host.load_url(surface, &home)
            }
        };
        if let Err(error) = result {
            warn!(%window, action = action.as_str(), %error, "navigation action failed");
        }

        if matches!(action, NavAction::Back | NavAction::Forward) {
            self.tasks.push(
                now + self.settings.toolbar_refresh_delay(),
                ShellTask::RefreshToolbar,
            );
        }
    }

    fn load_in(&mut self, window: WindowId, url: &str) {
        let Some(surface) = self.surface_of(window) else {
            return;
        };
        if !self.host.is_surface_alive(surface) {
            debug!(%window, %surface, url, "surface gone; load skipped");
            return;
        }
        if let Err(error) = self.host.load_url(surface, url) {
            warn!(%window, url, %error, "load failed to start");
        }
    }

    fn show(&mut self, window: WindowId) {
        let Some(state) = self.windows.get_mut(&window) else {
            return;
        };
        if state.shown {
            return;
        }
        state.shown = true;
        if let Err(error) = self.host.show_window(window) {
            warn!(%window, %error, "window could not be shown");
            return;
        }
        // Keyboard input only reaches a window that holds system focus.
        match self.host.focus_window(window) {
            Ok(()) => self.focused = Some(window),
            Err(error) => warn!(%window, %error, "window could not be focused"),
        }
    }

    fn show_system_info(&mut self, window: WindowId) {
        let target = self.primary.unwrap_or(window);
        let info = SystemInfo {
            product: self.settings.user_agent_product.clone(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            platform: self.shortcuts.platform().as_str().to_owned(),
            arch: std::env::consts::ARCH.to_owned(),
            user_agent: self.user_agent.clone(),
        };
        if let Err(error) = self.host.show_info_dialog(target, &info) {
            warn!(window = %target, %error, "system information dialog could not be shown");
        }
    }

    fn sync_toolbar(&mut self) {
        let (Some(toolbar), Some(primary)) = (self.toolbar, self.primary) else {
            return;
        };
        let Some(surface) = self.surface_of(primary) else {
            return;
        };
        let Some(history) = self.host.history(surface) else {
            return;
        };
        let state = NavigationState::from_history(history);
        if let Err(error) = self.host.update_navigation_state(toolbar, state) {
            warn!(%toolbar, %error, "toolbar state update failed");
        }
    }

    fn is_primary_surface(&self, surface: SurfaceId) -> bool {
        self.primary.is_some() && self.surfaces.get(&surface).copied() == self.primary
    }

    fn close(&mut self, window: WindowId) {
        if self.host.is_window_alive(window) {
            if let Err(error) = self.host.close_window(window) {
                warn!(%window, %error, "window close failed");
            }
        }
        self.teardown(window);
    }

    fn teardown(&mut self, window: WindowId) {
        let Some(state) = self.windows.remove(&window) else {
            return;
        };
        self.surfaces.remove(&state.surface);
        let dropped = self.tasks.drop_for_window(window);
        let probes = self.probes.cancel_for_window(&mut self.host, window);
        if self.focused == Some(window) {
            self.focused = None;
        }
        info!(
            %window,
            role = state.role.as_str(),
            dropped_tasks = dropped,
            cancelled_probes = probes,
            "window closed"
        );

        if self.primary == Some(window) {
            self.primary = None;
            self.toolbar = None;
            let auxiliaries = self.window_ids();
            for auxiliary in auxiliaries {
                self.close(auxiliary);
            }
            self.tasks.clear();
            self.shut_down = true;
            info!("primary window closed; shell shut down");
        }
    }
}
