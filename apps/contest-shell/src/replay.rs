//! Scripted sessions against the simulated host.
//!
//! A script sets up redirect routes and failing URLs, then feeds host events
//! addressed by window index (in creation order) to a real coordinator. The
//! clock is virtual: `wait` steps jump it forward and run whatever deferred
//! work falls due on the way.

use cs_config::AppConfig;
use cs_core::ShellError;
use cs_core::ShellResult;
use cs_host::HostCall;
use cs_host::HostEvent;
use cs_host::KeyChord;
use cs_host::NavAction;
use cs_host::SimulatedHost;
use cs_host::SurfaceId;
use cs_host::WindowId;
use cs_shell::Coordinator;
use cs_shell::Platform;
use cs_shell::ShellAssets;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use tracing::info;

/// A replay script as read from TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplayScript {
    pub platform: Option<String>,
    pub redirects: Vec<RedirectRoute>,
    pub failing: Vec<String>,
    pub auto_dismiss_dialogs: bool,
    pub fail_toolbar: bool,
    pub fail_dialogs: bool,
    #[serde(rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedirectRoute {
    pub from: String,
    pub to: String,
}

/// One scripted host event or clock advance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "do", rename_all = "kebab-case")]
pub enum Step {
    Navigate { window: usize, url: String },
    Redirect { window: usize, url: String },
    Open { window: usize, url: String },
    Toolbar { window: usize, action: String },
    Key { window: usize, chord: String },
    Focus { window: usize },
    Close { window: usize },
    DismissDialog { window: usize },
    Wait { ms: u64 },
}

impl Step {
    fn label(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::Redirect { .. } => "redirect",
            Self::Open { .. } => "open",
            Self::Toolbar { .. } => "toolbar",
            Self::Key { .. } => "key",
            Self::Focus { .. } => "focus",
            Self::Close { .. } => "close",
            Self::DismissDialog { .. } => "dismiss-dialog",
            Self::Wait { .. } => "wait",
        }
    }
}

pub fn parse_script(text: &str, origin: &str) -> ShellResult<ReplayScript> {
    toml::from_str(text).map_err(|error| {
        ShellError::new(
            "replay.parse_failed",
            format!("invalid replay script {origin}: {error}"),
        )
    })
}

pub fn load_script(path: &Path) -> ShellResult<ReplayScript> {
    let text = std::fs::read_to_string(path).map_err(|error| {
        ShellError::new(
            "replay.read_failed",
            format!("failed to read {}: {error}", path.display()),
        )
    })?;
    parse_script(&text, &path.display().to_string())
}

fn parse_platform(name: Option<&str>) -> ShellResult<Platform> {
    match name {
        None => Ok(Platform::current()),
        Some("windows") => Ok(Platform::Windows),
        Some("linux") => Ok(Platform::Linux),
        Some("macos") => Ok(Platform::MacOs),
        Some(other) => Err(ShellError::new(
            "replay.platform_unknown",
            format!("unknown platform `{other}`"),
        )),
    }
}

struct Session {
    coordinator: Coordinator<SimulatedHost>,
    windows: Vec<WindowId>,
    start: Instant,
    now: Instant,
    transcript: Vec<String>,
}

impl Session {
    fn elapsed_ms(&self) -> u128 {
        self.now.duration_since(self.start).as_millis()
    }

    fn window(&self, index: usize) -> ShellResult<WindowId> {
        self.windows.get(index).copied().ok_or_else(|| {
            ShellError::new(
                "replay.window_unknown",
                format!("no window with index {index} has been opened"),
            )
        })
    }

    fn settle(&mut self) {
        self.coordinator.run_due_tasks(self.now);
        for (event, response) in self.coordinator.pump_host_events(self.now) {
            if matches!(
                event,
                HostEvent::WillNavigate { .. }
                    | HostEvent::WillRedirect { .. }
                    | HostEvent::WindowOpenRequest { .. }
            ) {
                self.transcript
                    .push(format!("    host {}: {}", event.label(), response.as_str()));
            }
        }
        self.record_calls();
    }

    fn record_calls(&mut self) {
        for call in self.coordinator.host_mut().take_calls() {
            if let HostCall::CreateWindow { window, .. } = &call {
                self.windows.push(*window);
                let index = self.windows.len() - 1;
                self.transcript
                    .push(format!("    window [{index}] is {window}"));
            }
            self.transcript.push(format!("    {}", describe_call(&call)));
        }
    }

    fn advance(&mut self, by: Duration) {
        let target = self.now + by;
        loop {
            match self.coordinator.next_deadline() {
                Some(deadline) if deadline <= target => {
                    self.now = self.now.max(deadline);
                    self.settle();
                }
                _ => break,
            }
            if self.coordinator.is_shut_down() {
                break;
            }
        }
        self.now = target;
        self.settle();
    }

    fn surface_event(
        &mut self,
        index: usize,
        build: impl FnOnce(SurfaceId) -> HostEvent,
    ) -> ShellResult<Option<HostEvent>> {
        let window = self.window(index)?;
        match self.coordinator.surface_of(window) {
            Some(surface) => Ok(Some(build(surface))),
            None => {
                self.transcript
                    .push(format!("    window [{index}] is closed; step skipped"));
                Ok(None)
            }
        }
    }

    fn event_for(&mut self, step: &Step) -> ShellResult<Option<HostEvent>> {
        match step {
            Step::Navigate { window, url } => self.surface_event(*window, |surface| {
                HostEvent::WillNavigate {
                    surface,
                    target_url: url.clone(),
                    current_url: None,
                }
            }),
            Step::Redirect { window, url } => self.surface_event(*window, |surface| {
                HostEvent::WillRedirect {
                    surface,
                    target_url: url.clone(),
                    current_url: None,
                }
            }),
            Step::Open { window, url } => self.surface_event(*window, |surface| {
                HostEvent::WindowOpenRequest {
                    surface,
                    target_url: url.clone(),
                    current_url: None,
                }
            }),
            Step::Toolbar { window, action } => {
                let Some(action) = NavAction::from_name(action) else {
                    return Err(ShellError::new(
                        "replay.action_unknown",
                        format!("unknown toolbar action `{action}`"),
                    ));
                };
                Ok(Some(HostEvent::ToolbarAction {
                    window: self.window(*window)?,
                    action,
                }))
            }
            Step::Key { window, chord } => Ok(Some(HostEvent::KeyInput {
                window: self.window(*window)?,
                chord: KeyChord::parse(chord)?,
            })),
            Step::Focus { window } => Ok(Some(HostEvent::WindowFocused {
                window: self.window(*window)?,
            })),
            Step::Close { window } => Ok(Some(HostEvent::WindowClosed {
                window: self.window(*window)?,
            })),
            Step::DismissDialog { window } => {
                let window_id = self.window(*window)?;
                let ticket = self
                    .coordinator
                    .window_state(window_id)
                    .and_then(|state| state.pending_close);
                match ticket {
                    Some(ticket) => Ok(Some(HostEvent::DialogDismissed {
                        window: window_id,
                        ticket,
                    })),
                    None => {
                        self.transcript
                            .push(format!("    window [{window}] has no pending dialog"));
                        Ok(None)
                    }
                }
            }
            Step::Wait { .. } => Ok(None),
        }
    }
}

/// Runs `script` and returns the transcript, one line per entry.
pub fn run(
    script: &ReplayScript,
    config: &AppConfig,
    assets: ShellAssets,
) -> ShellResult<Vec<String>> {
    let mut host = SimulatedHost::new();
    for route in &script.redirects {
        host.add_redirect(&route.from, &route.to);
    }
    for url in &script.failing {
        host.fail_url(url);
    }
    host.set_auto_dismiss_dialogs(script.auto_dismiss_dialogs);
    host.set_fail_toolbar(script.fail_toolbar);
    host.set_fail_dialogs(script.fail_dialogs);

    let platform = parse_platform(script.platform.as_deref())?;
    let coordinator = Coordinator::new(
        host,
        Arc::new(config.policy.clone()),
        config.shell.clone(),
        assets,
        platform,
    )?;
    let start = Instant::now();
    let mut session = Session {
        coordinator,
        windows: Vec::new(),
        start,
        now: start,
        transcript: vec![format!(
            "[+0ms] start on {} ({})",
            config.policy.home_url,
            platform.as_str()
        )],
    };

    session.coordinator.start(start)?;
    session.settle();

    for step in &script.steps {
        if session.coordinator.is_shut_down() {
            session
                .transcript
                .push("shell shut down; remaining steps skipped".to_owned());
            break;
        }
        if let Step::Wait { ms } = step {
            session.advance(Duration::from_millis(*ms));
            session
                .transcript
                .push(format!("[+{}ms] waited {ms}ms", session.elapsed_ms()));
            continue;
        }

        let header = format!("[+{}ms] {}", session.elapsed_ms(), step.label());
        let mark = session.transcript.len();
        let Some(event) = session.event_for(step)? else {
            session.transcript.insert(mark, header);
            continue;
        };
        let detail = describe_event(&event);
        let response = session.coordinator.handle_event(event, session.now);
        session
            .transcript
            .insert(mark, format!("{header} {detail}: {}", response.as_str()));
        session.settle();
    }

    let open = session.coordinator.window_ids().len();
    session.transcript.push(format!(
        "end: {open} window(s) open, shut down: {}",
        session.coordinator.is_shut_down()
    ));
    info!(steps = script.steps.len(), windows = session.windows.len(), "replay finished");
    Ok(session.transcript)
}

fn describe_event(event: &HostEvent) -> String {
    match event {
        HostEvent::WillNavigate { target_url, .. }
        | HostEvent::WillRedirect { target_url, .. }
        | HostEvent::WindowOpenRequest { target_url, .. } => target_url.clone(),
        HostEvent::ToolbarAction { window, action } => format!("{} in {window}", action.as_str()),
        HostEvent::KeyInput { window, chord } => format!("{} in {window}", chord.key),
        HostEvent::DialogDismissed { window, ticket } => format!("{ticket} in {window}"),
        HostEvent::WindowFocused { window } | HostEvent::WindowClosed { window } => {
            window.to_string()
        }
        other => other.label().to_owned(),
    }
}

fn describe_call(call: &HostCall) -> String {
    match call {
        HostCall::CreateWindow { window, role, size } => format!(
            "create {} {window} {}x{}",
            role.as_str(),
            size.width,
            size.height
        ),
        HostCall::ShowWindow(window) => format!("show {window}"),
        HostCall::HideWindow(window) => format!("hide {window}"),
        HostCall::CloseWindow(window) => format!("close {window}"),
        HostCall::FocusWindow(window) => format!("focus {window}"),
        HostCall::CreateSurface { surface, .. } => format!("create {surface}"),
        HostCall::DestroySurface(surface) => format!("destroy {surface}"),
        HostCall::LoadUrl { surface, url } => format!("load {url} in {surface}"),
        HostCall::GoBack(surface) => format!("back in {surface}"),
        HostCall::GoForward(surface) => format!("forward in {surface}"),
        HostCall::Reload(surface) => format!("reload {surface}"),
        HostCall::SetUserAgent { surface, user_agent } => {
            format!("user agent of {surface}: {user_agent}")
        }
        HostCall::CreateToolbar(window) => format!("toolbar for {window}"),
        HostCall::UpdateNavigationState { state, .. } => format!(
            "toolbar state back={} forward={}",
            state.can_go_back, state.can_go_forward
        ),
        HostCall::ShowBlockedDialog { window, notice } => format!(
            "dialog in {window}: {} ({})",
            notice.title(),
            notice.domain
        ),
        HostCall::OpenExternal(url) => format!("open externally {url}"),
        HostCall::ShowInfoDialog { window, info } => {
            format!("info dialog in {window}: {} {}", info.product, info.version)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Step;
    use super::parse_script;
    use super::run;
    use cs_config::AppConfig;
    use cs_shell::ShellAssets;
    use pretty_assertions::assert_eq;

    const SCRIPT: &str = r#"
platform = "linux"
auto_dismiss_dialogs = false

[[redirects]]
from = "https://rank.ac/login"
to = "https://rank.ac/session"

[[step]]
do = "open"
window = 0
url = "https://rank.ac/login"

[[step]]
do = "wait"
ms = 10

[[step]]
do = "navigate"
window = 1
url = "https://evil.example/"

[[step]]
do = "dismiss-dialog"
window = 1

[[step]]
do = "wait"
ms = 10
"#;

    fn transcript(script: &str) -> Vec<String> {
        let script = parse_script(script, "test").unwrap_or_else(|_| unreachable!());
        run(&script, &AppConfig::default(), ShellAssets::default())
            .unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn script_steps_parse_by_tag() {
        let script = parse_script(SCRIPT, "test").unwrap_or_else(|_| unreachable!());
        assert_eq!(script.steps.len(), 5);
        assert_eq!(script.steps[1], Step::Wait { ms: 10 });
        assert_eq!(script.redirects.len(), 1);
    }

    #[test]
    fn bundled_demo_runs_to_completion() {
        let lines = transcript(include_str!("../../../demos/redirect-loop.toml"));
        let joined = lines.join("\n");

        assert!(joined.contains("load https://op.sdutacm.cn/"), "{joined}");
        assert!(joined.contains("open externally https://github.com/sdutacm"), "{joined}");
        assert_eq!(
            lines.iter().filter(|line| line.contains("Redirect blocked")).count(),
            1,
            "{joined}"
        );
        assert!(
            lines.last().is_some_and(|line| line.ends_with("shut down: false")),
            "{joined}"
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = parse_script("colour = \"red\"\n", "test");
        assert_eq!(result.err().map(|e| e.code), Some("replay.parse_failed"));
    }

    #[test]
    fn popup_is_opened_then_closed_after_blocked_navigation() {
        let lines = transcript(SCRIPT);
        let joined = lines.join("\n");

        assert!(joined.contains("window [1] is window#"), "{joined}");
        assert!(joined.contains("create auxiliary"), "{joined}");
        assert!(joined.contains("load https://rank.ac/login"), "{joined}");
        assert!(joined.contains("dialog in"), "{joined}");
        assert!(
            lines.last().is_some_and(|line| line.starts_with("end: 1 window(s) open")),
            "{joined}"
        );
    }

    #[test]
    fn unknown_window_index_is_an_error() {
        let script = parse_script("[[step]]\ndo = \"close\"\nwindow = 4\n", "test")
            .unwrap_or_else(|_| unreachable!());
        let result = run(&script, &AppConfig::default(), ShellAssets::default());
        assert_eq!(result.err().map(|e| e.code), Some("replay.window_unknown"));
    }

    #[test]
    fn closing_the_primary_skips_remaining_steps() {
        let lines = transcript(
            "[[step]]\ndo = \"close\"\nwindow = 0\n\n[[step]]\ndo = \"wait\"\nms = 5\n",
        );
        assert!(lines.iter().any(|line| line.contains("remaining steps skipped")));
        assert_eq!(
            lines.last().map(String::as_str),
            Some("end: 0 window(s) open, shut down: true")
        );
    }
}
