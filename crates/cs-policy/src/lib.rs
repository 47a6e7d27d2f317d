//! Navigation policy engine.
//!
//! A pure, synchronous decision function: given the navigation kind, the
//! target and a snapshot of the window it happens in, produce a
//! [`PolicyDecision`]. Everything that touches a render surface lives in the
//! coordinator; nothing here suspends or mutates shared state.

mod decision;

pub use decision::BlockedNavigation;
pub use decision::NavigationKind;
pub use decision::NavigationRequest;
pub use decision::PolicyDecision;
pub use decision::WindowContext;

use cs_config::PolicyConfig;
use cs_core::BlockKind;
use cs_core::ShellError;
use cs_core::ShellResult;
use cs_core::WindowRole;
use cs_domain::classify;
use cs_domain::hostname_of;
use std::sync::Arc;
use tracing::debug;

/// Decides every navigation against one immutable [`PolicyConfig`].
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    config: Arc<PolicyConfig>,
}

impl PolicyEngine {
    /// Builds the engine, refusing configs whose home page the primary
    /// window could never show.
    pub fn new(config: Arc<PolicyConfig>) -> ShellResult<Self> {
        let home = hostname_of(&config.home_url);
        let verdict = classify(home.as_deref(), &config, WindowRole::Primary);
        if let Some(reason) = verdict.reason {
            return Err(ShellError::new(
                "policy.home_url_rejected",
                format!(
                    "home_url `{}` is rejected for the primary window: {}",
                    config.home_url,
                    reason.as_str()
                ),
            ));
        }

        Ok(Self { config })
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn decide(&self, request: &NavigationRequest<'_>) -> PolicyDecision {
        let decision = match request.kind {
            NavigationKind::WillNavigate | NavigationKind::WillRedirect => {
                self.decide_same_window(request)
            }
            NavigationKind::WindowOpen => self.decide_window_open(request),
            NavigationKind::InitialLoad => self.decide_initial_load(request),
        };

        debug!(
            kind = request.kind.as_str(),
            role = request.window.role.as_str(),
            target = request.target_url,
            decision = decision.label(),
            "navigation decided"
        );
        decision
    }

    /// Second, authoritative pass over the URL a probe finally landed on.
    pub fn decide_landing(
        &self,
        window: &WindowContext<'_>,
        requested_url: &str,
        final_url: &str,
    ) -> PolicyDecision {
        let Some(host) = hostname_of(final_url) else {
            return PolicyDecision::BlockSilent;
        };

        let verdict = classify(Some(&host), &self.config, window.role);
        if let Some(reason) = verdict.reason {
            let kind = if final_url == requested_url {
                BlockKind::Default
            } else {
                BlockKind::Redirect
            };
            return PolicyDecision::BlockWithDialog(BlockedNavigation {
                domain: host,
                reason,
                kind,
            });
        }

        let in_main_domain = cs_domain::is_main_domain(&host, &self.config);
        let same_as_current = current_host(window).is_some_and(|current| current == host);
        if (window.role.is_primary() && in_main_domain) || same_as_current {
            PolicyDecision::Allow
        } else {
            PolicyDecision::AllowInNewWindow {
                url: final_url.to_owned(),
            }
        }
    }

    /// URL a window returns to after a blocked redirect or a rejected
    /// initial load.
    ///
    /// Auxiliary windows go back to their own home; the primary window
    /// prefers the last page it successfully committed so it is never left
    /// half-navigated.
    pub fn fallback_target(&self, window: &WindowContext<'_>, rejected_url: &str) -> String {
        let mut candidates = Vec::with_capacity(2);
        if window.role.is_primary() {
            candidates.extend(window.last_good_url);
        }
        candidates.push(window.initial_url);

        candidates
            .into_iter()
            .find(|candidate| self.is_safe_fallback(candidate, rejected_url, window.role))
            .map_or_else(|| self.config.home_url.clone(), str::to_owned)
    }

    /// New home for an auxiliary window after an allowed redirect, if the
    /// redirect should replace it.
    pub fn rebased_home(
        &self,
        window: &WindowContext<'_>,
        kind: NavigationKind,
        target_url: &str,
        decision: &PolicyDecision,
    ) -> Option<String> {
        if window.role.is_primary()
            || kind != NavigationKind::WillRedirect
            || !decision.proceeds_in_place()
            || target_url == window.initial_url
        {
            return None;
        }

        if window.recovering {
            return Some(target_url.to_owned());
        }

        if !window.first_load_committed && cs_domain::same_host(window.initial_url, target_url) {
            return Some(target_url.to_owned());
        }

        None
    }

    fn decide_same_window(&self, request: &NavigationRequest<'_>) -> PolicyDecision {
        let window = &request.window;
        let Some(host) = hostname_of(request.target_url) else {
            return PolicyDecision::BlockSilent;
        };

        let verdict = classify(Some(&host), &self.config, window.role);
        if let Some(reason) = verdict.reason {
            let notice = BlockedNavigation {
                domain: host,
                reason,
                kind: request.kind.block_kind(),
            };
            return match request.kind {
                NavigationKind::WillRedirect => PolicyDecision::RedirectToSafeHome {
                    target_url: self.fallback_target(window, request.target_url),
                    notice,
                },
                _ => PolicyDecision::BlockWithDialog(notice),
            };
        }

        let leaves_current_host = current_host(window).is_none_or(|current| current != host);
        if window.role.is_primary()
            && cs_domain::is_foreign_whitelisted(&host, &self.config)
            && leaves_current_host
        {
            return PolicyDecision::EscalateToProbe {
                url: request.target_url.to_owned(),
            };
        }

        PolicyDecision::Allow
    }

    fn decide_window_open(&self, request: &NavigationRequest<'_>) -> PolicyDecision {
        let window = &request.window;
        let Some(host) = hostname_of(request.target_url) else {
            return PolicyDecision::BlockSilent;
        };

        if cs_domain::is_external(&host, &self.config) {
            return PolicyDecision::OpenExternal {
                url: request.target_url.to_owned(),
            };
        }

        let verdict = classify(Some(&host), &self.config, window.role);
        if let Some(reason) = verdict.reason {
            return PolicyDecision::BlockWithDialog(BlockedNavigation {
                domain: host,
                reason,
                kind: BlockKind::Default,
            });
        }

        if window.role.is_primary() && cs_domain::is_main_domain(&host, &self.config) {
            return PolicyDecision::Allow;
        }

        if current_host(window).is_some_and(|current| current == host) {
            PolicyDecision::Allow
        } else {
            PolicyDecision::AllowInNewWindow {
                url: request.target_url.to_owned(),
            }
        }
    }

    fn decide_initial_load(&self, request: &NavigationRequest<'_>) -> PolicyDecision {
        let window = &request.window;
        let host = hostname_of(request.target_url);
        let verdict = classify(host.as_deref(), &self.config, window.role);
        let Some(reason) = verdict.reason else {
            return PolicyDecision::Allow;
        };

        PolicyDecision::RedirectToSafeHome {
            target_url: self.fallback_target(window, request.target_url),
            notice: BlockedNavigation {
                domain: host.unwrap_or_else(|| request.target_url.trim().to_owned()),
                reason,
                kind: BlockKind::Default,
            },
        }
    }

    fn is_safe_fallback(&self, candidate: &str, rejected_url: &str, role: WindowRole) -> bool {
        let candidate = candidate.trim();
        if candidate.is_empty() || candidate == rejected_url.trim() {
            return false;
        }

        let host = hostname_of(candidate);
        host.is_some() && classify(host.as_deref(), &self.config, role).allowed
    }
}

fn current_host(window: &WindowContext<'_>) -> Option<String> {
    window.current_url.and_then(hostname_of)
}

/// Human-readable reason used in dialogs and logs.
pub fn describe(notice: &BlockedNavigation) -> String {
    format!(
        "{} blocked ({}): {}",
        notice.domain,
        notice.kind.as_str(),
        notice.reason.as_str()
    )
}
