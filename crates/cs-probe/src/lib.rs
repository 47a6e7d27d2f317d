//! Redirect resolution probes.
//!
//! Some whitelisted hosts answer with a redirect chain that may end on the
//! main domain, on another whitelisted host or somewhere blocked. A probe
//! loads the target in an offscreen surface, lets it follow redirects
//! unchecked and reports where it settled so the policy engine can decide
//! on the real landing URL. Every probe ends by destroying its surface.

use cs_core::ShellResult;
use cs_host::RenderHost;
use cs_host::SurfaceAttachment;
use cs_host::SurfaceId;
use cs_host::WindowId;
use std::collections::BTreeMap;
use std::time::Duration;
use std::time::Instant;
use tracing::debug;
use tracing::warn;

/// How a probe ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Landed {
        origin: WindowId,
        requested: String,
        final_url: String,
    },
    Failed {
        origin: WindowId,
        requested: String,
        error: String,
    },
    TimedOut {
        origin: WindowId,
        requested: String,
    },
}

impl ProbeOutcome {
    pub fn origin(&self) -> WindowId {
        match self {
            Self::Landed { origin, .. }
            | Self::Failed { origin, .. }
            | Self::TimedOut { origin, .. } => *origin,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Landed { .. } => "landed",
            Self::Failed { .. } => "failed",
            Self::TimedOut { .. } => "timed-out",
        }
    }
}

#[derive(Debug, Clone)]
struct Probe {
    origin: WindowId,
    requested: String,
    deadline: Instant,
}

/// Probes in flight, keyed by their offscreen surface.
#[derive(Debug)]
pub struct ProbeTracker {
    timeout: Duration,
    probes: BTreeMap<SurfaceId, Probe>,
}

impl ProbeTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            probes: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// True if `surface` is a probe surface; its events bypass policy.
    pub fn owns(&self, surface: SurfaceId) -> bool {
        self.probes.contains_key(&surface)
    }

    /// True if `origin` already has a probe of `target_url` in flight.
    pub fn is_probing(&self, origin: WindowId, target_url: &str) -> bool {
        self.probes
            .values()
            .any(|probe| probe.origin == origin && probe.requested == target_url)
    }

    /// Starts a probe of `target_url` on behalf of `origin`.
    pub fn begin<H>(
        &mut self,
        host: &mut H,
        origin: WindowId,
        target_url: &str,
        now: Instant,
    ) -> ShellResult<SurfaceId>
    where
        H: RenderHost + ?Sized,
    {
        let surface = host.create_surface(SurfaceAttachment::Offscreen)?;
        // Registered before loading: a synchronous host may queue the
        // finish event during `load_url`.
        self.probes.insert(
            surface,
            Probe {
                origin,
                requested: target_url.to_owned(),
                deadline: now + self.timeout,
            },
        );

        if let Err(error) = host.load_url(surface, target_url) {
            self.probes.remove(&surface);
            destroy(host, surface);
            return Err(error);
        }

        debug!(%surface, %origin, target = target_url, "probe started");
        Ok(surface)
    }

    /// Handles the first finished load of a probe surface.
    pub fn on_finish_load<H>(&mut self, host: &mut H, surface: SurfaceId) -> Option<ProbeOutcome>
    where
        H: RenderHost + ?Sized,
    {
        let probe = self.probes.remove(&surface)?;
        let settled = host.current_url(surface);
        destroy(host, surface);

        let outcome = match settled {
            Some(final_url) => ProbeOutcome::Landed {
                origin: probe.origin,
                requested: probe.requested,
                final_url,
            },
            None => ProbeOutcome::Failed {
                origin: probe.origin,
                requested: probe.requested,
                error: "settled URL unavailable".to_owned(),
            },
        };
        debug!(%surface, outcome = outcome.label(), "probe finished");
        Some(outcome)
    }

    pub fn on_fail_load<H>(
        &mut self,
        host: &mut H,
        surface: SurfaceId,
        error: &str,
    ) -> Option<ProbeOutcome>
    where
        H: RenderHost + ?Sized,
    {
        let probe = self.probes.remove(&surface)?;
        destroy(host, surface);
        debug!(%surface, error, "probe load failed");
        Some(ProbeOutcome::Failed {
            origin: probe.origin,
            requested: probe.requested,
            error: error.to_owned(),
        })
    }

    /// Ends every probe whose deadline has passed.
    pub fn expire<H>(&mut self, host: &mut H, now: Instant) -> Vec<ProbeOutcome>
    where
        H: RenderHost + ?Sized,
    {
        let expired: Vec<SurfaceId> = self
            .probes
            .iter()
            .filter(|(_, probe)| probe.deadline <= now)
            .map(|(surface, _)| *surface)
            .collect();

        let mut outcomes = Vec::with_capacity(expired.len());
        for surface in expired {
            if let Some(probe) = self.probes.remove(&surface) {
                destroy(host, surface);
                warn!(%surface, target = %probe.requested, "probe timed out");
                outcomes.push(ProbeOutcome::TimedOut {
                    origin: probe.origin,
                    requested: probe.requested,
                });
            }
        }
        outcomes
    }

    /// Drops the probes started by a window that went away.
    pub fn cancel_for_window<H>(&mut self, host: &mut H, window: WindowId) -> usize
    where
        H: RenderHost + ?Sized,
    {
        let cancelled: Vec<SurfaceId> = self
            .probes
            .iter()
            .filter(|(_, probe)| probe.origin == window)
            .map(|(surface, _)| *surface)
            .collect();

        for surface in &cancelled {
            self.probes.remove(surface);
            destroy(host, *surface);
        }
        if !cancelled.is_empty() {
            debug!(%window, count = cancelled.len(), "probes cancelled");
        }
        cancelled.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.probes.values().map(|probe| probe.deadline).min()
    }
}

fn destroy<H>(host: &mut H, surface: SurfaceId)
where
    H: RenderHost + ?Sized,
{
    if !host.is_surface_alive(surface) {
        return;
    }
    if let Err(error) = host.destroy_surface(surface) {
        warn!(%surface, %error, "failed to destroy probe surface");
    }
}
