//! Acquisition controller: bring a session from uninitialized to capturing,
//! or fail cleanly so a later attempt can retry.
//!
//! # Handshake
//!
//! ```text
//! runtime installed? ──► connect (background app, shared) ──► device (shared)
//!   │
//!   ▼
//! compositor mirror texture (eye) ──► real size ──► crop geometry
//!   │
//!   ▼
//! staging texture (crop size, RGBA8, shared) ──► shared handle ──► host import
//!   │
//!   ▼
//! install → Ready
//! ```
//!
//! Each step holds what it acquired in a local; an early `?` drops those
//! locals in reverse order, so a failed attempt never leaves a partial set.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use vrmirror_core::geometry::CropParams;
use vrmirror_core::{compute_geometry, AcquireError, Eye, Geometry, LifecycleState, RetryPolicy};

use crate::gate::GatePermit;
use crate::platform::{
    ApplicationMode, GpuDevice, GpuTexture, GraphicsScope, HostGraphics, Platform,
    RuntimeConnection, TextureDesc, VrRuntime,
};
use crate::registry::RegistryInner;
use crate::session::{CaptureSession, HostTexture, SessionResources, SessionState};
use crate::shared::SharedConnection;

/// How an attempt is paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// No dwell: show, settings change, operator reset.
    Forced,
    /// Opportunistic retry from the tick path (short dwell).
    Tick,
    /// Coarse retry scheduled from the render path (long dwell).
    Background,
}

impl Pacing {
    fn dwell(self, policy: &RetryPolicy) -> Option<std::time::Duration> {
        match self {
            Self::Forced => None,
            Self::Tick => Some(policy.tick_dwell),
            Self::Background => Some(policy.background_dwell),
        }
    }
}

/// What a call to [`CaptureSession::attempt_acquire`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    AlreadyReady,
    /// This session already has an attempt in flight.
    InFlight,
    RateLimited,
    /// Another session's attempt (or a teardown) holds the admission gate.
    GateBusy,
    /// Handed to the background pool; watch `lifecycle()` for the result.
    Dispatched,
    /// Not attempted from the render path because attempts run inline; the
    /// tick path retries.
    Deferred,
    /// Ran inline and finished.
    Completed(Result<Geometry, AcquireError>),
}

impl AttemptOutcome {
    pub fn started(&self) -> bool {
        matches!(self, Self::Dispatched | Self::Completed(_))
    }
}

struct AttemptRequest {
    name:   Arc<str>,
    params: CropParams,
}

impl<P: Platform> CaptureSession<P> {
    /// Start an acquisition attempt unless one is pointless or not allowed.
    ///
    /// Rejected without side effects when the session is already capturing,
    /// already acquiring, inside its dwell window, or when any other attempt
    /// holds the process-wide gate.
    pub fn attempt_acquire(&self, pacing: Pacing) -> AttemptOutcome {
        let registry = &self.registry.inner;
        let mut state = self.lock();

        match state.lifecycle {
            LifecycleState::Ready => return AttemptOutcome::AlreadyReady,
            LifecycleState::Acquiring => return AttemptOutcome::InFlight,
            LifecycleState::Uninitialized => {}
        }

        let now = Instant::now();
        if let Some(dwell) = pacing.dwell(&registry.policy) {
            let last = match pacing {
                Pacing::Background => state.last_background_attempt,
                _ => state.last_tick_attempt,
            };
            if last.is_some_and(|at| now.duration_since(at) < dwell) {
                return AttemptOutcome::RateLimited;
            }
        }

        let Some(permit) = registry.gate.try_enter(self.id) else {
            return AttemptOutcome::GateBusy;
        };

        match pacing {
            Pacing::Tick => state.last_tick_attempt = Some(now),
            Pacing::Background => state.last_background_attempt = Some(now),
            Pacing::Forced => {
                state.last_tick_attempt = Some(now);
                state.last_background_attempt = Some(now);
            }
        }
        state.lifecycle = LifecycleState::Acquiring;
        let request = AttemptRequest {
            name: Arc::clone(&self.name),
            params: state.settings.crop_params(),
        };
        drop(state);

        debug!("[{}] Acquisition attempt ({:?})", self.name, pacing);
        let job = AttemptJob { session: self.clone(), permit, request };
        match &registry.background {
            None => AttemptOutcome::Completed(job.run()),
            Some(handle) => {
                handle.spawn_blocking(move || {
                    let _ = job.run();
                });
                AttemptOutcome::Dispatched
            }
        }
    }

    /// Tear down everything this session holds. Idempotent, safe in any
    /// state; waits for an in-flight attempt to finish first.
    pub fn release(&self) {
        let _permit = self.registry.inner.gate.enter(self.id);

        let resources = {
            let mut state = self.lock();
            state.lifecycle = LifecycleState::Uninitialized;
            state.last_frame = 0;
            state.resources.take()
        };

        // Dropped outside the session lock: host teardown enters the host's
        // graphics context, which its render thread may be holding.
        if let Some(resources) = resources {
            let geometry = resources.geometry;
            drop(resources);
            info!("[{}] Released capture resources ({})", self.name, geometry);
        }
    }
}

// ── AttemptJob ────────────────────────────────────────────────────────────────

/// One admitted attempt. Owns the gate permit until it has written its
/// result back into the session.
struct AttemptJob<P: Platform> {
    session: CaptureSession<P>,
    permit:  GatePermit,
    request: AttemptRequest,
}

impl<P: Platform> AttemptJob<P> {
    fn run(self) -> Result<Geometry, AcquireError> {
        let AttemptJob { session, permit, request } = self;
        let mut guard = UnwindGuard { session: &session, armed: true };

        let result = handshake(&session.registry.inner, &request);

        let mut state = session.lock();
        guard.armed = false;
        let outcome = match result {
            Ok(resources) => {
                let geometry = resources.geometry;
                let previous = install(&mut state, resources);
                drop(state);
                drop(previous);
                info!("[{}] Capturing mirror texture {}", request.name, geometry);
                Ok(geometry)
            }
            Err(error) => {
                state.lifecycle = LifecycleState::Uninitialized;
                let repeated = state.last_error.as_ref() == Some(&error);
                state.last_error = Some(error.clone());
                drop(state);
                if repeated {
                    debug!("[{}] Acquisition failed again ({}): {}", request.name, error.stage(), error);
                } else {
                    warn!("[{}] Acquisition failed ({}): {}", request.name, error.stage(), error);
                }
                Err(error)
            }
        };

        drop(permit);
        outcome
    }
}

/// Resets a session stuck in `Acquiring` if the handshake panics.
struct UnwindGuard<'a, P: Platform> {
    session: &'a CaptureSession<P>,
    armed:   bool,
}

impl<P: Platform> Drop for UnwindGuard<'_, P> {
    fn drop(&mut self) {
        if self.armed {
            self.session.lock().lifecycle = LifecycleState::Uninitialized;
            warn!("[{}] Acquisition attempt aborted", self.session.name);
        }
    }
}

fn install<P: Platform>(
    state: &mut SessionState<P>,
    resources: SessionResources<P>,
) -> Option<SessionResources<P>> {
    state.lifecycle = LifecycleState::Ready;
    state.last_frame = 0;
    state.last_error = None;
    state.reported = Some(resources.geometry);
    state.resources.replace(resources)
}

// ── Handshake ─────────────────────────────────────────────────────────────────

fn handshake<P: Platform>(
    registry: &RegistryInner<P>,
    request: &AttemptRequest,
) -> Result<SessionResources<P>, AcquireError> {
    let platform = &registry.platform;
    let runtime = platform.runtime();
    let name = &request.name;
    let eye: Eye = request.params.eye;

    if !runtime.is_installed() {
        return Err(AcquireError::RuntimeUnavailable);
    }

    let connection = registry
        .connections
        .lease(|| runtime.connect(ApplicationMode::Background).map(SharedConnection::new))
        .map_err(|e| AcquireError::RuntimeInitFailed { reason: e.into_reason() })?;
    // Latched quit: the pooled connection dies with the runtime.
    if connection.is_quitting() {
        return Err(AcquireError::RuntimeInitFailed { reason: "runtime quitting".into() });
    }
    debug!("[{}] Runtime connected", name);

    let device = registry
        .devices
        .lease(|| platform.create_device())
        .map_err(|e| AcquireError::DeviceCreateFailed { reason: e.into_reason() })?;

    if !connection.has_compositor() {
        return Err(AcquireError::CompositorUnavailable);
    }

    let mirror = connection
        .mirror_texture(eye, &*device)
        .map_err(|e| AcquireError::MirrorTextureFailed { eye, reason: e.into_reason() })?
        .ok_or_else(|| AcquireError::MirrorTextureFailed {
            eye,
            reason: "compositor returned no texture".into(),
        })?;

    let device_size = mirror.size();
    if device_size.is_empty() {
        return Err(AcquireError::InvalidMirrorTexture { size: device_size });
    }
    debug!("[{}] Mirror texture {} ({} eye)", name, device_size, eye);

    let geometry = compute_geometry(device_size, &request.params);
    let crop_size = geometry.crop.size();
    if crop_size.is_empty() {
        return Err(AcquireError::StagingAllocFailed {
            size: crop_size,
            reason: "crop region is empty".into(),
        });
    }

    let staging = device
        .create_texture(&TextureDesc::shared_rgba(crop_size))
        .map_err(|e| AcquireError::StagingAllocFailed { size: crop_size, reason: e.into_reason() })?;

    let handle = staging
        .export_shared_handle()
        .map_err(|e| AcquireError::HandleExportFailed { reason: e.into_reason() })?;

    let host = platform.host();
    let drawable = {
        let _scope = GraphicsScope::enter(host);
        host.import_shared_texture(handle)
    }
    .ok_or(AcquireError::HostImportFailed)?;

    Ok(SessionResources {
        drawable: HostTexture::new(Arc::clone(platform), drawable),
        staging,
        mirror,
        device,
        connection,
        geometry,
    })
}
