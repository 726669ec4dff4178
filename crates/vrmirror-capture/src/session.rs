//! `CaptureSession`: one configured source instance and the GPU resources
//! it holds while capturing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use vrmirror_core::{
    AcquireError, CaptureSettings, Geometry, LifecycleState, SessionStatus, TextureSize,
};

use crate::platform::{ConnectionOf, DrawableOf, GraphicsScope, HostGraphics, Platform, TextureOf};
use crate::registry::CaptureRegistry;
use crate::shared::{Lease, SharedConnection};

// ── SessionId ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Used by the registry itself when it takes the gate on shutdown.
    pub const REGISTRY: Self = Self(0);
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── HostTexture ───────────────────────────────────────────────────────────────

/// Host-side drawable. Destroyed inside a graphics bracket on drop.
pub(crate) struct HostTexture<P: Platform> {
    platform: Arc<P>,
    drawable: Option<DrawableOf<P>>,
}

impl<P: Platform> HostTexture<P> {
    pub(crate) fn new(platform: Arc<P>, drawable: DrawableOf<P>) -> Self {
        Self { platform, drawable: Some(drawable) }
    }

    pub(crate) fn drawable(&self) -> Option<&DrawableOf<P>> {
        self.drawable.as_ref()
    }
}

impl<P: Platform> Drop for HostTexture<P> {
    fn drop(&mut self) {
        if let Some(drawable) = self.drawable.take() {
            let host = self.platform.host();
            let _scope = GraphicsScope::enter(host);
            host.destroy_texture(drawable);
        }
    }
}

// ── SessionResources ──────────────────────────────────────────────────────────

/// Everything one successful handshake produced. Held as a unit so teardown
/// is all-or-nothing.
///
/// Fields drop in declaration order, which is the reverse of acquisition:
/// host drawable, staging texture, mirror texture, device, connection.
pub(crate) struct SessionResources<P: Platform> {
    pub(crate) drawable:   HostTexture<P>,
    pub(crate) staging:    TextureOf<P>,
    pub(crate) mirror:     TextureOf<P>,
    pub(crate) device:     Lease<P::Device>,
    pub(crate) connection: Lease<SharedConnection<ConnectionOf<P>>>,
    pub(crate) geometry:   Geometry,
}

// ── SessionState ──────────────────────────────────────────────────────────────

pub(crate) struct SessionState<P: Platform> {
    pub(crate) settings:                CaptureSettings,
    pub(crate) lifecycle:               LifecycleState,
    pub(crate) visible:                 bool,
    pub(crate) resources:               Option<SessionResources<P>>,
    pub(crate) last_frame:              u32,
    pub(crate) last_tick_attempt:       Option<Instant>,
    pub(crate) last_background_attempt: Option<Instant>,
    pub(crate) last_error:              Option<AcquireError>,
    pub(crate) last_reset:              Option<Instant>,
    pub(crate) copies:                  u64,
    /// Geometry of the most recent successful acquisition; survives teardown.
    pub(crate) reported:                Option<Geometry>,
}

impl<P: Platform> SessionState<P> {
    fn new(settings: CaptureSettings) -> Self {
        Self {
            settings,
            lifecycle: LifecycleState::Uninitialized,
            visible: false,
            resources: None,
            last_frame: 0,
            last_tick_attempt: None,
            last_background_attempt: None,
            last_error: None,
            last_reset: None,
            copies: 0,
            reported: None,
        }
    }

    /// Crop geometry; only meaningful while capturing.
    pub(crate) fn geometry(&self) -> Option<Geometry> {
        match (self.lifecycle, &self.resources) {
            (LifecycleState::Ready, Some(resources)) => Some(resources.geometry),
            _ => None,
        }
    }
}

// ── CaptureSession ────────────────────────────────────────────────────────────

/// Handle to one capture session. Cheap to clone; clones share state.
pub struct CaptureSession<P: Platform> {
    pub(crate) id:       SessionId,
    pub(crate) name:     Arc<str>,
    pub(crate) registry: CaptureRegistry<P>,
    pub(crate) state:    Arc<Mutex<SessionState<P>>>,
}

impl<P: Platform> Clone for CaptureSession<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: Arc::clone(&self.name),
            registry: self.registry.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<P: Platform> CaptureSession<P> {
    pub fn new(registry: &CaptureRegistry<P>, name: impl Into<String>, settings: CaptureSettings) -> Self {
        let name: String = name.into();
        Self {
            id: registry.next_session_id(),
            name: Arc::from(name),
            registry: registry.clone(),
            state: Arc::new(Mutex::new(SessionState::new(settings.sanitized()))),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.lock().lifecycle
    }

    pub fn is_visible(&self) -> bool {
        self.lock().visible
    }

    pub fn set_visible(&self, visible: bool) {
        self.lock().visible = visible;
    }

    pub fn settings(&self) -> CaptureSettings {
        self.lock().settings.clone()
    }

    pub(crate) fn replace_settings(&self, settings: CaptureSettings) {
        self.lock().settings = settings.sanitized();
    }

    pub fn geometry(&self) -> Option<Geometry> {
        self.lock().geometry()
    }

    /// Output size reported to the host: the last acquired crop, or 0×0.
    pub fn reported_size(&self) -> TextureSize {
        self.lock().reported.map_or(TextureSize::default(), |g| g.crop.size())
    }

    pub fn last_error(&self) -> Option<AcquireError> {
        self.lock().last_error.clone()
    }

    pub fn last_presented_frame(&self) -> u32 {
        self.lock().last_frame
    }

    /// GPU region copies issued since creation.
    pub fn copies(&self) -> u64 {
        self.lock().copies
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.lock();
        match (state.lifecycle, state.geometry(), &state.last_error) {
            (LifecycleState::Acquiring, _, _) => SessionStatus::Acquiring,
            (LifecycleState::Ready, Some(geometry), _) => SessionStatus::Capturing { geometry },
            (_, _, Some(error)) => SessionStatus::Failed { error: error.clone() },
            _ => SessionStatus::Idle,
        }
    }
}

impl<P: Platform> std::fmt::Debug for CaptureSession<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}
