//! Render bridge: per-frame GPU copy of the crop region and hand-off to the
//! host's draw primitive. Never touches pixels on the CPU.

use tracing::trace;
use vrmirror_core::LifecycleState;

use crate::controller::{AttemptOutcome, Pacing};
use crate::platform::{GpuDevice, HostGraphics, Platform, RuntimeConnection};
use crate::session::CaptureSession;

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Hidden,
    /// Nothing to draw; a coarse background attempt may have been scheduled.
    /// The handshake itself never runs on the render thread.
    NotReady(AttemptOutcome),
    /// Drawn. `copied` is false when the compositor had not advanced (or
    /// frame timing was unavailable) and the previous crop was reused.
    Drawn { copied: bool },
}

impl<P: Platform> CaptureSession<P> {
    /// Called from the host's render callback, which already owns the
    /// graphics context.
    pub fn render_frame(&self) -> FrameOutcome {
        let mut guard = self.lock();
        if !guard.visible {
            return FrameOutcome::Hidden;
        }
        if guard.lifecycle != LifecycleState::Ready {
            drop(guard);
            if self.registry.is_inline() {
                return FrameOutcome::NotReady(AttemptOutcome::Deferred);
            }
            return FrameOutcome::NotReady(self.attempt_acquire(Pacing::Background));
        }

        let state = &mut *guard;
        let Some(resources) = state.resources.as_ref() else {
            return FrameOutcome::NotReady(AttemptOutcome::AlreadyReady);
        };

        let mut copied = false;
        if let Some(index) = resources.connection.frame_index() {
            if index != state.last_frame {
                resources.device.copy_region(&resources.staging, &resources.mirror, resources.geometry.crop);
                resources.device.flush();
                trace!("[{}] Frame {} copied ({})", self.name, index, resources.geometry.crop.size());
                state.last_frame = index;
                state.copies += 1;
                copied = true;
            }
        }

        if let Some(drawable) = resources.drawable.drawable() {
            self.registry.platform().host().draw_opaque(drawable);
        }
        FrameOutcome::Drawn { copied }
    }
}
