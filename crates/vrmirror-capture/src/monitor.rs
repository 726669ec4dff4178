//! Liveness monitor, driven by the host's periodic tick.

use tracing::info;
use vrmirror_core::LifecycleState;

use crate::controller::{AttemptOutcome, Pacing};
use crate::platform::Platform;
use crate::session::CaptureSession;

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Hidden and not capturing.
    Idle,
    Capturing,
    /// The runtime is shutting down; resources were released.
    QuitObserved,
    Attempted(AttemptOutcome),
}

impl<P: Platform> CaptureSession<P> {
    pub fn tick(&self, visible: bool) -> TickOutcome {
        let quit = {
            let mut state = self.lock();
            state.visible = visible;
            match (state.lifecycle, state.resources.as_ref()) {
                (LifecycleState::Ready, Some(resources)) => {
                    Some(resources.connection.poll_quit::<P::Device>())
                }
                _ => None,
            }
        };

        match quit {
            Some(true) => {
                info!("[{}] VR runtime is quitting, releasing capture", self.name);
                self.release();
                TickOutcome::QuitObserved
            }
            Some(false) => TickOutcome::Capturing,
            None if visible => TickOutcome::Attempted(self.attempt_acquire(Pacing::Tick)),
            None => TickOutcome::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::mock_registry;
    use crate::registry::Dispatch;
    use std::sync::atomic::Ordering;
    use vrmirror_core::{AcquireError, CaptureSettings};

    #[test]
    fn visible_tick_acquires() {
        let registry = mock_registry(Dispatch::Inline);
        let s = CaptureSession::new(&registry, "mirror", CaptureSettings::default());

        assert!(matches!(s.tick(true), TickOutcome::Attempted(AttemptOutcome::Completed(Ok(_)))));
        assert_eq!(s.lifecycle(), LifecycleState::Ready);
        assert_eq!(s.tick(true), TickOutcome::Capturing);
    }

    #[test]
    fn hidden_tick_does_not_acquire() {
        let registry = mock_registry(Dispatch::Inline);
        let s = CaptureSession::new(&registry, "mirror", CaptureSettings::default());
        assert_eq!(s.tick(false), TickOutcome::Idle);
        assert_eq!(registry.platform().rec.connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn quit_event_tears_down() {
        let registry = mock_registry(Dispatch::Inline);
        let rec = &registry.platform().rec;
        let s = CaptureSession::new(&registry, "mirror", CaptureSettings::default());
        s.tick(true);
        rec.pending_quit.store(true, Ordering::SeqCst);

        assert_eq!(s.tick(true), TickOutcome::QuitObserved);
        assert_eq!(s.lifecycle(), LifecycleState::Uninitialized);
        assert_eq!(rec.destroys.load(Ordering::SeqCst), 1);
        assert_eq!(rec.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(rec.unscoped_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn quit_reaches_every_session_on_the_connection() {
        let registry = mock_registry(Dispatch::Inline);
        let rec = &registry.platform().rec;
        let a = CaptureSession::new(&registry, "left", CaptureSettings { righteye: false, ..Default::default() });
        let b = CaptureSession::new(&registry, "right", CaptureSettings::default());
        a.tick(true);
        b.tick(true);
        rec.pending_quit.store(true, Ordering::SeqCst);

        assert_eq!(a.tick(true), TickOutcome::QuitObserved);
        assert_eq!(b.tick(true), TickOutcome::QuitObserved);
        assert_eq!(rec.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(registry.connection_leases(), 0);
    }

    #[test]
    fn quitting_connection_is_not_reused() {
        let registry = mock_registry(Dispatch::Inline);
        let rec = &registry.platform().rec;
        let a = CaptureSession::new(&registry, "left", CaptureSettings { righteye: false, ..Default::default() });
        let b = CaptureSession::new(&registry, "right", CaptureSettings::default());
        a.tick(true);
        b.tick(true);
        rec.pending_quit.store(true, Ordering::SeqCst);
        assert_eq!(a.tick(true), TickOutcome::QuitObserved);

        // b still holds the latched connection.
        assert!(matches!(
            a.attempt_acquire(Pacing::Forced),
            AttemptOutcome::Completed(Err(AcquireError::RuntimeInitFailed { ref reason })) if reason == "runtime quitting"
        ));
        assert_eq!(a.lifecycle(), LifecycleState::Uninitialized);
        assert_eq!(rec.connects.load(Ordering::SeqCst), 1);
        assert_eq!(registry.connection_leases(), 1);

        assert_eq!(b.tick(true), TickOutcome::QuitObserved);
        assert_eq!(rec.disconnects.load(Ordering::SeqCst), 1);
        assert!(a.attempt_acquire(Pacing::Forced).started());
        assert_eq!(a.lifecycle(), LifecycleState::Ready);
        assert_eq!(rec.connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn hidden_session_keeps_capturing_until_released() {
        let registry = mock_registry(Dispatch::Inline);
        let s = CaptureSession::new(&registry, "mirror", CaptureSettings::default());
        s.tick(true);
        assert_eq!(s.tick(false), TickOutcome::Capturing);
        assert!(!s.is_visible());
    }
}
