//! `MirrorSource`: the host-facing source instance.
//!
//! Maps the host's lifecycle callbacks (create, update, show, hide, tick,
//! render, destroy) onto one [`CaptureSession`].

use std::time::Instant;

use tracing::{debug, info};
use vrmirror_core::{CaptureSettings, LifecycleState, SessionStatus, TextureSize};

use crate::bridge::FrameOutcome;
use crate::controller::{AttemptOutcome, Pacing};
use crate::monitor::TickOutcome;
use crate::platform::Platform;
use crate::registry::CaptureRegistry;
use crate::session::CaptureSession;

pub struct MirrorSource<P: Platform> {
    session: CaptureSession<P>,
}

impl<P: Platform> MirrorSource<P> {
    pub fn create(registry: &CaptureRegistry<P>, name: impl Into<String>, settings: CaptureSettings) -> Self {
        let session = CaptureSession::new(registry, name, settings);
        info!(
            "[{}] Source created (session {}, {} eye)",
            session.name(),
            session.id(),
            session.settings().eye()
        );
        Self { session }
    }

    pub fn session(&self) -> &CaptureSession<P> {
        &self.session
    }

    /// Apply new settings. A capturing (or acquiring) source is torn down and
    /// re-acquired immediately with the new geometry.
    pub fn update(&self, settings: CaptureSettings) -> Option<AttemptOutcome> {
        let active = self.session.lifecycle() != LifecycleState::Uninitialized;
        self.session.replace_settings(settings);
        if !active {
            return None;
        }
        debug!("[{}] Settings changed, re-acquiring", self.session.name());
        self.session.release();
        Some(self.session.attempt_acquire(Pacing::Forced))
    }

    pub fn show(&self) -> AttemptOutcome {
        self.session.set_visible(true);
        self.session.attempt_acquire(Pacing::Forced)
    }

    pub fn hide(&self) {
        self.session.set_visible(false);
        self.session.release();
    }

    pub fn tick(&self, visible: bool) -> TickOutcome {
        self.session.tick(visible)
    }

    pub fn render(&self) -> FrameOutcome {
        self.session.render_frame()
    }

    pub fn width(&self) -> u32 {
        self.session.reported_size().width
    }

    pub fn height(&self) -> u32 {
        self.session.reported_size().height
    }

    pub fn size(&self) -> TextureSize {
        self.session.reported_size()
    }

    /// Operator reset: tear down and re-acquire, at most once per cooldown.
    /// Returns whether the reset ran.
    pub fn reset(&self) -> bool {
        let cooldown = self.session.registry.policy().reset_cooldown;
        let now = Instant::now();
        {
            let mut state = self.session.lock();
            if state.last_reset.is_some_and(|at| now.duration_since(at) < cooldown) {
                debug!("[{}] Reset ignored (cooldown)", self.session.name());
                return false;
            }
            state.last_reset = Some(now);
        }

        info!("[{}] Resetting capture", self.session.name());
        self.session.release();
        self.session.attempt_acquire(Pacing::Forced);
        true
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    /// Full teardown; equivalent to dropping the source.
    pub fn destroy(self) {}
}

impl<P: Platform> Drop for MirrorSource<P> {
    fn drop(&mut self) {
        self.session.release();
        info!("[{}] Source destroyed", self.session.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{mock_registry, MockPlatform};
    use crate::registry::Dispatch;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use vrmirror_core::{AcquireError, RetryPolicy};

    fn source(registry: &CaptureRegistry<MockPlatform>) -> MirrorSource<MockPlatform> {
        MirrorSource::create(registry, "OpenVR Capture", CaptureSettings::default())
    }

    #[test]
    fn size_is_zero_until_first_acquire() {
        let registry = mock_registry(Dispatch::Inline);
        let src = source(&registry);
        assert_eq!((src.width(), src.height()), (0, 0));

        assert!(src.show().started());
        assert_eq!((src.width(), src.height()), (1920, 1080));

        src.hide();
        assert_eq!(src.session().lifecycle(), LifecycleState::Uninitialized);
        assert_eq!((src.width(), src.height()), (1920, 1080));
    }

    #[test]
    fn show_ignores_dwell() {
        let registry = mock_registry(Dispatch::Inline);
        registry.platform().rec.installed.store(false, Ordering::SeqCst);
        let src = source(&registry);

        assert!(src.show().started());
        assert!(src.show().started());
        assert!(matches!(src.status(), SessionStatus::Failed { error: AcquireError::RuntimeUnavailable }));
    }

    #[test]
    fn update_while_capturing_reacquires_with_new_geometry() {
        let registry = mock_registry(Dispatch::Inline);
        let rec = &registry.platform().rec;
        let src = source(&registry);
        src.show();

        let outcome = src.update(CaptureSettings { scale_factor: 2.0, ..CaptureSettings::default() });
        assert!(matches!(outcome, Some(AttemptOutcome::Completed(Ok(_)))));
        assert_eq!((src.width(), src.height()), (960, 540));
        assert_eq!(rec.destroys.load(Ordering::SeqCst), 1);
        assert_eq!(rec.textures_live.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn update_while_idle_only_stores() {
        let registry = mock_registry(Dispatch::Inline);
        let src = source(&registry);
        assert_eq!(src.update(CaptureSettings { righteye: false, ..CaptureSettings::default() }), None);
        assert!(!src.session().settings().righteye);
        assert_eq!(registry.platform().rec.connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn reset_respects_cooldown() {
        let policy = RetryPolicy { reset_cooldown: Duration::from_millis(30), ..RetryPolicy::default() };
        let registry = CaptureRegistry::with_policy(MockPlatform::new(), Dispatch::Inline, policy);
        let rec = &registry.platform().rec;
        let src = source(&registry);
        src.show();

        assert!(src.reset());
        assert!(!src.reset());
        assert_eq!(rec.destroys.load(Ordering::SeqCst), 1);
        assert_eq!(src.session().lifecycle(), LifecycleState::Ready);

        std::thread::sleep(Duration::from_millis(40));
        assert!(src.reset());
        assert_eq!(rec.destroys.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn destroy_releases_everything() {
        let registry = mock_registry(Dispatch::Inline);
        let rec = &registry.platform().rec;
        let src = source(&registry);
        src.show();
        src.destroy();

        assert_eq!(rec.textures_live.load(Ordering::SeqCst), 0);
        assert_eq!(rec.devices_live.load(Ordering::SeqCst), 0);
        assert_eq!(rec.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(rec.graphics_depth.load(Ordering::SeqCst), 0);
        registry.shutdown();
        assert_eq!(registry.device_leases(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn background_show_completes_off_thread() {
        let registry = mock_registry(Dispatch::current());
        let src = source(&registry);
        assert_eq!(src.show(), AttemptOutcome::Dispatched);

        let session = src.session().clone();
        tokio::task::spawn_blocking(move || {
            while !session.status().is_capturing() {
                std::thread::sleep(Duration::from_millis(1));
            }
        })
        .await
        .expect("poll task");

        src.session().set_visible(true);
        assert_eq!(src.render(), FrameOutcome::Drawn { copied: true });
        assert_eq!(src.tick(true), TickOutcome::Capturing);
    }
}
