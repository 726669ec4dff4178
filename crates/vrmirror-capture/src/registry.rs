//! `CaptureRegistry`: process-wide state shared by every capture session.
//!
//! Owns the admission gate, the shared device and runtime connection pools,
//! the platform collaborators, and the dispatch mode for acquisition
//! attempts. A host creates one registry when its module loads and calls
//! [`CaptureRegistry::shutdown`] before unloading.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{info, warn};
use vrmirror_core::RetryPolicy;

use crate::gate::AdmissionGate;
use crate::platform::{ConnectionOf, Platform};
use crate::shared::{SharedConnection, SharedPool};
use crate::SessionId;

/// Where acquisition attempts run.
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// On the tokio blocking pool; callers never wait for the handshake.
    Background(tokio::runtime::Handle),
    /// On a worker runtime owned by the registry, for hosts without one.
    Dedicated,
    /// On the calling thread, returning only when the attempt has finished.
    /// The render path never attempts under this mode; only tick and forced
    /// attempts run.
    Inline,
}

impl Dispatch {
    /// Background on the current tokio runtime if there is one, else on a
    /// registry-owned worker.
    pub fn current() -> Self {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => Self::Background(handle),
            Err(_) => Self::Dedicated,
        }
    }
}

/// Worker runtime owned by a registry created with [`Dispatch::Dedicated`].
struct Worker(Option<tokio::runtime::Runtime>);

impl Worker {
    fn start() -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(2)
            .thread_name("vrmirror-acquire")
            .enable_all()
            .build()?;
        Ok(Self(Some(runtime)))
    }

    fn handle(&self) -> Option<tokio::runtime::Handle> {
        self.0.as_ref().map(|runtime| runtime.handle().clone())
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // May run on an async thread or on the worker itself.
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

pub(crate) struct RegistryInner<P: Platform> {
    pub(crate) platform:    Arc<P>,
    pub(crate) gate:        Arc<AdmissionGate>,
    pub(crate) devices:     Arc<SharedPool<P::Device>>,
    pub(crate) connections: Arc<SharedPool<SharedConnection<ConnectionOf<P>>>>,
    /// Blocking pool for attempts; `None` runs them on the caller's thread.
    pub(crate) background:  Option<tokio::runtime::Handle>,
    pub(crate) policy:      RetryPolicy,
    next_id:                AtomicU64,
    _worker:                Option<Worker>,
}

pub struct CaptureRegistry<P: Platform> {
    pub(crate) inner: Arc<RegistryInner<P>>,
}

impl<P: Platform> Clone for CaptureRegistry<P> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<P: Platform> CaptureRegistry<P> {
    pub fn new(platform: P, dispatch: Dispatch) -> Self {
        Self::with_policy(platform, dispatch, RetryPolicy::default())
    }

    pub fn with_policy(platform: P, dispatch: Dispatch, policy: RetryPolicy) -> Self {
        let (background, worker) = match dispatch {
            Dispatch::Background(handle) => (Some(handle), None),
            Dispatch::Inline => (None, None),
            Dispatch::Dedicated => match Worker::start() {
                Ok(worker) => (worker.handle(), Some(worker)),
                Err(e) => {
                    warn!("Acquisition worker failed to start ({e}); attempts run inline");
                    (None, None)
                }
            },
        };
        info!(
            "Capture registry ready (dispatch={}, tick dwell={:?}, background dwell={:?})",
            match (&background, &worker) {
                (Some(_), Some(_)) => "dedicated",
                (Some(_), None) => "background",
                (None, _) => "inline",
            },
            policy.tick_dwell,
            policy.background_dwell,
        );
        Self {
            inner: Arc::new(RegistryInner {
                platform: Arc::new(platform),
                gate: AdmissionGate::new(),
                devices: SharedPool::new("graphics device"),
                connections: SharedPool::new("runtime connection"),
                background,
                policy,
                next_id: AtomicU64::new(1),
                _worker: worker,
            }),
        }
    }

    pub fn platform(&self) -> &P {
        &self.inner.platform
    }

    /// Whether attempts run on the caller's thread.
    pub fn is_inline(&self) -> bool {
        self.inner.background.is_none()
    }

    pub fn policy(&self) -> RetryPolicy {
        self.inner.policy
    }

    /// Session whose acquisition attempt (or teardown) is in flight.
    pub fn gate_holder(&self) -> Option<SessionId> {
        self.inner.gate.holder()
    }

    pub fn device_leases(&self) -> usize {
        self.inner.devices.outstanding()
    }

    pub fn connection_leases(&self) -> usize {
        self.inner.connections.outstanding()
    }

    pub(crate) fn next_session_id(&self) -> SessionId {
        SessionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Wait for any in-flight attempt, then report leftover shared resources.
    /// Sessions must be destroyed first; anything still leased is leaked
    /// until its session drops.
    pub fn shutdown(&self) {
        let _permit = self.inner.gate.enter(SessionId::REGISTRY);
        let devices = self.device_leases();
        let connections = self.connection_leases();
        if devices > 0 || connections > 0 {
            warn!(
                "Capture registry shut down with {} device and {} connection leases outstanding",
                devices, connections
            );
        } else {
            info!("Capture registry shut down cleanly");
        }
    }
}
