//! Process-wide shared resources: the graphics device and the runtime
//! connection.
//!
//! Both are expensive to create and only one of each may exist per process,
//! so sessions lease them from a [`SharedPool`]. The pool keeps an explicit
//! lease count; the last lease to drop takes the resource out of the pool and
//! destroys it. A count that does not add up is logged, never fatal.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::platform::{GpuDevice, RuntimeConnection, RuntimeEvent};

struct PoolEntry<T> {
    value:  Arc<T>,
    leases: usize,
}

pub struct SharedPool<T> {
    label: &'static str,
    slot:  Mutex<Option<PoolEntry<T>>>,
}

impl<T: Send + Sync + 'static> SharedPool<T> {
    pub fn new(label: &'static str) -> Arc<Self> {
        Arc::new(Self { label, slot: Mutex::new(None) })
    }

    /// Lease the pooled value, creating it with `create` if none is live.
    pub fn lease<E>(
        self: &Arc<Self>,
        create: impl FnOnce() -> Result<T, E>,
    ) -> Result<Lease<T>, E> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let value = match slot.as_mut() {
            Some(entry) => {
                entry.leases += 1;
                debug!("Shared {} reused ({} leases)", self.label, entry.leases);
                Arc::clone(&entry.value)
            }
            None => {
                let value = Arc::new(create()?);
                *slot = Some(PoolEntry { value: Arc::clone(&value), leases: 1 });
                info!("Shared {} created", self.label);
                value
            }
        };
        Ok(Lease { pool: Arc::clone(self), value })
    }

    pub fn outstanding(&self) -> usize {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, |entry| entry.leases)
    }

    fn give_back(&self, value: Arc<T>) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let retired = match slot.as_mut() {
            Some(entry) if Arc::ptr_eq(&entry.value, &value) => {
                if entry.leases == 0 {
                    warn!("Shared {} refcount mismatch: lease returned with zero count", self.label);
                    None
                } else {
                    entry.leases -= 1;
                    if entry.leases == 0 { slot.take() } else { None }
                }
            }
            _ => {
                warn!("Shared {} refcount mismatch: lease outlived its pool entry", self.label);
                None
            }
        };
        drop(slot);
        drop(value);
        if retired.is_some() {
            info!("Shared {} destroyed (last lease released)", self.label);
        }
    }
}

/// One session's share of a pooled value.
pub struct Lease<T: Send + Sync + 'static> {
    pool:  Arc<SharedPool<T>>,
    value: Arc<T>,
}

impl<T: Send + Sync + 'static> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Send + Sync + 'static> Drop for Lease<T> {
    fn drop(&mut self) {
        self.pool.give_back(Arc::clone(&self.value));
    }
}

// ── SharedConnection ──────────────────────────────────────────────────────────

/// Runtime connection shared by every capturing session.
///
/// A quit event is consumed by whichever session polls it first, so it is
/// latched here: every session sharing the connection sees it.
pub struct SharedConnection<C> {
    inner: C,
    quit:  AtomicBool,
}

impl<C> SharedConnection<C> {
    pub fn new(inner: C) -> Self {
        Self { inner, quit: AtomicBool::new(false) }
    }

    /// True once any session has seen a quit on this connection.
    pub fn is_quitting(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }

    /// Poll one runtime event; true once a quit has been seen.
    pub fn poll_quit<D: GpuDevice>(&self) -> bool
    where
        C: RuntimeConnection<D>,
    {
        if self.is_quitting() {
            return true;
        }
        match self.inner.poll_next_event() {
            Some(RuntimeEvent::Quit) => {
                self.quit.store(true, Ordering::Release);
                true
            }
            Some(RuntimeEvent::Other(kind)) => {
                debug!("Ignoring runtime event {}", kind);
                false
            }
            None => false,
        }
    }
}

impl<C> Deref for SharedConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Tracked(Arc<AtomicUsize>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn last_lease_destroys_value() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let pool = SharedPool::new("device");
        let mut created = 0;

        let a = pool
            .lease(|| -> Result<_, ()> { created += 1; Ok(Tracked(Arc::clone(&destroyed))) })
            .expect("first lease");
        let b = pool
            .lease(|| -> Result<_, ()> { created += 1; Ok(Tracked(Arc::clone(&destroyed))) })
            .expect("second lease");
        assert_eq!(created, 1);
        assert_eq!(pool.outstanding(), 2);

        drop(a);
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
        drop(b);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn failed_creation_leaves_pool_empty() {
        let pool: Arc<SharedPool<u32>> = SharedPool::new("device");
        let err = pool.lease(|| Err("no adapter")).err();
        assert_eq!(err, Some("no adapter"));
        assert_eq!(pool.outstanding(), 0);
        assert!(pool.lease(|| Ok::<_, ()>(7)).is_ok());
    }
}
