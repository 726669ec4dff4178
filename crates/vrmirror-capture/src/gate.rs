//! Process-wide admission gate.
//!
//! Runtime connection and device creation are not reentrant, so at most one
//! acquisition attempt runs at a time across every session. Teardown enters
//! the same gate (blocking) so it never frees objects an in-flight attempt is
//! still writing.

use std::sync::{Arc, Condvar, Mutex, PoisonError};

use crate::SessionId;

#[derive(Debug, Default)]
pub struct AdmissionGate {
    holder:   Mutex<Option<SessionId>>,
    released: Condvar,
}

impl AdmissionGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Enter if free; `None` when another attempt or teardown holds the gate.
    pub fn try_enter(self: &Arc<Self>, session: SessionId) -> Option<GatePermit> {
        let mut holder = self.holder.lock().unwrap_or_else(PoisonError::into_inner);
        if holder.is_some() {
            return None;
        }
        *holder = Some(session);
        Some(GatePermit { gate: Arc::clone(self), session })
    }

    /// Wait until the gate is free, then enter.
    pub fn enter(self: &Arc<Self>, session: SessionId) -> GatePermit {
        let mut holder = self.holder.lock().unwrap_or_else(PoisonError::into_inner);
        while holder.is_some() {
            holder = self
                .released
                .wait(holder)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *holder = Some(session);
        GatePermit { gate: Arc::clone(self), session }
    }

    /// Session currently holding the gate, if any.
    pub fn holder(&self) -> Option<SessionId> {
        *self.holder.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof of admission. Dropping it reopens the gate.
#[derive(Debug)]
pub struct GatePermit {
    gate:    Arc<AdmissionGate>,
    session: SessionId,
}

impl GatePermit {
    pub fn session(&self) -> SessionId {
        self.session
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        let mut holder = self.gate.holder.lock().unwrap_or_else(PoisonError::into_inner);
        *holder = None;
        drop(holder);
        self.gate.released.notify_all();
    }
}
