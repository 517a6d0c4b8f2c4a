use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use log::debug;

/// Process-wide bookkeeping of client sessions.
///
/// Hands out session ids (monotonic, never reused) and tracks how many sessions are
/// currently open. Both counters are atomics; nothing here takes a lock.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: AtomicUsize,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a new session and returns the guard that keeps it counted.
    ///
    /// The active count goes back down when the guard is dropped, so every exit path
    /// of a session (clean close, `exit`, I/O error, panic unwinding) decrements it
    /// exactly once.
    pub fn open_session(self: &Arc<Self>, remote_addr: SocketAddr) -> SessionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let active = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("Session #{} opened for {} ({} active)", id, remote_addr, active);

        SessionGuard {
            id,
            remote_addr,
            registry: Arc::clone(self),
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

/// Proof of one registered, still-active session.
#[derive(Debug)]
pub struct SessionGuard {
    id: u64,
    remote_addr: SocketAddr,
    registry: Arc<SessionRegistry>,
}

impl SessionGuard {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let left = self.registry.active.fetch_sub(1, Ordering::AcqRel) - 1;
        debug!("Session #{} released ({} active)", self.id, left);
    }
}
