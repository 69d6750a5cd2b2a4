//! Client registry
//!
//! Maps a `SessionId` to the handle used to reply to that session. Entries
//! are inserted by the acceptor, read by the consumer and removed by the
//! session worker when it exits.
//!
//! The registry has its own lock, separate from the message queue's, and the
//! two are never held at the same time. Lookups clone the handle out so no
//! network I/O ever happens while the lock is held.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::client::session::{SessionHandle, SessionId};

#[derive(Default)]
pub struct ClientRegistry {
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a session. Ids are never reused, so an existing entry is
    /// simply replaced.
    pub fn insert(&self, id: SessionId, handle: SessionHandle) {
        self.sessions().insert(id, handle);
    }

    /// Returns the handle for `id`, or `None` once the session is gone.
    pub fn lookup(&self, id: SessionId) -> Option<SessionHandle> {
        self.sessions().get(&id).cloned()
    }

    /// Deregisters a session, handing back its handle so the caller can
    /// close it outside the lock.
    pub fn remove(&self, id: SessionId) -> Option<SessionHandle> {
        self.sessions().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    /// Closes every registered session and returns how many there were.
    ///
    /// Entries stay registered; each worker removes its own entry once its
    /// blocked read returns.
    pub fn close_all(&self) -> usize {
        let handles: Vec<SessionHandle> = self.sessions().values().cloned().collect();
        for handle in &handles {
            handle.close();
        }
        handles.len()
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("sessions", &self.len())
            .finish()
    }
}
