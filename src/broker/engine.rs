//! Broker engine
//!
//! `Broker` is the server context shared by every component: the priority
//! queue, the client registry, the running flag and the session id counter.
//! It is built once per server and passed around as `Arc<Broker>`, so
//! several independent servers can live in one process.
//!
//! Concurrency notes:
//! - The queue and the registry each carry their own lock; the broker itself
//!   needs none.
//! - Callers must never hold the registry lock while touching the queue or
//!   vice versa. Both APIs release their lock before returning, which makes
//!   this hold by construction.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::broker::queue::PriorityQueue;
use crate::client::{ClientRegistry, SessionId};

#[derive(Debug)]
pub struct Broker {
    queue: PriorityQueue,
    registry: ClientRegistry,
    running: AtomicBool,
    next_session: AtomicU64,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    pub fn new() -> Self {
        Self {
            queue: PriorityQueue::new(),
            registry: ClientRegistry::new(),
            running: AtomicBool::new(true),
            next_session: AtomicU64::new(0),
        }
    }

    pub fn queue(&self) -> &PriorityQueue {
        &self.queue
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clears the running flag, returning whether it was still set.
    pub(crate) fn stop(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }

    /// Allocates the next session id. Ids start at zero and are never reused.
    pub fn next_session_id(&self) -> SessionId {
        SessionId::new(self.next_session.fetch_add(1, Ordering::Relaxed))
    }
}
