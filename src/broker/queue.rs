//! Priority message queue
//!
//! The synchronization core of the server: any number of session workers
//! push, exactly one consumer pops.
//!
//! Ordering is total: priority descending, then timestamp ascending, then
//! insertion order. One mutex guards the heap together with the shutdown
//! flag, so a popper always sees both in a consistent state, and the
//! condition variable is re-checked after every wakeup.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::broker::message::Message;

#[derive(Debug)]
struct Entry {
    message: Message,
    seq: u64,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.message
            .priority()
            .cmp(&other.message.priority())
            .then_with(|| other.message.timestamp().cmp(&self.message.timestamp()))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

#[derive(Debug, Default)]
struct State {
    heap: BinaryHeap<Entry>,
    shutdown: bool,
    next_seq: u64,
    discarded: u64,
}

#[derive(Debug, Default)]
pub struct PriorityQueue {
    state: Mutex<State>,
    ready: Condvar,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a message and wakes one blocked popper.
    ///
    /// Once the queue is shut down the message is dropped without telling
    /// the caller; only `discarded()` records it.
    pub fn push(&self, message: Message) {
        {
            let mut state = self.state();
            if state.shutdown {
                state.discarded += 1;
                debug!(session = %message.session_id(), "queue shut down, message discarded");
                return;
            }
            let seq = state.next_seq;
            state.next_seq += 1;
            state.heap.push(Entry { message, seq });
        }
        self.ready.notify_one();
    }

    /// Blocks until a message is available or the queue is shut down.
    ///
    /// Messages still queued at shutdown are handed out first; `None` is
    /// returned once the queue is shut down and empty, and on every call
    /// after that.
    pub fn pop(&self) -> Option<Message> {
        let state = self.state();
        let mut state = self
            .ready
            .wait_while(state, |s| s.heap.is_empty() && !s.shutdown)
            .unwrap_or_else(PoisonError::into_inner);
        state.heap.pop().map(|entry| entry.message)
    }

    /// Snapshot of the number of queued messages. Stale as soon as it
    /// returns; for diagnostics only.
    pub fn size(&self) -> usize {
        self.state().heap.len()
    }

    /// Stops accepting messages and wakes every blocked popper. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut state = self.state();
            state.shutdown = true;
        }
        self.ready.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.state().shutdown
    }

    /// Number of pushes dropped because the queue was shut down.
    pub fn discarded(&self) -> u64 {
        self.state().discarded
    }
}
