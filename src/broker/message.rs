//! Message definitions for the broker
//!
//! `Message` is the unit of work a session worker hands to the queue. It is
//! built once at ingestion time and then only moved, never mutated.
//!
//! Notes on fields:
//! - `session_id`: the session the acknowledgement goes back to
//! - `timestamp`: microseconds on a process-local monotonic clock; only used
//!   to order messages of equal priority, never as wall-clock time
//! - `text`: payload bytes with one trailing line terminator removed
//! - `priority`: higher is served first; every message currently uses
//!   `DEFAULT_PRIORITY`

use std::fmt;
use std::sync::OnceLock;
use std::time::Instant;

use crate::client::SessionId;

/// Priority given to every message of the current protocol.
pub const DEFAULT_PRIORITY: u32 = 1;

#[derive(Debug, PartialEq, Eq)]
pub struct Message {
    session_id: SessionId,
    timestamp: u64,
    text: Vec<u8>,
    priority: u32,
}

impl Message {
    pub fn new(session_id: SessionId, timestamp: u64, text: Vec<u8>, priority: u32) -> Self {
        Self {
            session_id,
            timestamp,
            text,
            priority,
        }
    }

    /// Builds a message stamped with the current monotonic time.
    pub fn stamped(session_id: SessionId, text: Vec<u8>) -> Self {
        Self::new(session_id, monotonic_micros(), text, DEFAULT_PRIORITY)
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn text(&self) -> &[u8] {
        &self.text
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}][{}][{}][{}]",
            self.session_id,
            self.timestamp,
            String::from_utf8_lossy(&self.text),
            self.priority
        )
    }
}

/// Microseconds elapsed since the first call in this process.
pub fn monotonic_micros() -> u64 {
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    ORIGIN.get_or_init(Instant::now).elapsed().as_micros() as u64
}
