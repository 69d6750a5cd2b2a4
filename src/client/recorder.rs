//! In-memory `Outbound` used by tests in place of a socket.

use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::client::Outbound;

#[derive(Default)]
pub struct Recorder {
    sent: Mutex<Vec<u8>>,
    closed: AtomicBool,
    failing: bool,
    stalled: bool,
}

impl Recorder {
    /// A recorder whose every `send` fails with `BrokenPipe`.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// A recorder whose every `send` times out, like a peer that stopped
    /// reading.
    pub fn stalled() -> Self {
        Self {
            stalled: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> String {
        String::from_utf8_lossy(&self.sent.lock().unwrap()).into_owned()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Outbound for Recorder {
    fn send(&self, bytes: &[u8]) -> io::Result<()> {
        if self.stalled {
            return Err(io::Error::from(io::ErrorKind::TimedOut));
        }
        if self.failing || self.is_closed() {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        self.sent.lock().unwrap().extend_from_slice(bytes);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
