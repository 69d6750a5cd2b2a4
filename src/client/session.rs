//! Session identity and the write half of a connection.
//!
//! The session worker owns the read half of a socket; everything else that
//! needs to reach the client (the consumer, the shutdown path) goes through a
//! shared `SessionHandle` looked up in the registry.

use std::fmt;
use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;

/// Identifier assigned at accept time from a monotonically increasing
/// counter. Never reused for the lifetime of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(n: u64) -> Self {
        Self(n)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Write side of a session.
pub trait Outbound: Send + Sync {
    /// Writes the whole buffer to the peer.
    fn send(&self, bytes: &[u8]) -> io::Result<()>;

    /// Closes the connection in both directions, waking a reader blocked on
    /// it. Errors are ignored: the peer may already be gone.
    fn close(&self);
}

impl Outbound for TcpStream {
    fn send(&self, bytes: &[u8]) -> io::Result<()> {
        let mut stream = self;
        stream.write_all(bytes)?;
        stream.flush()
    }

    fn close(&self) {
        let _ = self.shutdown(Shutdown::Both);
    }
}

pub type SessionHandle = Arc<dyn Outbound>;
