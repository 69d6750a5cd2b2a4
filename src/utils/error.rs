//! The `error` module defines the startup-fatal error type of the server.
//!
//! Everything that goes wrong after the listener is up is handled locally by
//! the component that saw it (a session ends, a message is dropped), so only
//! setup failures travel up to the caller.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to configure listener: {0}")]
    Listener(#[source] io::Error),

    #[error("failed to spawn thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}
