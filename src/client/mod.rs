//! The `client` module defines how a connected client is represented and
//! found again when a reply has to be sent.
//!
//! It provides the `SessionId` of a connection, the `Outbound` write side the
//! consumer replies through, and the `ClientRegistry` mapping one to the other.

pub mod registry;
pub mod session;

pub use registry::ClientRegistry;
pub use session::{Outbound, SessionHandle, SessionId};

#[cfg(test)]
pub(crate) mod recorder;
