//! The `transport` module is responsible for the network side of the
//! server: accepting TCP connections, turning each session's byte stream
//! into messages, and running the server from bind to shutdown.

pub mod acceptor;
pub mod framing;
pub mod server;
pub mod worker;

pub use acceptor::{AcceptReport, Acceptor, WorkerSet};
pub use framing::{Frame, FrameReader, ReadFault};
pub use server::{Server, ServerReport};
pub use worker::{SessionEnd, SessionWorker};
