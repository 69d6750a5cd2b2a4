//! Session worker
//!
//! One thread per accepted connection. The worker owns the read half of the
//! socket, turns what it reads into `Message`s and pushes them to the queue.
//! Whatever ends the loop, the session is deregistered and its handle closed
//! before the thread exits; nothing else in the server is affected.

use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, trace, warn};

use crate::broker::{Broker, Message};
use crate::client::SessionId;
use crate::config::Framing;
use crate::transport::framing::{Frame, FrameReader, ReadFault};

/// Why a session worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed the connection.
    Disconnected,
    /// A non-retryable read error.
    Failed(ErrorKind),
    /// The server stopped running.
    Shutdown,
}

pub struct SessionWorker<R> {
    id: SessionId,
    frames: FrameReader<R>,
    broker: Arc<Broker>,
}

impl<R: Read> SessionWorker<R> {
    pub fn new(
        id: SessionId,
        reader: R,
        framing: Framing,
        buffer_size: usize,
        broker: Arc<Broker>,
    ) -> Self {
        Self {
            id,
            frames: FrameReader::new(reader, framing, buffer_size),
            broker,
        }
    }

    /// Caps the length of a line under `Framing::Line`.
    pub fn with_max_line_bytes(mut self, max: usize) -> Self {
        self.frames = self.frames.with_max_line_bytes(max);
        self
    }

    pub fn run(mut self) -> SessionEnd {
        debug!(session = %self.id, "worker started");
        let end = self.read_loop();

        if let Some(handle) = self.broker.registry().remove(self.id) {
            handle.close();
        }
        info!(session = %self.id, ?end, "worker exited");
        end
    }

    fn read_loop(&mut self) -> SessionEnd {
        while self.broker.is_running() {
            match self.frames.next_frame() {
                Ok(Frame::Message(text)) => {
                    trace!(session = %self.id, bytes = text.len(), "message read");
                    self.broker.queue().push(Message::stamped(self.id, text));
                }
                Ok(Frame::Closed) => {
                    info!(session = %self.id, "client disconnected");
                    return SessionEnd::Disconnected;
                }
                Err(ReadFault::Retryable(e)) => {
                    trace!(session = %self.id, error = %e, "retrying read");
                }
                Err(ReadFault::Fatal(e)) => {
                    warn!(session = %self.id, error = %e, "read error");
                    return SessionEnd::Failed(e.kind());
                }
            }
        }
        SessionEnd::Shutdown
    }
}

impl<R: Read + Send + 'static> SessionWorker<R> {
    /// Runs the worker on a thread named after the session.
    pub fn spawn(self) -> std::io::Result<JoinHandle<SessionEnd>> {
        thread::Builder::new()
            .name(format!("session-{}", self.id.get()))
            .spawn(move || self.run())
    }
}
