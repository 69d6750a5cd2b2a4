//! Message consumer
//!
//! The single thread draining the priority queue. Every popped message is
//! answered with `Received: <text>\n` on the session that sent it. Delivery
//! failures are logged and counted; nothing is retried or requeued. A write
//! that times out means the peer stopped reading, so that session is removed
//! from the registry and closed.

use std::io::ErrorKind;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::broker::engine::Broker;
use crate::broker::message::Message;
use crate::utils::ServerError;

const ACK_PREFIX: &[u8] = b"Received: ";

/// Builds the acknowledgement bytes for `message`.
pub fn acknowledgement(message: &Message) -> Vec<u8> {
    let mut ack = Vec::with_capacity(ACK_PREFIX.len() + message.text().len() + 1);
    ack.extend_from_slice(ACK_PREFIX);
    ack.extend_from_slice(message.text());
    ack.push(b'\n');
    ack
}

/// Counters reported by the consumer when it exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    /// Acknowledgements written successfully.
    pub delivered: u64,
    /// Acknowledgements whose write failed.
    pub failed: u64,
    /// Sessions closed because an acknowledgement write timed out.
    pub evicted: u64,
    /// Messages whose session was no longer registered.
    pub missed: u64,
}

impl ConsumerReport {
    pub fn consumed(&self) -> u64 {
        self.delivered + self.failed + self.missed
    }
}

pub struct Consumer {
    broker: Arc<Broker>,
}

impl Consumer {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }

    /// Starts the consumer on its own named thread.
    pub fn spawn(broker: Arc<Broker>) -> Result<JoinHandle<ConsumerReport>, ServerError> {
        let consumer = Self::new(broker);
        thread::Builder::new()
            .name("consumer".to_string())
            .spawn(move || consumer.run())
            .map_err(|source| ServerError::Spawn {
                name: "consumer".to_string(),
                source,
            })
    }

    /// Pops until the queue returns the terminal sentinel.
    pub fn run(&self) -> ConsumerReport {
        info!("consumer started");
        let mut report = ConsumerReport::default();

        while let Some(message) = self.broker.queue().pop() {
            self.deliver(&message, &mut report);
        }

        info!(
            delivered = report.delivered,
            failed = report.failed,
            evicted = report.evicted,
            missed = report.missed,
            "consumer exited"
        );
        report
    }

    fn deliver(&self, message: &Message, report: &mut ConsumerReport) {
        debug!("{message}");
        let session = message.session_id();

        // the registry lock is released before any I/O
        let Some(handle) = self.broker.registry().lookup(session) else {
            info!(%session, "client socket not found, dropping message");
            report.missed += 1;
            return;
        };

        match handle.send(&acknowledgement(message)) {
            Ok(()) => report.delivered += 1,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                warn!(%session, error = %e, "ack write timed out, closing session");
                report.failed += 1;
                // the worker's read then fails and it exits on its own
                if let Some(handle) = self.broker.registry().remove(session) {
                    handle.close();
                    report.evicted += 1;
                }
            }
            Err(e) => {
                warn!(%session, error = %e, "failed to send ack");
                report.failed += 1;
            }
        }
    }
}
