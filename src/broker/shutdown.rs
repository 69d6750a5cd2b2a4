//! Shutdown coordinator
//!
//! A cheap, cloneable handle that stops a running server: it clears the
//! running flag the acceptor polls and shuts the queue down so the consumer
//! wakes, drains what is left and exits.

use std::sync::Arc;

use tracing::info;

use crate::broker::engine::Broker;

#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    broker: Arc<Broker>,
}

impl ShutdownCoordinator {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }

    /// Requests shutdown. Safe to call any number of times from any thread.
    pub fn shutdown(&self) {
        if self.broker.stop() {
            info!(
                queued = self.broker.queue().size(),
                sessions = self.broker.registry().len(),
                "shutdown requested"
            );
        }
        self.broker.queue().shutdown();
    }

    pub fn is_shutdown(&self) -> bool {
        !self.broker.is_running()
    }
}
