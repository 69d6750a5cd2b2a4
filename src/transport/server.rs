//! Server lifecycle
//!
//! `Server` binds the listener, owns the shared `Broker` context and drives
//! one complete run: start the consumer, accept until shutdown is requested,
//! drain the session workers, then wait for the consumer to empty the queue.
//!
//! Only setup failures are returned as errors. Once serving, every fault is
//! handled by the component that observed it.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::broker::{Broker, Consumer, ConsumerReport, ShutdownCoordinator};
use crate::config::Settings;
use crate::transport::acceptor::{AcceptReport, Acceptor};
use crate::utils::ServerError;

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerReport {
    pub accept: AcceptReport,
    pub consumer: ConsumerReport,
    /// Messages pushed after shutdown and dropped by the queue.
    pub discarded: u64,
}

pub struct Server {
    listener: TcpListener,
    broker: Arc<Broker>,
    settings: Settings,
}

impl Server {
    /// Binds `settings.server.host:port`.
    pub async fn bind(settings: Settings) -> Result<Self, ServerError> {
        let addr = settings.server.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        Ok(Self::from_listener(listener, settings))
    }

    /// Wraps an already bound listener; `settings.server.host/port` are
    /// ignored.
    pub fn from_listener(listener: TcpListener, settings: Settings) -> Self {
        Self {
            listener,
            broker: Arc::new(Broker::new()),
            settings,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::Listener)
    }

    pub fn broker(&self) -> Arc<Broker> {
        self.broker.clone()
    }

    pub fn coordinator(&self) -> ShutdownCoordinator {
        ShutdownCoordinator::new(self.broker.clone())
    }

    /// Serves until the coordinator requests shutdown.
    pub async fn run(self) -> Result<ServerReport, ServerError> {
        let Self {
            listener,
            broker,
            settings,
        } = self;

        if let Ok(addr) = listener.local_addr() {
            info!(%addr, framing = ?settings.broker.framing, "server listening");
        }

        let consumer = Consumer::spawn(broker.clone())?;
        let drain_timeout = settings.broker.drain_timeout();

        let mut acceptor = Acceptor::new(listener, broker.clone(), settings);
        let accept = acceptor.run().await;
        let workers = acceptor.into_workers();

        // The acceptor only stops once the running flag is cleared; make
        // sure the queue follows even if the flag was cleared directly.
        ShutdownCoordinator::new(broker.clone()).shutdown();

        let joined = {
            let broker = broker.clone();
            tokio::task::spawn_blocking(move || {
                workers.drain(drain_timeout, broker.registry());
                consumer.join()
            })
            .await
        };

        let consumer = match joined {
            Ok(Ok(report)) => report,
            Ok(Err(_)) | Err(_) => {
                error!("consumer thread panicked");
                ConsumerReport::default()
            }
        };

        let report = ServerReport {
            accept,
            consumer,
            discarded: broker.queue().discarded(),
        };
        info!(?report, "server shut down complete");
        Ok(report)
    }
}
