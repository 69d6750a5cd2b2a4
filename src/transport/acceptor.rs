//! Connection acceptor
//!
//! Accepts connections on the async runtime with a bounded wait, so the
//! running flag is re-checked at least once per poll interval. Each accepted
//! socket is switched back to blocking mode, registered under a fresh
//! session id and handed to its own `SessionWorker` thread.
//!
//! Worker join handles are kept in a `WorkerSet` so shutdown can wait for
//! sessions to finish before forcing their sockets closed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::broker::Broker;
use crate::client::{ClientRegistry, SessionId};
use crate::config::Settings;
use crate::transport::worker::{SessionEnd, SessionWorker};

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Interval at which `WorkerSet::drain` re-checks finished workers.
const DRAIN_STEP: Duration = Duration::from_millis(10);

/// Join handles of the session workers started by an acceptor.
#[derive(Debug, Default)]
pub struct WorkerSet {
    workers: Vec<(SessionId, JoinHandle<SessionEnd>)>,
}

impl WorkerSet {
    pub fn push(&mut self, id: SessionId, handle: JoinHandle<SessionEnd>) {
        self.workers.push((id, handle));
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Joins every worker that has already finished.
    pub fn reap(&mut self) -> usize {
        let (done, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.workers)
            .into_iter()
            .partition(|(_, handle)| handle.is_finished());
        self.workers = running;

        let reaped = done.len();
        for (id, handle) in done {
            join_worker(id, handle);
        }
        reaped
    }

    /// Waits up to `timeout` for the workers to finish on their own, then
    /// closes every session still in `registry` and joins what is left.
    /// Blocks the calling thread.
    pub fn drain(mut self, timeout: Duration, registry: &ClientRegistry) {
        let deadline = Instant::now() + timeout;
        self.reap();
        while !self.is_empty() && Instant::now() < deadline {
            std::thread::sleep(DRAIN_STEP);
            self.reap();
        }

        if !self.is_empty() {
            let closed = registry.close_all();
            warn!(
                workers = self.len(),
                closed, "drain timeout reached, closing remaining sessions"
            );
        }
        for (id, handle) in self.workers {
            join_worker(id, handle);
        }
    }
}

fn join_worker(id: SessionId, handle: JoinHandle<SessionEnd>) {
    if handle.join().is_err() {
        error!(session = %id, "session worker panicked");
    }
}

/// Counters reported by the acceptor when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptReport {
    pub accepted: u64,
    /// Connections refused because `max_connections` was reached.
    pub rejected: u64,
}

pub struct Acceptor {
    listener: TcpListener,
    broker: Arc<Broker>,
    settings: Settings,
    workers: WorkerSet,
    report: AcceptReport,
}

impl Acceptor {
    pub fn new(listener: TcpListener, broker: Arc<Broker>, settings: Settings) -> Self {
        Self {
            listener,
            broker,
            settings,
            workers: WorkerSet::default(),
            report: AcceptReport::default(),
        }
    }

    /// Accepts connections until the running flag is cleared.
    pub async fn run(&mut self) -> AcceptReport {
        let poll = self.settings.server.accept_poll();

        while self.broker.is_running() {
            let accepted = tokio::time::timeout(poll, self.listener.accept()).await;
            match accepted {
                // poll interval elapsed, re-check the flag
                Err(_) => continue,
                Ok(Ok((stream, peer))) => self.admit(stream, peer),
                Ok(Err(e)) => {
                    if !self.broker.is_running() {
                        break;
                    }
                    error!(error = %e, "error accepting connection");
                    // back off on persistent errors such as fd exhaustion
                    tokio::time::sleep(poll.min(ACCEPT_ERROR_BACKOFF)).await;
                }
            }
        }

        info!(
            accepted = self.report.accepted,
            rejected = self.report.rejected,
            "acceptor stopped"
        );
        self.report
    }

    fn admit(&mut self, stream: TcpStream, peer: SocketAddr) {
        self.workers.reap();

        let registry = self.broker.registry();
        let max = self.settings.broker.max_connections;
        if registry.len() >= max {
            warn!(%peer, max, "connection limit reached, refusing connection");
            self.report.rejected += 1;
            return;
        }

        // acknowledgement writes to this peer give up after `write_timeout`
        let write_timeout = self.settings.broker.write_timeout();
        let stream = match stream.into_std().and_then(|s| {
            s.set_nonblocking(false)?;
            s.set_write_timeout(Some(write_timeout))?;
            Ok(s)
        }) {
            Ok(s) => s,
            Err(e) => {
                error!(%peer, error = %e, "failed to set up accepted socket");
                return;
            }
        };
        let reader = match stream.try_clone() {
            Ok(r) => r,
            Err(e) => {
                error!(%peer, error = %e, "failed to clone accepted socket");
                return;
            }
        };

        let id = self.broker.next_session_id();
        registry.insert(id, Arc::new(stream));

        let worker = SessionWorker::new(
            id,
            reader,
            self.settings.broker.framing,
            self.settings.broker.read_buffer_bytes,
            self.broker.clone(),
        )
        .with_max_line_bytes(self.settings.broker.max_line_bytes);
        match worker.spawn() {
            Ok(handle) => {
                info!(session = %id, %peer, "new connection");
                self.workers.push(id, handle);
                self.report.accepted += 1;
            }
            Err(e) => {
                error!(session = %id, error = %e, "failed to spawn session worker");
                if let Some(handle) = registry.remove(id) {
                    handle.close();
                }
            }
        }
        debug!(sessions = registry.len(), "registry size");
    }

    pub fn report(&self) -> AcceptReport {
        self.report
    }

    pub fn into_workers(self) -> WorkerSet {
        self.workers
    }
}
