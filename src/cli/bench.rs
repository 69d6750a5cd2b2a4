//! Load generator
//!
//! Two modes share one report:
//!
//! - burst: `clients` concurrent connections each send `messages` lines and
//!   wait briefly for every acknowledgement. A missing acknowledgement is not
//!   a failure: under load the server may answer late.
//! - sustained: every connection sends one line per `send_interval` until
//!   `duration` has passed, while a second thread per connection counts the
//!   acknowledgements that come back.
//!
//! Progress snapshots are handed to a callback while the clients run.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, warn};

const SAMPLE_MESSAGES: &[&str] = &[
    "Hello from client",
    "Testing message priority",
    "High load test in progress",
    "Concurrent connection test",
    "Message processing verification",
    "Queue stress test",
    "Thread safety validation",
    "Server capacity test",
    "Network throughput check",
    "End-to-end latency measurement",
];

/// How often the coordinating thread checks whether the clients are done.
const FINISH_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub addr: String,
    pub clients: usize,
    /// Lines per connection in burst mode.
    pub messages: usize,
    /// Switches to sustained mode: send for this long instead.
    pub duration: Option<Duration>,
    /// Pause between two lines in sustained mode.
    pub send_interval: Duration,
    pub connect_timeout: Duration,
    pub ack_timeout: Duration,
    pub progress_interval: Duration,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:9090".to_string(),
            clients: 100,
            messages: 100,
            duration: None,
            send_interval: Duration::from_millis(10),
            connect_timeout: Duration::from_secs(10),
            ack_timeout: Duration::from_millis(500),
            progress_interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BenchMode {
    Burst,
    Sustained,
}

/// Counters observed while the test is still running.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct BenchProgress {
    pub sent: u64,
    pub acknowledged: u64,
    pub failed: u64,
    pub elapsed_secs: f64,
    pub rate_per_sec: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BenchReport {
    pub mode: BenchMode,
    pub clients: usize,
    pub sent: u64,
    pub acknowledged: u64,
    pub failed_connections: u64,
    pub failed_sends: u64,
    /// Clients that stopped on an unexpected error or panicked.
    pub failed_clients: u64,
    pub duration_secs: f64,
    pub rate_per_sec: f64,
    /// Percentage of the planned lines that were sent; burst mode only.
    pub success_rate: Option<f64>,
}

#[derive(Default)]
struct Counters {
    sent: AtomicU64,
    acknowledged: AtomicU64,
    failed_connections: AtomicU64,
    failed_sends: AtomicU64,
    failed_clients: AtomicU64,
}

impl Counters {
    fn snapshot(&self, started: Instant) -> BenchProgress {
        let sent = self.sent.load(Ordering::Relaxed);
        let elapsed = started.elapsed().as_secs_f64();
        BenchProgress {
            sent,
            acknowledged: self.acknowledged.load(Ordering::Relaxed),
            failed: self.failed_connections.load(Ordering::Relaxed)
                + self.failed_sends.load(Ordering::Relaxed)
                + self.failed_clients.load(Ordering::Relaxed),
            elapsed_secs: elapsed,
            rate_per_sec: rate(sent, elapsed),
        }
    }
}

fn rate(count: u64, secs: f64) -> f64 {
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}

fn resolve(addr: &str) -> io::Result<SocketAddr> {
    addr.to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "address did not resolve"))
}

/// Opens and closes one connection to make sure the server is up.
pub fn check_server(config: &BenchConfig) -> io::Result<()> {
    let addr = resolve(&config.addr)?;
    let stream = TcpStream::connect_timeout(&addr, config.connect_timeout)?;
    let _ = stream.shutdown(Shutdown::Both);
    Ok(())
}

pub fn run_bench(config: &BenchConfig) -> io::Result<BenchReport> {
    run_bench_with_progress(config, |_| {})
}

/// Runs the load test, calling `on_progress` every `progress_interval`
/// until all clients are done.
pub fn run_bench_with_progress(
    config: &BenchConfig,
    mut on_progress: impl FnMut(BenchProgress),
) -> io::Result<BenchReport> {
    let addr = resolve(&config.addr)?;
    let counters = Counters::default();
    let started = Instant::now();
    let deadline = config.duration.map(|d| started + d);

    thread::scope(|scope| -> io::Result<()> {
        let counters = &counters;
        let handles = (0..config.clients)
            .map(|client| {
                thread::Builder::new()
                    .name(format!("bench-{client}"))
                    .spawn_scoped(scope, move || {
                        let result = match deadline {
                            Some(deadline) => {
                                run_sustained_client(client, addr, config, deadline, counters)
                            }
                            None => run_burst_client(client, addr, config, counters),
                        };
                        if let Err(e) = result {
                            warn!(client, error = %e, "bench client failed");
                            counters.failed_clients.fetch_add(1, Ordering::Relaxed);
                        }
                    })
            })
            .collect::<io::Result<Vec<_>>>()?;

        let mut next_report = Instant::now() + config.progress_interval;
        while !handles.iter().all(|handle| handle.is_finished()) {
            thread::sleep(FINISH_POLL);
            if Instant::now() >= next_report {
                on_progress(counters.snapshot(started));
                next_report += config.progress_interval.max(FINISH_POLL);
            }
        }

        for (client, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() {
                error!(client, "bench client panicked");
                counters.failed_clients.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    })?;

    let duration = started.elapsed().as_secs_f64();
    let sent = counters.sent.load(Ordering::Relaxed);
    let planned = (config.clients * config.messages) as u64;
    let (mode, success_rate) = match config.duration {
        Some(_) => (BenchMode::Sustained, None),
        None if planned == 0 => (BenchMode::Burst, None),
        None => (BenchMode::Burst, Some(sent as f64 / planned as f64 * 100.0)),
    };

    Ok(BenchReport {
        mode,
        clients: config.clients,
        sent,
        acknowledged: counters.acknowledged.load(Ordering::Relaxed),
        failed_connections: counters.failed_connections.load(Ordering::Relaxed),
        failed_sends: counters.failed_sends.load(Ordering::Relaxed),
        failed_clients: counters.failed_clients.load(Ordering::Relaxed),
        duration_secs: duration,
        rate_per_sec: rate(sent, duration),
        success_rate,
    })
}

fn connect(
    client: usize,
    addr: SocketAddr,
    config: &BenchConfig,
    counters: &Counters,
) -> Option<TcpStream> {
    match TcpStream::connect_timeout(&addr, config.connect_timeout) {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!(client, error = %e, "connection failed");
            counters.failed_connections.fetch_add(1, Ordering::Relaxed);
            None
        }
    }
}

fn sample_line(client: usize, i: usize) -> String {
    let sample = SAMPLE_MESSAGES[(client + i) % SAMPLE_MESSAGES.len()];
    format!("[Client-{client}][Msg-{i}] {sample}\n")
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

fn run_burst_client(
    client: usize,
    addr: SocketAddr,
    config: &BenchConfig,
    counters: &Counters,
) -> io::Result<()> {
    let Some(mut stream) = connect(client, addr, config, counters) else {
        return Ok(());
    };
    stream.set_read_timeout(Some(config.ack_timeout))?;
    let mut acks = BufReader::new(stream.try_clone()?);
    let mut reply = String::new();

    for i in 0..config.messages {
        if let Err(e) = stream.write_all(sample_line(client, i).as_bytes()) {
            debug!(client, error = %e, "send failed");
            counters.failed_sends.fetch_add(1, Ordering::Relaxed);
            continue;
        }
        counters.sent.fetch_add(1, Ordering::Relaxed);

        reply.clear();
        match acks.read_line(&mut reply) {
            Ok(n) if n > 0 => {
                counters.acknowledged.fetch_add(1, Ordering::Relaxed);
            }
            Ok(_) => break,
            // ack timeout is acceptable under load
            Err(e) if is_timeout(&e) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn run_sustained_client(
    client: usize,
    addr: SocketAddr,
    config: &BenchConfig,
    deadline: Instant,
    counters: &Counters,
) -> io::Result<()> {
    let Some(mut stream) = connect(client, addr, config, counters) else {
        return Ok(());
    };
    stream.set_read_timeout(Some(config.ack_timeout))?;
    let reader = stream.try_clone()?;
    let finished = AtomicBool::new(false);

    thread::scope(|scope| -> io::Result<()> {
        let acks = thread::Builder::new()
            .name(format!("bench-{client}-acks"))
            .spawn_scoped(scope, || count_acks(client, reader, &finished, counters))?;

        let mut i = 0;
        while Instant::now() < deadline {
            if let Err(e) = stream.write_all(sample_line(client, i).as_bytes()) {
                debug!(client, error = %e, "send failed");
                counters.failed_sends.fetch_add(1, Ordering::Relaxed);
                break;
            }
            counters.sent.fetch_add(1, Ordering::Relaxed);
            i += 1;
            thread::sleep(config.send_interval);
        }

        // the server closes the session once it sees end of stream
        finished.store(true, Ordering::SeqCst);
        let _ = stream.shutdown(Shutdown::Write);
        if acks.join().is_err() {
            error!(client, "ack reader panicked");
            counters.failed_clients.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    })
}

fn count_acks(client: usize, reader: TcpStream, finished: &AtomicBool, counters: &Counters) {
    let mut acks = BufReader::new(reader);
    let mut reply = String::new();
    loop {
        reply.clear();
        match acks.read_line(&mut reply) {
            Ok(0) => break,
            Ok(_) => {
                counters.acknowledged.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) if is_timeout(&e) => {
                if finished.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(e) => {
                debug!(client, error = %e, "ack read failed");
                break;
            }
        }
    }
}
