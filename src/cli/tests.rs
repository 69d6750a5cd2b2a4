use super::bench::{BenchConfig, BenchMode, check_server, run_bench, run_bench_with_progress};
use super::line::run_line_client;
use crate::config::Settings;
use crate::transport::Server;
use std::io::Cursor;
use std::time::Duration;
use tokio::net::TcpListener;

async fn start_server() -> (String, crate::broker::ShutdownCoordinator, tokio::task::JoinHandle<()>) {
    let mut settings = Settings::default();
    settings.server.accept_poll_ms = 20;
    settings.broker.drain_timeout_ms = 100;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = Server::from_listener(listener, settings);
    let addr = server.local_addr().unwrap().to_string();
    let coordinator = server.coordinator();
    let handle = tokio::spawn(async move {
        server.run().await.expect("server failed");
    });
    (addr, coordinator, handle)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_line_client_prints_replies() {
    let (addr, coordinator, handle) = start_server().await;

    let output = tokio::task::spawn_blocking(move || {
        let mut output = Vec::new();
        run_line_client(&addr, Cursor::new("hello\nworld\n"), &mut output).unwrap();
        String::from_utf8(output).unwrap()
    })
    .await
    .unwrap();

    assert_eq!(output, "Server: Received: hello\nServer: Received: world\n");

    coordinator.shutdown();
    handle.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bench_counts_every_ack() {
    let (addr, coordinator, handle) = start_server().await;

    let config = BenchConfig {
        addr,
        clients: 4,
        messages: 5,
        ack_timeout: Duration::from_secs(2),
        ..BenchConfig::default()
    };
    let report = tokio::task::spawn_blocking(move || run_bench(&config).unwrap())
        .await
        .unwrap();

    assert_eq!(report.clients, 4);
    assert_eq!(report.sent, 20);
    assert_eq!(report.acknowledged, 20);
    assert_eq!(report.failed_connections, 0);
    assert_eq!(report.failed_sends, 0);
    assert_eq!(report.failed_clients, 0);
    assert_eq!(report.mode, BenchMode::Burst);
    assert_eq!(report.success_rate, Some(100.0));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["sent"], 20);
    assert_eq!(json["mode"], "burst");

    coordinator.shutdown();
    handle.await.unwrap();
}

#[test]
fn test_bench_reports_failed_connections() {
    let config = BenchConfig {
        addr: format!("127.0.0.1:{}", unused_port()),
        clients: 2,
        messages: 3,
        connect_timeout: Duration::from_millis(200),
        ..BenchConfig::default()
    };

    let report = run_bench(&config).unwrap();
    assert_eq!(report.failed_connections, 2);
    assert_eq!(report.failed_clients, 0);
    assert_eq!(report.sent, 0);
    assert_eq!(report.success_rate, Some(0.0));
}

// bind then drop to get a port nobody listens on
fn unused_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_check_server_reaches_running_server() {
    let (addr, coordinator, handle) = start_server().await;

    let config = BenchConfig {
        addr,
        ..BenchConfig::default()
    };
    tokio::task::spawn_blocking(move || check_server(&config))
        .await
        .unwrap()
        .expect("server should be reachable");

    coordinator.shutdown();
    handle.await.unwrap();
}

#[test]
fn test_check_server_reports_unreachable_server() {
    let config = BenchConfig {
        addr: format!("127.0.0.1:{}", unused_port()),
        connect_timeout: Duration::from_millis(200),
        ..BenchConfig::default()
    };
    assert!(check_server(&config).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sustained_bench_sends_until_duration_elapses() {
    let (addr, coordinator, handle) = start_server().await;

    let config = BenchConfig {
        addr,
        clients: 2,
        duration: Some(Duration::from_millis(600)),
        send_interval: Duration::from_millis(20),
        ack_timeout: Duration::from_millis(200),
        progress_interval: Duration::from_millis(100),
        ..BenchConfig::default()
    };
    let (report, progress) = tokio::task::spawn_blocking(move || {
        let mut progress = Vec::new();
        let report = run_bench_with_progress(&config, |p| progress.push(p)).unwrap();
        (report, progress)
    })
    .await
    .unwrap();

    assert_eq!(report.mode, BenchMode::Sustained);
    assert!(report.duration_secs >= 0.6);
    assert!(report.sent >= 2, "sent {}", report.sent);
    assert!(report.acknowledged > 0);
    assert!(report.acknowledged <= report.sent);
    assert_eq!(report.failed_connections, 0);
    assert_eq!(report.failed_clients, 0);
    assert_eq!(report.success_rate, None);

    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|w| w[0].sent <= w[1].sent));
    assert!(progress.iter().all(|p| p.sent <= report.sent));

    coordinator.shutdown();
    handle.await.unwrap();
}
