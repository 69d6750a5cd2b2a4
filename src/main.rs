//! CLI for PopQ
//!
//! Subcommands:
//! - `server`: run the message server until Ctrl-C / SIGTERM
//! - `client`: interactive line client (stdin in, replies out)
//! - `bench`: burst or sustained load test against a running server

use std::time::Duration;

use clap::Parser;
use popq::cli::{BenchConfig, BenchProgress, check_server, run_bench_with_progress, run_line_client};
use popq::config::{DEFAULT_CONFIG, load_config_from};
use popq::transport::Server;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "popq")]
struct Cli {
    /// Log level: error, warn, info, debug or trace
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Start the message server
    Server {
        /// Configuration file (extension optional)
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: String,
    },
    /// Send stdin lines to a server and print the replies
    Client {
        /// Server address to connect to
        #[arg(long, default_value = "127.0.0.1:9090")]
        addr: String,
    },
    /// Load test: a burst of messages per client, or sustained sending for
    /// `--duration-secs`
    Bench {
        #[arg(long, default_value = "127.0.0.1:9090")]
        addr: String,
        /// Number of concurrent connections
        #[arg(long, default_value_t = 100)]
        clients: usize,
        /// Messages sent by each connection
        #[arg(long, default_value_t = 100)]
        messages: usize,
        /// How long to wait for each acknowledgement, in milliseconds
        #[arg(long, default_value_t = 500)]
        ack_timeout_ms: u64,
        /// Send for this many seconds instead of a fixed message count
        #[arg(long)]
        duration_secs: Option<u64>,
        /// Pause between messages in sustained mode, in milliseconds
        #[arg(long, default_value_t = 10)]
        send_interval_ms: u64,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    popq::utils::logging::init(&cli.log_level);

    let result = match cli.command {
        Command::Server { config } => run_server(&config).await,
        Command::Client { addr } => run_client(addr).await,
        Command::Bench {
            addr,
            clients,
            messages,
            ack_timeout_ms,
            duration_secs,
            send_interval_ms,
            json,
        } => {
            let config = BenchConfig {
                addr,
                clients,
                messages,
                duration: duration_secs.map(Duration::from_secs),
                send_interval: Duration::from_millis(send_interval_ms),
                ack_timeout: Duration::from_millis(ack_timeout_ms),
                ..BenchConfig::default()
            };
            run_bench_command(config, json).await
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run_server(config_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = load_config_from(config_name)?;

    let server = Server::bind(config).await?;
    let coordinator = server.coordinator();
    let mut run = tokio::spawn(server.run());
    info!("Press Ctrl+C to stop the server");

    tokio::select! {
        res = &mut run => {
            error!("Server exited unexpectedly.");
            res??;
            return Ok(());
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received. Exiting gracefully.");
            coordinator.shutdown();
        }
    }

    run.await??;
    Ok(())
}

async fn run_client(addr: String) -> Result<(), Box<dyn std::error::Error>> {
    tokio::task::spawn_blocking(move || {
        run_line_client(&addr, std::io::stdin().lock(), std::io::stdout())
    })
    .await??;
    Ok(())
}

async fn run_bench_command(
    config: BenchConfig,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let check_config = config.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || check_server(&check_config)).await? {
        return Err(format!("cannot connect to server at {}: {}", config.addr, e).into());
    }
    info!(addr = %config.addr, "server is reachable");

    info!(
        addr = %config.addr,
        clients = config.clients,
        messages = config.messages,
        duration_secs = config.duration.map(|d| d.as_secs()),
        "starting load test"
    );
    let report = tokio::task::spawn_blocking(move || {
        run_bench_with_progress(&config, |progress| {
            if !json {
                print_progress(&progress);
            }
        })
    })
    .await??;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        eprintln!();
        println!("Total Duration: {:.2} seconds", report.duration_secs);
        println!("Messages Sent: {}", report.sent);
        println!("Acknowledgments Received: {}", report.acknowledged);
        println!("Failed Connections: {}", report.failed_connections);
        println!("Failed Sends: {}", report.failed_sends);
        println!("Failed Clients: {}", report.failed_clients);
        println!("Average Rate: {:.2} messages/second", report.rate_per_sec);
        if let Some(success_rate) = report.success_rate {
            println!("Success Rate: {:.2}%", success_rate);
        }
    }
    Ok(())
}

fn print_progress(progress: &BenchProgress) {
    eprint!(
        "\rProgress: Sent={} | Received={} | Failed={} | Time={:.1}s | Rate={:.1} msg/s",
        progress.sent,
        progress.acknowledged,
        progress.failed,
        progress.elapsed_secs,
        progress.rate_per_sec
    );
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
