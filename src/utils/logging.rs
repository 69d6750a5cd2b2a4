use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Log filter for the process: `RUST_LOG` when it is set and valid,
/// otherwise `default_level` (error, warn, info, debug or trace; anything
/// else means info).
pub fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(parse_level(default_level).into())
    })
}

fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "error" => LevelFilter::ERROR,
        "warn" | "warning" => LevelFilter::WARN,
        "debug" => LevelFilter::DEBUG,
        "trace" => LevelFilter::TRACE,
        _ => LevelFilter::INFO,
    }
}

/// Installs the global `fmt` subscriber. Session threads are named, so
/// thread names are part of every line.
pub fn init(default_level: &str) {
    // try_init: tests call this repeatedly
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .with_target(false)
        .with_thread_names(true)
        .try_init();
}
