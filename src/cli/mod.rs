//! Client-side tools shipped with the server binary: an interactive line
//! client and a burst or sustained load generator. Both speak the plain line protocol
//! and use blocking sockets.

pub mod bench;
pub mod line;

pub use bench::{
    BenchConfig, BenchMode, BenchProgress, BenchReport, check_server, run_bench,
    run_bench_with_progress,
};
pub use line::run_line_client;

#[cfg(test)]
mod tests;
