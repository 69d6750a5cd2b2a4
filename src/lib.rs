//! # PopQ
//!
//! `popq` is a minimalist, in-memory message ingestion server built with Rust.
//! Clients send lines over plain TCP; every line goes through one shared
//! priority queue and is answered by a single consumer with
//! `Received: <line>`.
//!
//! ## Core Modules
//!
//! The library is structured into several modules, each with a distinct responsibility:
//!
//! - `broker`: The shared server context, the priority queue, the consumer and the shutdown coordinator.
//! - `client`: Session identifiers, the reply handle, and the registry mapping one to the other.
//! - `config`: Handles loading and managing server configuration.
//! - `transport`: Accepts TCP connections, frames session input and runs the server lifecycle.
//! - `cli`: The interactive line client and the load generator used by the binary.
//! - `utils`: Contains shared utilities, such as error handling and logging.

pub mod broker;
pub mod cli;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;
