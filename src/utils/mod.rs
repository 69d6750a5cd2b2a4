//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `popq` server.
//!
//! This module centralizes the startup error type and the logging setup so
//! the binary and the tests share one way of doing both.

pub mod error;
pub mod logging;

pub use error::ServerError;
