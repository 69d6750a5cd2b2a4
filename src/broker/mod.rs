//! The `broker` module is the message pipeline itself: the shared server
//! context, the priority queue session workers feed, the consumer that
//! answers every message, and the coordinator that shuts it all down.

pub mod consumer;
pub mod engine;
pub mod message;
pub mod queue;
pub mod shutdown;

pub use consumer::{Consumer, ConsumerReport};
pub use engine::Broker;
pub use message::Message;
pub use queue::PriorityQueue;
pub use shutdown::ShutdownCoordinator;

#[cfg(test)]
mod tests;
