//! In-process loopback broker.
//!
//! `memory://` broker URLs run the whole benchmark inside one process: every
//! connection shares a `LoopbackBroker` that fans published payloads out to
//! the subscriptions of a topic. Useful for smoke runs of the harness and for
//! exercising the engine in tests without a network.

pub mod engine;
pub mod topic;

pub use engine::{LoopbackBroker, LoopbackClient, LoopbackConnector};
