//! # popbench
//!
//! `popbench` drives configurable load through a publish/subscribe broker and
//! reports delivery success, throughput, latency and broker resource usage.
//!
//! ## Modules
//!
//! - `bench`: message generation, publisher and subscriber workers, the
//!   orchestrator, resource sampling and result aggregation.
//! - `broker`: an in-process loopback broker for `memory://` runs.
//! - `cli`: command line flags layered over the loaded configuration.
//! - `config`: defaults, `config/default.*` and `POPBENCH_*` environment.
//! - `transport`: the messaging client seam and its WebSocket implementation.
//! - `utils`: the shared error type and logging setup.

pub mod bench;
pub mod broker;
pub mod cli;
pub mod config;
pub mod transport;
pub mod utils;
