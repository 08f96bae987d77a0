//! The benchmark engine: message generation, publisher and subscriber
//! workers, resource sampling, the orchestrator that wires them together,
//! and the aggregation and rendering of the results.

pub mod aggregate;
pub mod message;
pub mod monitor;
pub mod orchestrator;
pub mod publisher;
pub mod report;
pub mod stats;
pub mod subscriber;

pub use aggregate::{BenchReport, RunResult, TotalResult, calculate_totals};
pub use orchestrator::run_benchmark;
