//! Result types and the final aggregation step.
//!
//! Workers hand their `RunResult`s, throughput values and latency samples to
//! the orchestrator; `calculate_totals` folds them into one `TotalResult`.
//! It is a pure function of its inputs.
//!
//! Undefined statistics stay `NaN` (ratio with no publishes, latency figures
//! with no samples); only the CPU and memory averages are coerced to 0.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bench::stats;

/// Outcome of one publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub id: String,
    pub successes: u64,
    pub failures: u64,
    pub run_time: f64,
    pub msgs_per_sec: f64,
    pub cpu_usage: f64,
    pub memory_usage: f64,
}

impl RunResult {
    pub fn ratio(&self) -> f64 {
        self.successes as f64 / (self.successes + self.failures) as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalResult {
    pub ratio: f64,
    pub successes: u64,
    pub failures: u64,
    pub total_run_time: f64,
    pub avg_run_time: f64,
    pub time_measurements: Vec<f64>,
    pub msg_time_min: f64,
    pub msg_time_max: f64,
    #[serde(rename = "msg_time_mean_avg")]
    pub msg_time_mean: f64,
    #[serde(rename = "msg_time_mean_std")]
    pub msg_time_std: f64,
    #[serde(rename = "total_msgs_per_sec_pub")]
    pub total_msgs_per_sec_publisher: f64,
    #[serde(rename = "avg_msgs_per_sec_pub")]
    pub avg_msgs_per_sec_publisher: f64,
    #[serde(rename = "total_msgs_per_sec_sub")]
    pub total_msgs_per_sec_subscriber: f64,
    #[serde(rename = "avg_msgs_per_sec_sub")]
    pub avg_msgs_per_sec_subscriber: f64,
    pub avg_cpu_usage: f64,
    pub avg_memory_usage: f64,
}

/// Everything a run produces, in the shape of the JSON report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchReport {
    pub runs: Vec<RunResult>,
    pub totals: TotalResult,
}

pub fn calculate_totals(
    results: &[RunResult],
    total_time: Duration,
    latencies: &[u64],
    subscriber_throughputs: &[f64],
) -> TotalResult {
    let successes: u64 = results.iter().map(|r| r.successes).sum();
    let failures: u64 = results.iter().map(|r| r.failures).sum();

    let msgs_per_sec: Vec<f64> = results.iter().map(|r| r.msgs_per_sec).collect();
    let run_times: Vec<f64> = results.iter().map(|r| r.run_time).collect();
    let cpu: Vec<f64> = results.iter().map(|r| r.cpu_usage).collect();
    let memory: Vec<f64> = results.iter().map(|r| r.memory_usage).collect();
    let samples: Vec<f64> = latencies.iter().map(|&l| l as f64).collect();

    TotalResult {
        ratio: successes as f64 / (successes + failures) as f64,
        successes,
        failures,
        total_run_time: total_time.as_secs_f64(),
        avg_run_time: stats::mean(&run_times),
        msg_time_min: stats::min(&samples),
        msg_time_max: stats::max(&samples),
        msg_time_mean: stats::mean(&samples),
        msg_time_std: stats::std_dev_sample(&samples),
        time_measurements: samples,
        total_msgs_per_sec_publisher: msgs_per_sec.iter().sum(),
        avg_msgs_per_sec_publisher: stats::mean(&msgs_per_sec),
        total_msgs_per_sec_subscriber: subscriber_throughputs.iter().sum(),
        avg_msgs_per_sec_subscriber: stats::mean(subscriber_throughputs),
        avg_cpu_usage: stats::zero_if_nan(stats::mean(&cpu)),
        avg_memory_usage: stats::zero_if_nan(stats::mean(&memory)),
    }
}
