//! Publisher worker
//!
//! A publisher builds its whole batch up front, then splits into two tasks:
//! the publish loop, which stamps and sends each message and reports every
//! outcome, and the accumulation loop, which owns all counters and usage
//! samples and turns them into a single `RunResult` once the publish loop
//! reports its elapsed time.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tracing::{debug, info, warn};

use crate::bench::aggregate::RunResult;
use crate::bench::message::{BatchSpec, Message, Qos, generate_batch, seed_from_id};
use crate::bench::monitor::ResourceMonitor;
use crate::bench::stats;
use crate::config::Settings;
use crate::transport::MessagingClient;
use crate::utils::BenchError;

/// A resource sample is taken on every this many successful publishes.
pub const SAMPLE_EVERY: u64 = 50;

/// Subtracted from the elapsed time for every full hundred messages.
const CALIBRATION_SECS_PER_HUNDRED: usize = 20;

#[derive(Debug, Clone)]
pub struct Publisher {
    /// `<topic index>-<publisher index>`
    pub id: String,
    pub topic: String,
    pub qos: Qos,
    pub count: usize,
    pub size: usize,
    pub body: Vec<u8>,
    pub seed: Option<u64>,
    pub message_interval: Duration,
    pub wait_timeout: Duration,
}

#[derive(Debug)]
enum UsageSample {
    Cpu(f64),
    Memory(f64),
}

impl Publisher {
    pub fn from_settings(
        settings: &Settings,
        topic_index: usize,
        index: usize,
    ) -> Result<Self, BenchError> {
        Ok(Self {
            id: format!("{topic_index}-{index}"),
            topic: settings.broker.topic_for(topic_index),
            qos: Qos::try_from(settings.broker.qos)?,
            count: settings.load.count,
            size: settings.load.size,
            body: settings.load.payload.as_bytes().to_vec(),
            seed: settings.load.seed,
            message_interval: settings.load.message_interval(),
            wait_timeout: settings.broker.wait_timeout(),
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| seed_from_id(&self.id))
    }

    pub fn messages(&self) -> Vec<Message> {
        generate_batch(&BatchSpec {
            topic: &self.topic,
            qos: self.qos,
            count: self.count,
            size: self.size,
            body: &self.body,
            seed: self.seed(),
        })
    }

    /// `elapsed` minus the fixed calibration offset of 20 s per full hundred
    /// messages.
    pub fn run_time(&self, elapsed_secs: f64) -> f64 {
        elapsed_secs - ((self.count / 100) * CALIBRATION_SECS_PER_HUNDRED) as f64
    }

    /// Publish the whole batch through `client` and summarize the run.
    pub async fn run<C: MessagingClient>(
        self,
        client: C,
        monitor: Arc<dyn ResourceMonitor>,
    ) -> RunResult {
        let client = Arc::new(client);
        let messages = self.messages();
        info!(id = %self.id, topic = %self.topic, count = messages.len(), "publisher starting");

        let (outcome_tx, mut outcomes) = mpsc::unbounded_channel::<Message>();
        let (sample_tx, mut samples) = mpsc::unbounded_channel::<UsageSample>();
        let (done_tx, mut done) = oneshot::channel::<f64>();

        let start = Instant::now();
        tokio::spawn(publish_loop(
            client.clone(),
            messages,
            self.message_interval,
            self.wait_timeout,
            outcome_tx,
            done_tx,
        ));

        let mut successes: u64 = 0;
        let mut failures: u64 = 0;
        let mut cpu: Vec<f64> = Vec::new();
        let mut memory: Vec<f64> = Vec::new();

        let elapsed = loop {
            tokio::select! {
                biased;

                Some(msg) = outcomes.recv() => {
                    if msg.error {
                        failures += 1;
                        continue;
                    }
                    successes += 1;
                    if successes % SAMPLE_EVERY == 0 {
                        if monitor.is_remote() {
                            spawn_remote_samples(monitor.clone(), sample_tx.clone());
                        } else {
                            cpu.extend(monitor.cpu_usage().await);
                            memory.extend(monitor.memory_usage().await);
                        }
                    }
                }
                Some(sample) = samples.recv() => match sample {
                    UsageSample::Cpu(v) => cpu.push(v),
                    UsageSample::Memory(v) => memory.push(v),
                },
                elapsed = &mut done => {
                    break elapsed.unwrap_or_else(|_| start.elapsed().as_secs_f64());
                }
            }
        };

        while let Ok(msg) = outcomes.try_recv() {
            if msg.error {
                failures += 1;
            } else {
                successes += 1;
            }
        }
        // remote probes still in flight are not waited for
        while let Ok(sample) = samples.try_recv() {
            match sample {
                UsageSample::Cpu(v) => cpu.push(v),
                UsageSample::Memory(v) => memory.push(v),
            }
        }

        client.disconnect().await;

        let result = RunResult {
            id: self.id.clone(),
            successes,
            failures,
            run_time: self.run_time(elapsed),
            msgs_per_sec: successes as f64 / elapsed,
            cpu_usage: stats::zero_if_nan(stats::mean(&cpu)),
            memory_usage: stats::zero_if_nan(stats::mean(&memory)),
        };
        info!(
            id = %self.id,
            successes,
            failures,
            elapsed_secs = elapsed,
            "publisher done"
        );
        result
    }
}

async fn publish_loop<C: MessagingClient>(
    client: Arc<C>,
    messages: Vec<Message>,
    message_interval: Duration,
    wait_timeout: Duration,
    outcomes: UnboundedSender<Message>,
    done: oneshot::Sender<f64>,
) {
    let start = Instant::now();
    let mut ticker = (!message_interval.is_zero()).then(|| {
        let mut ticker = interval_at(start + message_interval, message_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });

    for (n, mut msg) in messages.into_iter().enumerate() {
        if let Some(ticker) = ticker.as_mut() {
            ticker.tick().await;
        }

        msg.stamp(Utc::now());
        let payload = std::mem::take(&mut msg.payload);
        let sent = match timeout(wait_timeout, client.publish(&msg.topic, msg.qos, payload)).await
        {
            Ok(result) => result,
            Err(_) => Err(BenchError::Publish {
                topic: msg.topic.clone(),
                reason: format!("no acknowledgement within {wait_timeout:?}"),
            }),
        };

        match sent {
            Ok(()) => msg.delivered = Some(Utc::now()),
            Err(e) => {
                warn!(topic = %msg.topic, seq = n + 1, error = %e, "publish failed");
                msg.error = true;
            }
        }

        if (n + 1) % 100 == 0 {
            debug!(topic = %msg.topic, sent = n + 1, "publish progress");
        }
        if outcomes.send(msg).is_err() {
            break;
        }
    }

    let _ = done.send(start.elapsed().as_secs_f64());
}

fn spawn_remote_samples(monitor: Arc<dyn ResourceMonitor>, samples: UnboundedSender<UsageSample>) {
    let cpu_monitor = monitor.clone();
    let cpu_samples = samples.clone();
    tokio::spawn(async move {
        if let Some(v) = cpu_monitor.cpu_usage().await {
            let _ = cpu_samples.send(UsageSample::Cpu(v));
        }
    });
    tokio::spawn(async move {
        if let Some(v) = monitor.memory_usage().await {
            let _ = samples.send(UsageSample::Memory(v));
        }
    });
}
