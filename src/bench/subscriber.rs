//! Subscriber worker
//!
//! A subscriber counts deliveries on its topic and records one latency
//! sample per delivery. It stops on its own: either once it has seen 99% of
//! the messages its topic should carry, or once no delivery has arrived for
//! the inactivity window. The throughput it reports is computed differently
//! in the two cases; see [`CompletionPolicy`].

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::bench::message::{Qos, latency_ms};
use crate::config::Settings;
use crate::transport::{Delivery, MessagingClient};
use crate::utils::BenchError;

/// Share of the expected messages after which a subscriber is done.
pub const COMPLETION_THRESHOLD: f64 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionPolicy {
    /// Messages the topic should carry: publishers per topic x count.
    pub expected: usize,
    /// Inactivity window.
    pub timeout: Duration,
}

impl CompletionPolicy {
    pub fn is_complete(&self, received: usize) -> bool {
        received as f64 >= self.expected as f64 * COMPLETION_THRESHOLD
    }

    pub fn completed_throughput(&self, received: usize, elapsed: Duration) -> f64 {
        received as f64 / elapsed.as_secs_f64()
    }

    /// Throughput after the inactivity window fired. The window itself is
    /// subtracted from the elapsed time, so the result can be negative,
    /// infinite or `NaN`; it is reported unchanged.
    pub fn timeout_throughput(&self, received: usize, elapsed: Duration) -> f64 {
        received as f64 / (elapsed.as_secs_f64() - self.timeout.as_secs_f64())
    }
}

#[derive(Debug, Clone)]
pub struct Subscriber {
    /// `<topic index>-<subscriber index>`
    pub id: String,
    pub topic: String,
    pub qos: Qos,
    pub policy: CompletionPolicy,
}

/// A subscriber whose subscription is in place.
pub struct Subscribed<C> {
    subscriber: Subscriber,
    client: C,
    deliveries: UnboundedReceiver<Delivery>,
    since: Instant,
}

impl Subscriber {
    pub fn from_settings(
        settings: &Settings,
        topic_index: usize,
        index: usize,
    ) -> Result<Self, BenchError> {
        Ok(Self {
            id: format!("{topic_index}-{index}"),
            topic: settings.broker.topic_for(topic_index),
            qos: Qos::try_from(settings.broker.qos)?,
            policy: CompletionPolicy {
                expected: settings.load.expected_per_subscriber(),
                timeout: settings.load.subscriber_timeout(),
            },
        })
    }

    pub async fn subscribe<C: MessagingClient>(
        self,
        client: C,
    ) -> Result<Subscribed<C>, BenchError> {
        let deliveries = client.subscribe(&self.topic, self.qos).await?;
        debug!(id = %self.id, topic = %self.topic, "subscribed");
        Ok(Subscribed {
            subscriber: self,
            client,
            deliveries,
            since: Instant::now(),
        })
    }
}

impl<C: MessagingClient> Subscribed<C> {
    /// Receive until done, send the throughput on `throughput` and hand the
    /// latency samples back.
    pub async fn run(self, throughput: UnboundedSender<f64>) -> Vec<u64> {
        let Subscribed {
            subscriber,
            client,
            deliveries,
            since,
        } = self;
        let policy = subscriber.policy;

        let (event_tx, mut events) = mpsc::unbounded_channel::<Option<u64>>();
        let receiver = tokio::spawn(forward_latencies(deliveries, event_tx));

        let mut received: usize = 0;
        let mut latencies: Vec<u64> = Vec::new();

        let inactivity = sleep(policy.timeout);
        tokio::pin!(inactivity);

        let value = loop {
            tokio::select! {
                Some(latency) = events.recv() => {
                    received += 1;
                    latencies.extend(latency);
                    if policy.is_complete(received) {
                        break policy.completed_throughput(received, since.elapsed());
                    }
                    inactivity.as_mut().reset(Instant::now() + policy.timeout);
                }
                _ = &mut inactivity => {
                    info!(
                        id = %subscriber.id,
                        received,
                        expected = policy.expected,
                        "subscriber timed out"
                    );
                    break policy.timeout_throughput(received, since.elapsed());
                }
            }
        };

        receiver.abort();
        client.disconnect().await;

        info!(id = %subscriber.id, received, "subscriber done");
        let _ = throughput.send(value);
        latencies
    }
}

/// Stands in for a delivery callback: turns each delivery into a latency
/// sample (`None` when the payload has no timestamp) on the worker's queue.
async fn forward_latencies(
    mut deliveries: UnboundedReceiver<Delivery>,
    events: UnboundedSender<Option<u64>>,
) {
    while let Some(delivery) = deliveries.recv().await {
        let now_ms = Utc::now().timestamp_millis() as u64;
        if events.send(latency_ms(now_ms, &delivery.payload)).is_err() {
            break;
        }
    }
}
