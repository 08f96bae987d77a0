//! Loopback broker engine
//!
//! The broker keeps a topic -> subscriber mapping and one delivery channel per
//! subscription. The API is synchronous and meant to sit behind
//! `Arc<Mutex<LoopbackBroker>>`; the lock is never held across an await.
//!
//! `LoopbackConnector::failing_every(n)` makes every n-th publish (across all
//! clients of the connector) fail, to exercise failure accounting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::bench::message::Qos;
use crate::broker::topic::{SubscriberId, Topic};
use crate::transport::{ConnectOptions, Connector, Delivery, MessagingClient};
use crate::utils::BenchError;

#[derive(Debug, Default)]
pub struct LoopbackBroker {
    pub topics: HashMap<String, Topic>,
    pub clients: HashMap<SubscriberId, UnboundedSender<Delivery>>,
}

impl LoopbackBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_client(&mut self, id: SubscriberId, sender: UnboundedSender<Delivery>) {
        self.clients.insert(id, sender);
    }

    pub fn remove_client(&mut self, id: &SubscriberId) {
        self.clients.remove(id);
    }

    /// Subscribe `subscriber` to `topic`, creating the topic on first use.
    pub fn subscribe(&mut self, topic: &str, subscriber: SubscriberId) {
        let added = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .subscribe(subscriber);
        if !added {
            debug!(%topic, "duplicate subscription ignored");
        }
    }

    pub fn unsubscribe(&mut self, topic: &str, subscriber: &SubscriberId) {
        if let Some(t) = self.topics.get_mut(topic) {
            t.unsubscribe(subscriber);
        }
    }

    /// Fan `payload` out to every subscriber of `topic`; returns how many
    /// subscriptions accepted it.
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> usize {
        let Some(t) = self.topics.get_mut(topic) else {
            debug!(%topic, "publish to topic without subscribers");
            return 0;
        };

        let mut delivered = 0;
        for sub_id in &t.subscribers {
            match self.clients.get(sub_id) {
                Some(sender) => {
                    let delivery = Delivery {
                        topic: topic.to_string(),
                        payload: payload.to_vec(),
                    };
                    if sender.send(delivery).is_ok() {
                        delivered += 1;
                    } else {
                        debug!(%sub_id, "subscription channel closed");
                    }
                }
                None => warn!(%sub_id, "no subscription registered with id"),
            }
        }
        t.published += 1;
        delivered
    }

    /// Remove a subscription, unsubscribe it everywhere and drop topics
    /// nobody listens to anymore.
    pub fn cleanup_client(&mut self, id: &SubscriberId) {
        self.remove_client(id);
        for topic in self.topics.values_mut() {
            topic.unsubscribe(id);
        }
        self.topics.retain(|_, t| !t.is_idle());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Default)]
pub struct LoopbackConnector {
    broker: Arc<Mutex<LoopbackBroker>>,
    fail_every: Option<u64>,
    publishes: Arc<AtomicU64>,
}

impl LoopbackConnector {
    pub fn new(broker: Arc<Mutex<LoopbackBroker>>) -> Self {
        Self {
            broker,
            fail_every: None,
            publishes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Reject every `n`-th publish made through this connector.
    pub fn failing_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    pub fn broker(&self) -> Arc<Mutex<LoopbackBroker>> {
        self.broker.clone()
    }
}

#[async_trait]
impl Connector for LoopbackConnector {
    type Client = LoopbackClient;

    async fn connect(&self, options: ConnectOptions) -> Result<LoopbackClient, BenchError> {
        debug!(client = %options.client_id, "connected to loopback broker");
        Ok(LoopbackClient {
            client_id: options.client_id,
            broker: self.broker.clone(),
            fail_every: self.fail_every,
            publishes: self.publishes.clone(),
            subscriptions: Mutex::new(Vec::new()),
        })
    }
}

#[derive(Debug)]
pub struct LoopbackClient {
    client_id: String,
    broker: Arc<Mutex<LoopbackBroker>>,
    fail_every: Option<u64>,
    publishes: Arc<AtomicU64>,
    subscriptions: Mutex<Vec<SubscriberId>>,
}

#[async_trait]
impl MessagingClient for LoopbackClient {
    async fn publish(&self, topic: &str, _qos: Qos, payload: Vec<u8>) -> Result<(), BenchError> {
        let n = self.publishes.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(every) = self.fail_every {
            if n % every == 0 {
                return Err(BenchError::Publish {
                    topic: topic.to_string(),
                    reason: format!("injected failure on publish #{n}"),
                });
            }
        }

        lock(&self.broker).publish(topic, &payload);
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        _qos: Qos,
    ) -> Result<UnboundedReceiver<Delivery>, BenchError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub_id = format!("{}-{}", self.client_id, Uuid::new_v4());
        {
            let mut broker = lock(&self.broker);
            broker.register_client(sub_id.clone(), tx);
            broker.subscribe(topic, sub_id.clone());
        }
        lock(&self.subscriptions).push(sub_id);
        Ok(rx)
    }

    async fn disconnect(&self) {
        let ids: Vec<SubscriberId> = lock(&self.subscriptions).drain(..).collect();
        let mut broker = lock(&self.broker);
        for id in &ids {
            broker.cleanup_client(id);
        }
    }
}
