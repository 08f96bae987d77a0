//! The `transport` module is the boundary between the benchmark engine and a
//! broker.
//!
//! Workers only see the [`Connector`] and [`MessagingClient`] traits. The
//! WebSocket client speaks the popsub JSON protocol defined in `message`;
//! `tls` builds the rustls configuration used for `wss://` brokers.

pub mod message;
pub mod tls;
pub mod websocket;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::bench::message::Qos;
use crate::utils::BenchError;

pub use websocket::{WsClient, WsConnector};

/// A message handed to a subscription by the client.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Everything needed to open one broker connection.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub url: String,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub auto_reconnect: bool,
    pub reconnect_delay: Duration,
}

impl ConnectOptions {
    pub fn new(url: &str, client_id: String) -> Self {
        Self {
            url: url.to_string(),
            client_id,
            username: String::new(),
            password: String::new(),
            auto_reconnect: true,
            reconnect_delay: Duration::from_secs(1),
        }
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    /// Credentials are only sent when both halves are present.
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// One live broker connection.
#[async_trait]
pub trait MessagingClient: Send + Sync + 'static {
    /// Publish and wait for the client to acknowledge the send.
    async fn publish(&self, topic: &str, qos: Qos, payload: Vec<u8>) -> Result<(), BenchError>;

    /// Subscribe; deliveries arrive on the returned receiver in the order the
    /// connection receives them.
    async fn subscribe(
        &self,
        topic: &str,
        qos: Qos,
    ) -> Result<UnboundedReceiver<Delivery>, BenchError>;

    async fn disconnect(&self);
}

/// Opens connections for workers.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Client: MessagingClient;

    async fn connect(&self, options: ConnectOptions) -> Result<Self::Client, BenchError>;
}

#[cfg(test)]
mod tests;
