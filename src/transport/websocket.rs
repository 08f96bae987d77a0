//! WebSocket messaging client
//!
//! Each `WsClient` owns one socket through a background connection task:
//! - publish/subscribe requests arrive on a command channel and are answered
//!   through a oneshot once the frame has been flushed
//! - deliveries are decoded and routed to every subscription on their topic,
//!   in the order the socket yields them
//! - QoS >= 1 deliveries are acknowledged back to the broker
//! - a lost connection is logged and re-established after a fixed delay,
//!   without a retry limit, and live subscriptions are replayed
//!
//! Publishes issued while the socket is down stay queued until it is back.
//! One whose caller has stopped waiting for it is dropped, not sent.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::bench::message::Qos;
use crate::transport::message::{ClientMessage, ServerMessage, decode_payload};
use crate::transport::{ConnectOptions, Connector, Delivery, MessagingClient, tls};
use crate::utils::BenchError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Command {
    Publish {
        topic: String,
        frame: ClientMessage,
        done: oneshot::Sender<Result<(), BenchError>>,
    },
    Subscribe {
        topic: String,
        sink: UnboundedSender<Delivery>,
        done: oneshot::Sender<Result<(), BenchError>>,
    },
    Disconnect,
}

struct Subscription {
    topic: String,
    sink: UnboundedSender<Delivery>,
}

/// Opens WebSocket connections, optionally over TLS.
#[derive(Clone, Default)]
pub struct WsConnector {
    tls: Option<Arc<rustls::ClientConfig>>,
}

impl WsConnector {
    pub fn new(tls: Option<Arc<rustls::ClientConfig>>) -> Self {
        Self { tls }
    }

    fn tls_for(&self, url: &str) -> Result<Option<Arc<rustls::ClientConfig>>, BenchError> {
        if !url.starts_with("wss://") {
            return Ok(None);
        }
        match &self.tls {
            Some(config) => Ok(Some(config.clone())),
            None => tls::default_client_config().map(Some),
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Client = WsClient;

    async fn connect(&self, options: ConnectOptions) -> Result<WsClient, BenchError> {
        let tls = self.tls_for(&options.url)?;
        let stream = open_session(&options, tls.clone()).await?;

        let (commands, rx) = mpsc::unbounded_channel();
        let client_id = options.client_id.clone();
        tokio::spawn(run_connection(stream, options, tls, rx));

        Ok(WsClient {
            client_id,
            commands,
        })
    }
}

pub struct WsClient {
    client_id: String,
    commands: UnboundedSender<Command>,
}

impl WsClient {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

#[async_trait]
impl MessagingClient for WsClient {
    async fn publish(&self, topic: &str, qos: Qos, payload: Vec<u8>) -> Result<(), BenchError> {
        let closed = || BenchError::Publish {
            topic: topic.to_string(),
            reason: "connection task closed".to_string(),
        };

        let (done, rx) = oneshot::channel();
        let frame = ClientMessage::publish(topic, &payload, qos.into());
        self.commands
            .send(Command::Publish {
                topic: topic.to_string(),
                frame,
                done,
            })
            .map_err(|_| closed())?;

        rx.await.map_err(|_| closed())?
    }

    async fn subscribe(
        &self,
        topic: &str,
        _qos: Qos,
    ) -> Result<UnboundedReceiver<Delivery>, BenchError> {
        let closed = || BenchError::Subscribe {
            topic: topic.to_string(),
            reason: "connection task closed".to_string(),
        };

        let (sink, deliveries) = mpsc::unbounded_channel();
        let (done, rx) = oneshot::channel();
        self.commands
            .send(Command::Subscribe {
                topic: topic.to_string(),
                sink,
                done,
            })
            .map_err(|_| closed())?;

        rx.await.map_err(|_| closed())??;
        Ok(deliveries)
    }

    async fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }
}

/// Connect and, when credentials are configured, run login -> auth.
async fn open_session(
    options: &ConnectOptions,
    tls: Option<Arc<rustls::ClientConfig>>,
) -> Result<WsStream, BenchError> {
    let connect_err = |reason: String| BenchError::Connect {
        url: options.url.clone(),
        reason,
    };

    let connector = tls.map(tokio_tungstenite::Connector::Rustls);
    let (mut stream, _response) =
        connect_async_tls_with_config(options.url.as_str(), None, true, connector)
            .await
            .map_err(|e| connect_err(e.to_string()))?;

    if options.has_credentials() {
        let login = ClientMessage::Login {
            username: options.username.clone(),
            password: options.password.clone(),
        };
        send_frame(&mut stream, &login).await.map_err(connect_err)?;

        let token = match next_server_message(&mut stream).await.map_err(connect_err)? {
            ServerMessage::LoginResponse { token } => token,
            ServerMessage::Error { message } => return Err(connect_err(message)),
            other => return Err(connect_err(format!("unexpected login reply: {other:?}"))),
        };

        send_frame(&mut stream, &ClientMessage::Auth { token })
            .await
            .map_err(connect_err)?;

        match next_server_message(&mut stream).await.map_err(connect_err)? {
            ServerMessage::Authenticated {} => {}
            ServerMessage::Error { message } => return Err(connect_err(message)),
            other => return Err(connect_err(format!("unexpected auth reply: {other:?}"))),
        }
    }

    debug!(client = %options.client_id, url = %options.url, "connected to broker");
    Ok(stream)
}

async fn run_connection(
    mut stream: WsStream,
    options: ConnectOptions,
    tls: Option<Arc<rustls::ClientConfig>>,
    mut commands: UnboundedReceiver<Command>,
) {
    let mut subscriptions: Vec<Subscription> = Vec::new();

    loop {
        match drive(&mut stream, &mut commands, &mut subscriptions).await {
            Ok(()) => {
                let _ = stream.close(None).await;
                debug!(client = %options.client_id, "connection closed");
                return;
            }
            Err(reason) if options.auto_reconnect => {
                warn!(
                    client = %options.client_id,
                    %reason,
                    "lost connection to the broker, will reconnect"
                );
                match reconnect(&options, tls.clone(), &subscriptions, &commands).await {
                    Some(fresh) => stream = fresh,
                    None => return,
                }
            }
            Err(reason) => {
                warn!(client = %options.client_id, %reason, "lost connection to the broker");
                return;
            }
        }
    }
}

/// Pump commands and frames until the client disconnects (`Ok`) or the
/// socket fails (`Err` with the reason).
async fn drive(
    stream: &mut WsStream,
    commands: &mut UnboundedReceiver<Command>,
    subscriptions: &mut Vec<Subscription>,
) -> Result<(), String> {
    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                None | Some(Command::Disconnect) => return Ok(()),
                Some(Command::Publish { topic, done, .. }) if done.is_closed() => {
                    // queued across a reconnect and already counted as failed
                    debug!(%topic, "dropping publish its caller gave up on");
                }
                Some(Command::Publish { topic, frame, done }) => {
                    if let Err(reason) = send_frame(stream, &frame).await {
                        let _ = done.send(Err(BenchError::Publish { topic, reason: reason.clone() }));
                        return Err(reason);
                    }
                    let _ = done.send(Ok(()));
                }
                Some(Command::Subscribe { topic, sink, done }) => {
                    let frame = ClientMessage::Subscribe { topic: topic.clone() };
                    if let Err(reason) = send_frame(stream, &frame).await {
                        let _ = done.send(Err(BenchError::Subscribe { topic, reason: reason.clone() }));
                        return Err(reason);
                    }
                    subscriptions.push(Subscription { topic, sink });
                    let _ = done.send(Ok(()));
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(msg)) if msg.is_text() => {
                    let text = msg.to_text().map_err(|e| e.to_string())?;
                    handle_text(stream, subscriptions, text).await?;
                }
                Some(Ok(WsMessage::Close(_))) | None => return Err("closed by broker".to_string()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.to_string()),
            },
        }
    }
}

async fn handle_text(
    stream: &mut WsStream,
    subscriptions: &mut Vec<Subscription>,
    text: &str,
) -> Result<(), String> {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(ServerMessage::Message {
            topic,
            payload,
            message_id,
            qos,
            ..
        }) => {
            match decode_payload(&payload) {
                Some(payload) => {
                    let delivery = Delivery {
                        topic: topic.clone(),
                        payload,
                    };
                    // drop sinks whose subscriber has gone away
                    subscriptions
                        .retain(|s| s.topic != topic || s.sink.send(delivery.clone()).is_ok());
                }
                None => warn!(%topic, %message_id, "payload is not valid base64"),
            }
            if qos >= 1 {
                send_frame(stream, &ClientMessage::Ack { message_id }).await?;
            }
        }
        Ok(ServerMessage::Error { message }) => warn!(%message, "broker reported an error"),
        Ok(other) => debug!(?other, "ignoring server message"),
        Err(e) => warn!(
            error = %e,
            frame = %text.chars().take(100).collect::<String>(),
            "invalid server message"
        ),
    }
    Ok(())
}

async fn reconnect(
    options: &ConnectOptions,
    tls: Option<Arc<rustls::ClientConfig>>,
    subscriptions: &[Subscription],
    commands: &UnboundedReceiver<Command>,
) -> Option<WsStream> {
    let mut attempt: u64 = 0;
    loop {
        if commands.is_closed() {
            return None;
        }
        tokio::time::sleep(options.reconnect_delay).await;
        attempt += 1;

        let mut stream = match open_session(options, tls.clone()).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(client = %options.client_id, attempt, error = %e, "reconnect failed");
                continue;
            }
        };

        let mut replayed = Ok(());
        for sub in subscriptions {
            let frame = ClientMessage::Subscribe {
                topic: sub.topic.clone(),
            };
            replayed = send_frame(&mut stream, &frame).await;
            if replayed.is_err() {
                break;
            }
        }

        match replayed {
            Ok(()) => {
                info!(client = %options.client_id, attempt, "reconnected to the broker");
                return Some(stream);
            }
            Err(reason) => {
                warn!(client = %options.client_id, attempt, %reason, "resubscribe failed")
            }
        }
    }
}

async fn send_frame(stream: &mut WsStream, frame: &ClientMessage) -> Result<(), String> {
    let text = serde_json::to_string(frame).map_err(|e| e.to_string())?;
    stream
        .send(WsMessage::text(text))
        .await
        .map_err(|e| e.to_string())
}

async fn next_server_message(stream: &mut WsStream) -> Result<ServerMessage, String> {
    while let Some(frame) = stream.next().await {
        let msg = frame.map_err(|e| e.to_string())?;
        if msg.is_text() {
            let text = msg.to_text().map_err(|e| e.to_string())?;
            return serde_json::from_str(text).map_err(|e| e.to_string());
        }
    }
    Err("connection closed during handshake".to_string())
}
