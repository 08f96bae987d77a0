//! Wire protocol spoken to popsub-style brokers.
//!
//! Frames are JSON text messages tagged by `type`. Payloads are arbitrary
//! bytes on the benchmark side, so they travel base64-encoded in the
//! `payload` string.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "auth")]
    Auth { token: String },
    #[serde(rename = "login")]
    Login { username: String, password: String },
    #[serde(rename = "subscribe")]
    Subscribe { topic: String },
    #[serde(rename = "publish")]
    Publish {
        topic: String,
        payload: String,
        message_id: Option<String>,
        qos: Option<u8>,
    },
    #[serde(rename = "ack")]
    Ack { message_id: String },
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "login_response")]
    LoginResponse { token: String },
    #[serde(rename = "authenticated")]
    Authenticated {},
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "message")]
    Message {
        topic: String,
        payload: String,
        timestamp: i64,
        message_id: String,
        qos: u8,
    },
}

impl ClientMessage {
    pub fn publish(topic: &str, payload: &[u8], qos: u8) -> Self {
        ClientMessage::Publish {
            topic: topic.to_string(),
            payload: encode_payload(payload),
            message_id: Some(uuid::Uuid::new_v4().to_string()),
            qos: Some(qos),
        }
    }
}

pub fn encode_payload(payload: &[u8]) -> String {
    STANDARD.encode(payload)
}

pub fn decode_payload(payload: &str) -> Option<Vec<u8>> {
    STANDARD.decode(payload).ok()
}
