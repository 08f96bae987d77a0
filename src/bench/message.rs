//! Benchmark messages
//!
//! Every payload starts with an 8-byte little-endian epoch-millisecond
//! timestamp written right before the message is published. Subscribers read
//! it back to compute delivery latency, so the measurement does not depend on
//! the payload size or on anything the broker adds to the frame.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::utils::BenchError;

/// Bytes reserved at the start of each payload for the send timestamp.
pub const TIMESTAMP_LEN: usize = 8;

/// Bounds for randomly sized payloads, `[MIN, MAX)` bytes.
pub const MIN_RANDOM_SIZE: usize = 7000;
pub const MAX_RANDOM_SIZE: usize = 600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Qos {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl TryFrom<u8> for Qos {
    type Error = BenchError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Qos::AtMostOnce),
            1 => Ok(Qos::AtLeastOnce),
            2 => Ok(Qos::ExactlyOnce),
            other => Err(BenchError::invalid(format!(
                "qos must be 0, 1 or 2, given: {other}"
            ))),
        }
    }
}

impl From<Qos> for u8 {
    fn from(qos: Qos) -> Self {
        qos as u8
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub qos: Qos,
    pub payload: Vec<u8>,
    pub sent: Option<DateTime<Utc>>,
    pub delivered: Option<DateTime<Utc>>,
    pub error: bool,
}

impl Message {
    /// A zero-filled message of `size` bytes, never shorter than the prefix.
    pub fn new(topic: &str, qos: Qos, size: usize) -> Self {
        Self {
            topic: topic.to_string(),
            qos,
            payload: vec![0; size.max(TIMESTAMP_LEN)],
            sent: None,
            delivered: None,
            error: false,
        }
    }

    /// A message carrying `body` after the timestamp prefix.
    pub fn with_body(topic: &str, qos: Qos, body: &[u8]) -> Self {
        let mut msg = Self::new(topic, qos, TIMESTAMP_LEN + body.len());
        msg.payload[TIMESTAMP_LEN..].copy_from_slice(body);
        msg
    }

    /// Record the send time and write it into the payload prefix.
    pub fn stamp(&mut self, now: DateTime<Utc>) {
        encode_timestamp(&mut self.payload, now.timestamp_millis() as u64);
        self.sent = Some(now);
    }
}

pub fn encode_timestamp(payload: &mut [u8], epoch_ms: u64) {
    payload[..TIMESTAMP_LEN].copy_from_slice(&epoch_ms.to_le_bytes());
}

/// Read the send timestamp back; `None` for payloads shorter than the prefix.
pub fn decode_timestamp(payload: &[u8]) -> Option<u64> {
    let prefix: [u8; TIMESTAMP_LEN] = payload.get(..TIMESTAMP_LEN)?.try_into().ok()?;
    Some(u64::from_le_bytes(prefix))
}

/// Delivery latency in milliseconds. Clock skew between hosts is not
/// corrected; a receive time before the send time wraps around.
pub fn latency_ms(received_ms: u64, payload: &[u8]) -> Option<u64> {
    decode_timestamp(payload).map(|sent| received_ms.wrapping_sub(sent))
}

/// Seed derived from a worker id: the sum of its character codes.
///
/// Ids with the same characters in a different order collide.
pub fn seed_from_id(id: &str) -> u64 {
    id.chars().map(|c| c as u64).sum()
}

/// Parameters for building a publisher's message batch.
#[derive(Debug, Clone)]
pub struct BatchSpec<'a> {
    pub topic: &'a str,
    pub qos: Qos,
    pub count: usize,
    /// Fixed size; 0 draws each size from `[MIN_RANDOM_SIZE, MAX_RANDOM_SIZE)`.
    pub size: usize,
    pub body: &'a [u8],
    pub seed: u64,
}

/// Build the whole batch up front so no allocation happens while publishing.
pub fn generate_batch(spec: &BatchSpec<'_>) -> Vec<Message> {
    if !spec.body.is_empty() {
        return (0..spec.count)
            .map(|_| Message::with_body(spec.topic, spec.qos, spec.body))
            .collect();
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    (0..spec.count)
        .map(|_| {
            let size = if spec.size == 0 {
                rng.gen_range(MIN_RANDOM_SIZE..MAX_RANDOM_SIZE)
            } else {
                spec.size
            };
            Message::new(spec.topic, spec.qos, size)
        })
        .collect()
}
