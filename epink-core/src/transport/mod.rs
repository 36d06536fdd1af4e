//! Paced, ordered publication of chunk records.
//!
//! [`ChunkTransport`] cuts a [`CipherBlob`] per its [`ChunkPolicy`],
//! publishes every part to one topic in ascending order and sleeps a
//! fixed interval between publishes. There is no acknowledgement,
//! retransmission or cancellation: the first failed publish aborts the
//! transmission and is returned to the caller.
//!
//! | Module | Purpose                                  |
//! |--------|------------------------------------------|
//! | `mqtt` | [`Publisher`] over an MQTT broker session |

pub mod mqtt;

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use crate::chunk::{self, ChunkPolicy, CipherBlob};
use crate::error::EpinkError;

pub use mqtt::{BrokerOptions, MqttPublisher};

/// Topic the panel gateway subscribes to.
pub const DEFAULT_TOPIC: &str = "ACET/image/payload";

/// Gap between two publishes.
pub const DEFAULT_PACE: Duration = Duration::from_millis(500);

// ── Publisher ────────────────────────────────────────────────────

/// One message sink on a publish/subscribe link.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `payload` on `topic`. Any failure maps to
    /// [`EpinkError::TransportUnavailable`].
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), EpinkError>;

    /// Flush and release the session.
    async fn close(&self) -> Result<(), EpinkError> {
        Ok(())
    }
}

// ── TransmissionReport ───────────────────────────────────────────

/// Summary of one blob's transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmissionReport {
    pub transmission: Option<u32>,
    pub parts: u32,
    pub stride: usize,
    pub blob_len: usize,
    /// Serialized bytes handed to the publisher.
    pub wire_bytes: usize,
}

// ── ChunkTransport ───────────────────────────────────────────────

/// Sender half of the chunk protocol.
pub struct ChunkTransport<P> {
    publisher: P,
    topic: String,
    policy: ChunkPolicy,
    pace: Duration,
    tag_transmissions: bool,
    next_transmission: AtomicU32,
    /// Totals since construction.
    chunks_sent: AtomicU64,
    bytes_sent: AtomicU64,
}

impl<P: Publisher> ChunkTransport<P> {
    /// Default topic, 50 parts, 500 ms pace, untagged records.
    pub fn new(publisher: P) -> Self {
        Self {
            publisher,
            topic: DEFAULT_TOPIC.to_string(),
            policy: ChunkPolicy::default(),
            pace: DEFAULT_PACE,
            tag_transmissions: false,
            next_transmission: AtomicU32::new(1),
            chunks_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_policy(mut self, policy: ChunkPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    /// Stamp every record with a per-transmission id.
    pub fn with_transmission_ids(mut self, enabled: bool) -> Self {
        self.tag_transmissions = enabled;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn chunks_sent(&self) -> u64 {
        self.chunks_sent.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Publish `blob` as an ordered sequence of chunk records.
    pub async fn send_blob(&self, blob: &CipherBlob) -> Result<TransmissionReport, EpinkError> {
        let parts = self.policy.parts_for(blob.len())?;
        let chunks = chunk::split(blob, parts)?;
        let transmission = self
            .tag_transmissions
            .then(|| self.next_transmission.fetch_add(1, Ordering::SeqCst));

        info!(
            topic = %self.topic,
            blob_len = blob.len(),
            parts,
            ?transmission,
            "starting transmission"
        );

        let mut wire_bytes = 0usize;
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 && !self.pace.is_zero() {
                tokio::time::sleep(self.pace).await;
            }

            let payload = Bytes::from(chunk.to_record(transmission).to_json()?);
            let len = payload.len();
            self.publisher.publish(&self.topic, payload).await?;

            wire_bytes += len;
            self.chunks_sent.fetch_add(1, Ordering::Relaxed);
            self.bytes_sent.fetch_add(len as u64, Ordering::Relaxed);
            debug!(
                part = chunk.part,
                total = chunk.total_parts,
                fragment = chunk.fragment.len(),
                "chunk published"
            );
        }

        info!(parts, wire_bytes, "transmission complete");
        Ok(TransmissionReport {
            transmission,
            parts,
            stride: chunk::stride(blob.len(), parts),
            blob_len: blob.len(),
            wire_bytes,
        })
    }

    /// Close the underlying publisher.
    pub async fn close(&self) -> Result<(), EpinkError> {
        self.publisher.close().await
    }
}

// ── MemoryPublisher ──────────────────────────────────────────────

/// Records every publish in memory. Backs dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    messages: Mutex<Vec<(String, Bytes)>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of `(topic, payload)` pairs in publish order.
    pub fn messages(&self) -> Vec<(String, Bytes)> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), EpinkError> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((topic.to_string(), payload));
        Ok(())
    }
}

#[async_trait]
impl<P: Publisher + ?Sized> Publisher for std::sync::Arc<P> {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), EpinkError> {
        (**self).publish(topic, payload).await
    }

    async fn close(&self) -> Result<(), EpinkError> {
        (**self).close().await
    }
}

// ── Tests ────────────────────────────────────────────────────────
