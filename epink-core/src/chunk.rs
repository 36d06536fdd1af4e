//! Splitting of a sealed blob into labeled chunks, and reassembly.
//!
//! ## Split
//!
//! For a blob of `L` bytes and `N` parts, `stride = ceil(L / N)` and part
//! `i` (1-based) covers `[(i - 1) * stride, i * stride)` clipped to `L`.
//! Exactly `N` parts are produced; trailing parts may be short, or empty
//! when `N` does not divide the blob evenly.
//!
//! ## Wire record (JSON)
//!
//! ```text
//! { "part": 3, "total_parts": 50, "data": "<base64 fragment>", "transmission": 7 }
//! ```
//!
//! `transmission` is omitted unless tagging is enabled. `data` is the
//! standard base64 of that part's fragment alone.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::EpinkError;

/// Number of parts the panel firmware expects by default.
pub const DEFAULT_CHUNK_COUNT: u32 = 50;

/// Upper bound on `total_parts`, enforced by sender and receiver.
pub const MAX_PARTS: u32 = 65_536;

// ── CipherBlob ───────────────────────────────────────────────────

/// Opaque sealed payload. Cloning shares the underlying buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherBlob(Bytes);

impl CipherBlob {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for CipherBlob {
    fn from(v: Vec<u8>) -> Self {
        Self(Bytes::from(v))
    }
}

impl From<Bytes> for CipherBlob {
    fn from(b: Bytes) -> Self {
        Self(b)
    }
}

// ── ChunkPolicy ──────────────────────────────────────────────────

/// How many parts a blob is cut into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPolicy {
    /// Always `n` parts regardless of blob size.
    FixedCount(u32),
    /// As many parts as needed so none exceeds `max` bytes.
    MaxSize(usize),
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        ChunkPolicy::FixedCount(DEFAULT_CHUNK_COUNT)
    }
}

impl ChunkPolicy {
    /// Part count for a blob of `len` bytes.
    pub fn parts_for(&self, len: usize) -> Result<u32, EpinkError> {
        match *self {
            ChunkPolicy::FixedCount(0) => Err(EpinkError::InvalidChunkPolicy("zero parts")),
            ChunkPolicy::FixedCount(n) if n > MAX_PARTS => {
                Err(EpinkError::InvalidChunkPolicy("too many parts"))
            }
            ChunkPolicy::FixedCount(n) => Ok(n),
            ChunkPolicy::MaxSize(0) => Err(EpinkError::InvalidChunkPolicy("zero-byte parts")),
            ChunkPolicy::MaxSize(max) => u32::try_from(len.div_ceil(max).max(1))
                .ok()
                .filter(|&n| n <= MAX_PARTS)
                .ok_or(EpinkError::InvalidChunkPolicy("too many parts")),
        }
    }
}

// ── Chunk ────────────────────────────────────────────────────────

/// One fragment of a blob with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based position.
    pub part: u32,
    pub total_parts: u32,
    pub fragment: Bytes,
}

impl Chunk {
    /// Wrap into the wire record.
    pub fn to_record(&self, transmission: Option<u32>) -> ChunkRecord {
        ChunkRecord {
            part: self.part,
            total_parts: self.total_parts,
            data: STANDARD.encode(&self.fragment),
            transmission,
        }
    }
}

/// Cut `blob` into exactly `parts` chunks.
pub fn split(blob: &CipherBlob, parts: u32) -> Result<Vec<Chunk>, EpinkError> {
    if blob.is_empty() {
        return Err(EpinkError::EmptyBlob);
    }
    if parts == 0 {
        return Err(EpinkError::InvalidChunkPolicy("zero parts"));
    }
    if parts > MAX_PARTS {
        return Err(EpinkError::InvalidChunkPolicy("too many parts"));
    }

    let len = blob.len();
    let stride = stride(len, parts);
    Ok((0..parts as usize)
        .map(|i| {
            let start = (i * stride).min(len);
            let end = ((i + 1) * stride).min(len);
            Chunk {
                part: i as u32 + 1,
                total_parts: parts,
                fragment: blob.0.slice(start..end),
            }
        })
        .collect())
}

/// `ceil(len / parts)`.
pub fn stride(len: usize, parts: u32) -> usize {
    len.div_ceil(parts as usize)
}

// ── ChunkRecord ──────────────────────────────────────────────────

/// Serialized form published to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub part: u32,
    pub total_parts: u32,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission: Option<u32>,
}

impl ChunkRecord {
    pub fn to_json(&self) -> Result<Vec<u8>, EpinkError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, EpinkError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Decoded fragment bytes.
    pub fn fragment(&self) -> Result<Vec<u8>, EpinkError> {
        Ok(STANDARD.decode(&self.data)?)
    }
}

// ── ChunkAssembler ───────────────────────────────────────────────

/// Receiver-side reassembly of one transmission.
///
/// Accepts records in any order. Duplicates are ignored; records that
/// disagree on the total or belong to another transmission are
/// rejected.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    total: u32,
    transmission: Option<u32>,
    parts: Vec<Option<Vec<u8>>>,
    received: usize,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one record. Returns `true` once every part is present.
    pub fn accept(&mut self, record: &ChunkRecord) -> Result<bool, EpinkError> {
        if record.total_parts == 0
            || record.total_parts > MAX_PARTS
            || record.part == 0
            || record.part > record.total_parts
        {
            return Err(EpinkError::ChunkOutOfRange {
                part: record.part,
                total: record.total_parts,
            });
        }
        let fragment = record.fragment()?;

        if self.parts.is_empty() {
            self.total = record.total_parts;
            self.transmission = record.transmission;
            self.parts = vec![None; record.total_parts as usize];
        } else if record.transmission != self.transmission {
            return Err(EpinkError::ForeignTransmission {
                expected: self.transmission,
                actual: record.transmission,
            });
        } else if record.total_parts != self.total {
            return Err(EpinkError::TotalMismatch {
                expected: self.total,
                actual: record.total_parts,
            });
        }

        let slot = &mut self.parts[record.part as usize - 1];
        if slot.is_none() {
            *slot = Some(fragment);
            self.received += 1;
        }

        Ok(self.is_complete())
    }

    pub fn is_complete(&self) -> bool {
        !self.parts.is_empty() && self.received == self.parts.len()
    }

    /// Transmission id carried by the first record, if any.
    pub fn transmission(&self) -> Option<u32> {
        self.transmission
    }

    /// 1-based indices still outstanding.
    pub fn missing(&self) -> Vec<u32> {
        self.parts
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_none())
            .map(|(i, _)| i as u32 + 1)
            .collect()
    }

    /// Concatenate the fragments in ascending part order.
    pub fn assemble(self) -> Result<CipherBlob, EpinkError> {
        if !self.is_complete() {
            return Err(EpinkError::IncompleteTransmission {
                missing: self.parts.len() - self.received,
                total: self.total,
            });
        }
        let blob: Vec<u8> = self.parts.into_iter().flatten().flatten().collect();
        Ok(CipherBlob::from(blob))
    }
}

// ── Tests ────────────────────────────────────────────────────────
