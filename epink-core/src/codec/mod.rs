//! Lossless frame compression.
//!
//! Two codecs are available:
//!
//! - **zlib** (default, level 9): what the panel's miniz decoder expects.
//! - **zstd** (levels 1..=19): for receivers that can afford it.
//!
//! The level only trades CPU time for output size; every level
//! round-trips every buffer.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use serde::{Deserialize, Serialize};

use crate::error::EpinkError;

// ── Codec ────────────────────────────────────────────────────────

/// Compression algorithm applied to the packed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Zlib,
    Zstd,
}

impl Codec {
    /// Valid level range for this codec.
    pub const fn levels(self) -> (i32, i32) {
        match self {
            Codec::Zlib => (0, 9),
            Codec::Zstd => (1, 19),
        }
    }

    /// Strongest level; the panel pipeline uses it by default.
    pub const fn max_level(self) -> i32 {
        self.levels().1
    }
}

// ── CompressedBuffer ─────────────────────────────────────────────

/// Output of [`FrameCompressor::compress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedBuffer {
    pub codec: Codec,
    pub level: i32,
    pub data: Vec<u8>,
}

impl CompressedBuffer {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

// ── FrameCompressor ──────────────────────────────────────────────

/// Codec plus level, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCompressor {
    codec: Codec,
    level: i32,
}

impl FrameCompressor {
    /// `level` is clamped into the codec's range.
    pub fn new(codec: Codec, level: i32) -> Self {
        let (lo, hi) = codec.levels();
        Self {
            codec,
            level: level.clamp(lo, hi),
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    /// Compress `buffer` at the configured level.
    pub fn compress(&self, buffer: &[u8]) -> Result<CompressedBuffer, EpinkError> {
        let data = match self.codec {
            Codec::Zlib => {
                let mut enc = ZlibEncoder::new(
                    Vec::with_capacity(buffer.len() / 4 + 16),
                    Compression::new(self.level as u32),
                );
                enc.write_all(buffer)
                    .and_then(|_| enc.finish())
                    .map_err(|e| EpinkError::Compression(format!("zlib encode failed: {e}")))?
            }
            Codec::Zstd => zstd::encode_all(buffer, self.level)
                .map_err(|e| EpinkError::Compression(format!("zstd encode failed: {e}")))?,
        };

        Ok(CompressedBuffer {
            codec: self.codec,
            level: self.level,
            data,
        })
    }

    /// Inverse of [`compress`](Self::compress).
    ///
    /// Any input that is not a complete stream for the codec yields
    /// [`EpinkError::CorruptStream`].
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, EpinkError> {
        // Both codecs emit a header even for empty input.
        if data.is_empty() {
            return Err(EpinkError::CorruptStream("empty stream".into()));
        }

        match self.codec {
            Codec::Zlib => inflate(data),
            Codec::Zstd => zstd::decode_all(data)
                .map_err(|e| EpinkError::CorruptStream(format!("zstd: {e}"))),
        }
    }
}

/// Inflate a zlib stream, insisting on exactly one complete stream with
/// trailer and nothing after it.
fn inflate(data: &[u8]) -> Result<Vec<u8>, EpinkError> {
    let mut d = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len().saturating_mul(4).max(64));

    loop {
        if out.len() == out.capacity() {
            out.reserve(out.capacity().max(64));
        }
        let (in_before, out_before) = (d.total_in(), d.total_out());
        let status = d
            .decompress_vec(&data[in_before as usize..], &mut out, FlushDecompress::None)
            .map_err(|e| EpinkError::CorruptStream(format!("zlib: {e}")))?;

        if status == Status::StreamEnd {
            let consumed = d.total_in() as usize;
            if consumed != data.len() {
                return Err(EpinkError::CorruptStream(format!(
                    "zlib: {} trailing bytes after stream end",
                    data.len() - consumed
                )));
            }
            return Ok(out);
        }

        // Room left in `out` and no progress: the input ran out mid-stream.
        let stalled = d.total_in() == in_before && d.total_out() == out_before;
        if stalled && out.len() < out.capacity() {
            return Err(EpinkError::CorruptStream("zlib: truncated stream".into()));
        }
    }
}

impl Default for FrameCompressor {
    fn default() -> Self {
        Self::new(Codec::Zlib, Codec::Zlib.max_level())
    }
}

// ── Tests ────────────────────────────────────────────────────────
