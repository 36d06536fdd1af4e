//! # epink-core
//!
//! Encoding and delivery library for networked tri-color e-paper panels.
//!
//! This crate contains:
//! - **Raster**: `PixelFormat`, `Canvas`, `ThresholdQuantizer` and the
//!   MSB-first `RasterPacker`
//! - **Codec**: `FrameCompressor` over zlib (panel default) or zstd
//! - **Envelope**: `SecureEnvelope` and the AES-256-GCM `AesGcmEnvelope`
//! - **Chunk**: equal-stride splitting, the JSON `ChunkRecord` and the
//!   receiver-side `ChunkAssembler`
//! - **Transport**: `Publisher`, paced `ChunkTransport`, `MqttPublisher`
//! - **Pipeline**: `Pipeline`, which owns one instance of every stage
//! - **Error**: `EpinkError`, a typed `thiserror` hierarchy

pub mod chunk;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod pipeline;
pub mod raster;
pub mod transport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use chunk::{
    Chunk, ChunkAssembler, ChunkPolicy, ChunkRecord, CipherBlob, DEFAULT_CHUNK_COUNT, MAX_PARTS,
};
pub use codec::{Codec, CompressedBuffer, FrameCompressor};
pub use envelope::{AesGcmEnvelope, SecureEnvelope};
pub use error::EpinkError;
pub use pipeline::{Delivery, Encoded, Pipeline, PipelineConfig};
pub use raster::{
    Canvas, Channel, ChannelOrder, ColorQuantizer, PackedBuffer, PixelFormat, RasterPacker, Rgb,
    ThresholdQuantizer,
};
pub use transport::{
    BrokerOptions, ChunkTransport, DEFAULT_PACE, DEFAULT_TOPIC, MemoryPublisher, MqttPublisher,
    Publisher, TransmissionReport,
};
