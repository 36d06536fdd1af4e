//! Domain-specific error types for the epink pipeline.
//!
//! Every stage returns `Result<T, EpinkError>`. Nothing is recovered past
//! a component boundary; the caller decides whether to rerun the record.

use thiserror::Error;

/// The canonical error type for the encoding and delivery pipeline.
#[derive(Debug, Error)]
pub enum EpinkError {
    // ── Raster Errors ────────────────────────────────────────────
    /// The canvas does not match the panel's declared dimensions.
    #[error("dimension mismatch: panel is {expected:?}, canvas is {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// A canvas buffer is not `width * height * 3` bytes long.
    #[error("invalid canvas length: expected {expected}, got {actual}")]
    InvalidCanvasLength { expected: usize, actual: usize },

    /// The pixel format could not be constructed.
    #[error("invalid pixel format: {0}")]
    InvalidFormat(String),

    /// The requested packing depth is outside `1..=8`.
    #[error("invalid bit depth: {0} (expected 1..=8)")]
    InvalidBitDepth(u8),

    /// The quantizer needs a palette entry the format does not declare.
    #[error("palette has no {0:?} entry")]
    MissingColor(&'static str),

    /// An unpacked code does not map back to any palette entry.
    #[error("unknown color code {0:#04b}")]
    UnknownColorCode(u8),

    /// A packed buffer is shorter or longer than its geometry implies.
    #[error("invalid packed length: expected {expected}, got {actual}")]
    InvalidPackedLength { expected: usize, actual: usize },

    // ── Compression Errors ───────────────────────────────────────
    /// The compressed bytes are not a valid stream for the codec.
    #[error("corrupt stream: {0}")]
    CorruptStream(String),

    /// Compression itself failed (I/O inside the encoder).
    #[error("compression failed: {0}")]
    Compression(String),

    // ── Envelope Errors ──────────────────────────────────────────
    /// The envelope key is not 32 bytes.
    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    /// Sealing or opening the envelope failed.
    #[error("envelope error: {0}")]
    Envelope(String),

    // ── Chunk Errors ─────────────────────────────────────────────
    /// Nothing to transmit.
    #[error("cannot chunk an empty blob")]
    EmptyBlob,

    /// The chunk policy resolved to zero parts or zero-sized parts.
    #[error("invalid chunk policy: {0}")]
    InvalidChunkPolicy(&'static str),

    /// A chunk index lies outside `1..=total_parts`.
    #[error("chunk {part} out of range for {total} parts")]
    ChunkOutOfRange { part: u32, total: u32 },

    /// Two chunks of one transmission disagree on the total.
    #[error("total mismatch: expected {expected} parts, chunk says {actual}")]
    TotalMismatch { expected: u32, actual: u32 },

    /// A chunk belongs to a different transmission.
    #[error("chunk from transmission {actual:?} while assembling {expected:?}")]
    ForeignTransmission {
        expected: Option<u32>,
        actual: Option<u32>,
    },

    /// Assembly was requested before every part arrived.
    #[error("incomplete transmission: {missing} of {total} parts missing")]
    IncompleteTransmission { missing: usize, total: u32 },

    // ── Transport Errors ─────────────────────────────────────────
    /// The broker could not be reached or refused a publish.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    // ── Serialization Errors ─────────────────────────────────────
    /// Encoding or decoding of a chunk record failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The I/O layer reported an error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for EpinkError {
    fn from(s: String) -> Self {
        EpinkError::Other(s)
    }
}

impl From<&str> for EpinkError {
    fn from(s: &str) -> Self {
        EpinkError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for EpinkError {
    fn from(e: serde_json::Error) -> Self {
        EpinkError::Encoding(e.to_string())
    }
}

impl From<base64::DecodeError> for EpinkError {
    fn from(e: base64::DecodeError) -> Self {
        EpinkError::Encoding(e.to_string())
    }
}

impl From<rumqttc::ClientError> for EpinkError {
    fn from(e: rumqttc::ClientError) -> Self {
        EpinkError::TransportUnavailable(e.to_string())
    }
}

impl From<rumqttc::ConnectionError> for EpinkError {
    fn from(e: rumqttc::ConnectionError) -> Self {
        EpinkError::TransportUnavailable(e.to_string())
    }
}
