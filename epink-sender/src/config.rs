//! Configuration for the panel sender.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use epink_core::transport::{BrokerOptions, DEFAULT_TOPIC};
use epink_core::{
    Channel, ChunkPolicy, Codec, DEFAULT_CHUNK_COUNT, EpinkError, MAX_PARTS, PipelineConfig,
    PixelFormat,
};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Panel geometry and quantization.
    pub panel: PanelConfig,
    /// Compression settings.
    pub encoding: EncodingConfig,
    /// Envelope key material.
    pub envelope: EnvelopeConfig,
    /// MQTT broker settings.
    pub broker: BrokerConfig,
    /// Chunking and pacing.
    pub transport: TransportConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Panel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub width: u32,
    pub height: u32,
    /// Channels must exceed this to count as lit.
    pub threshold: u8,
    /// Channel that selects red ink: "red", "green" or "blue".
    pub accent: Channel,
    /// Packing depth in bits; 0 uses the palette's own depth.
    pub pack_bits: u8,
}

/// Compression configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// "zlib" or "zstd".
    pub codec: Codec,
    /// Clamped to the codec's range.
    pub level: i32,
}

/// Envelope key material. `key_hex` wins when both are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// 64 hex characters (32-byte AES key).
    pub key_hex: String,
    /// Shared passphrase, key derived with BLAKE3.
    pub passphrase: String,
}

/// Broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// 0, 1 or 2.
    pub qos: u8,
    /// Connect and per-publish deadline in seconds.
    pub timeout_secs: u64,
    pub topic: String,
}

/// How the blob is cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Always `chunk_count` parts.
    Count,
    /// No part larger than `max_chunk_size` bytes.
    Size,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub policy: PolicyKind,
    pub chunk_count: u32,
    pub max_chunk_size: usize,
    /// Gap between two publishes in milliseconds.
    pub pace_ms: u64,
    /// Stamp records with a transmission id.
    pub tag_transmissions: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
            threshold: epink_core::raster::DEFAULT_THRESHOLD,
            accent: Channel::Blue,
            pack_bits: 0,
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: Codec::Zlib,
            level: Codec::Zlib.max_level(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        let opts = BrokerOptions::default();
        Self {
            host: opts.host,
            port: opts.port,
            client_id: opts.client_id,
            keep_alive_secs: opts.keep_alive.as_secs(),
            qos: opts.qos,
            timeout_secs: opts.timeout.as_secs(),
            topic: DEFAULT_TOPIC.into(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Count,
            chunk_count: DEFAULT_CHUNK_COUNT,
            max_chunk_size: 1024,
            pace_ms: 500,
            tag_transmissions: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl SenderConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults; a file that does not parse is
    /// an error.
    pub fn load(path: &Path) -> Result<Self, EpinkError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map_err(|e| {
                EpinkError::Other(format!("invalid config {}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Encoding parameters with out-of-range values pulled back in.
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        let codec = self.encoding.codec;
        let (lo, hi) = codec.levels();
        PipelineConfig {
            threshold: self.panel.threshold,
            accent: self.panel.accent,
            pack_bits: match self.panel.pack_bits {
                0 => None,
                bits => Some(bits.min(8)),
            },
            codec,
            level: self.encoding.level.clamp(lo, hi),
        }
    }

    pub fn pixel_format(&self) -> Result<PixelFormat, EpinkError> {
        PixelFormat::three_color(self.panel.width, self.panel.height)
    }

    pub fn broker_options(&self) -> BrokerOptions {
        BrokerOptions {
            host: self.broker.host.clone(),
            port: self.broker.port,
            client_id: self.broker.client_id.clone(),
            keep_alive: Duration::from_secs(self.broker.keep_alive_secs.max(5)),
            qos: self.broker.qos.min(2),
            timeout: Duration::from_secs(self.broker.timeout_secs.max(1)),
        }
    }

    pub fn chunk_policy(&self) -> ChunkPolicy {
        match self.transport.policy {
            PolicyKind::Count => {
                ChunkPolicy::FixedCount(self.transport.chunk_count.clamp(1, MAX_PARTS))
            }
            PolicyKind::Size => ChunkPolicy::MaxSize(self.transport.max_chunk_size.max(1)),
        }
    }

    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.transport.pace_ms)
    }
}

// ── Tests ────────────────────────────────────────────────────────
