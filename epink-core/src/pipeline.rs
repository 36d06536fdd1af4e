//! End-to-end panel update pipeline.
//!
//! Runs the stages strictly in sequence, each consuming the previous
//! stage's output by value:
//!
//! 1. [`ThresholdQuantizer`] + [`RasterPacker`] turn the canvas into a
//!    [`PackedBuffer`].
//! 2. [`FrameCompressor`] shrinks it.
//! 3. A [`SecureEnvelope`] seals it into a [`CipherBlob`].
//! 4. [`ChunkTransport`] publishes the blob as ordered chunk records.
//!
//! All per-run state lives on the [`Pipeline`] value; two pipelines never
//! share buffers.

use tracing::{debug, info};

use crate::chunk::CipherBlob;
use crate::codec::{Codec, FrameCompressor};
use crate::envelope::SecureEnvelope;
use crate::error::EpinkError;
use crate::raster::{
    Canvas, Channel, DEFAULT_THRESHOLD, PackedBuffer, PixelFormat, RasterPacker,
    ThresholdQuantizer,
};
use crate::transport::{ChunkTransport, Publisher, TransmissionReport};

// ── PipelineConfig ───────────────────────────────────────────────

/// Encoding parameters for [`Pipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Quantizer threshold (channels must exceed it).
    pub threshold: u8,
    /// Channel that selects the red ink.
    pub accent: Channel,
    /// Packing depth; `None` uses the palette's own depth.
    pub pack_bits: Option<u8>,
    pub codec: Codec,
    pub level: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            accent: Channel::Blue,
            pack_bits: None,
            codec: Codec::Zlib,
            level: Codec::Zlib.max_level(),
        }
    }
}

// ── Encoded / Delivery ───────────────────────────────────────────

/// Output of [`Pipeline::encode`].
#[derive(Debug, Clone)]
pub struct Encoded {
    pub packed_len: usize,
    pub compressed_len: usize,
    pub blob: CipherBlob,
}

/// Output of [`Pipeline::deliver`].
#[derive(Debug, Clone)]
pub struct Delivery {
    pub packed_len: usize,
    pub compressed_len: usize,
    pub blob_len: usize,
    pub report: TransmissionReport,
}

// ── Pipeline ─────────────────────────────────────────────────────

/// Owns every stage for one panel.
pub struct Pipeline<E, P> {
    format: PixelFormat,
    quantizer: ThresholdQuantizer,
    packer: RasterPacker,
    compressor: FrameCompressor,
    envelope: E,
    transport: ChunkTransport<P>,
}

impl<E: SecureEnvelope, P: Publisher> Pipeline<E, P> {
    pub fn new(
        format: PixelFormat,
        config: &PipelineConfig,
        envelope: E,
        transport: ChunkTransport<P>,
    ) -> Result<Self, EpinkError> {
        let quantizer =
            ThresholdQuantizer::for_format(&format, config.threshold)?.with_accent(config.accent);
        let packer = match config.pack_bits {
            Some(bits) => RasterPacker::with_bit_depth(&format, bits)?,
            None => RasterPacker::for_format(&format),
        };
        let compressor = FrameCompressor::new(config.codec, config.level);

        Ok(Self {
            format,
            quantizer,
            packer,
            compressor,
            envelope,
            transport,
        })
    }

    pub fn format(&self) -> &PixelFormat {
        &self.format
    }

    pub fn packer(&self) -> &RasterPacker {
        &self.packer
    }

    pub fn quantizer(&self) -> &ThresholdQuantizer {
        &self.quantizer
    }

    pub fn transport(&self) -> &ChunkTransport<P> {
        &self.transport
    }

    /// Quantize and pack only.
    pub fn pack(&self, canvas: &Canvas) -> Result<PackedBuffer, EpinkError> {
        self.packer.pack(canvas, &self.quantizer)
    }

    /// Pack, compress and seal `canvas`.
    pub fn encode(&self, canvas: &Canvas) -> Result<Encoded, EpinkError> {
        let packed = self.pack(canvas)?;
        let packed_len = packed.len();

        let compressed = self.compressor.compress(&packed.into_bytes())?;
        let compressed_len = compressed.len();
        debug!(
            packed_len,
            compressed_len,
            codec = ?compressed.codec,
            level = compressed.level,
            "frame compressed"
        );

        let sealed = self.envelope.encrypt(&compressed.into_bytes())?;
        debug_assert_eq!(sealed.len(), self.envelope.ciphertext_len(compressed_len));

        Ok(Encoded {
            packed_len,
            compressed_len,
            blob: CipherBlob::from(sealed),
        })
    }

    /// Encode `canvas` and publish it.
    pub async fn deliver(&self, canvas: &Canvas) -> Result<Delivery, EpinkError> {
        let encoded = self.encode(canvas)?;
        let report = self.transport.send_blob(&encoded.blob).await?;

        info!(
            packed = encoded.packed_len,
            compressed = encoded.compressed_len,
            sealed = encoded.blob.len(),
            parts = report.parts,
            "panel update delivered"
        );
        Ok(Delivery {
            packed_len: encoded.packed_len,
            compressed_len: encoded.compressed_len,
            blob_len: encoded.blob.len(),
            report,
        })
    }

    /// Receiver-side inverse: open, decompress, re-wrap as a packed buffer.
    pub fn decode(&self, blob: &CipherBlob) -> Result<PackedBuffer, EpinkError> {
        let compressed = self.envelope.decrypt(blob.as_bytes())?;
        let data = self.compressor.decompress(&compressed)?;
        if data.len() != self.packer.packed_len() {
            return Err(EpinkError::InvalidPackedLength {
                expected: self.packer.packed_len(),
                actual: data.len(),
            });
        }
        Ok(PackedBuffer {
            width: self.format.width(),
            height: self.format.height(),
            bits_per_pixel: self.packer.bits_per_pixel(),
            bytes_per_row: self.packer.bytes_per_row(),
            data,
        })
    }

    /// [`decode`](Self::decode) and map codes back to pixels.
    pub fn decode_canvas(&self, blob: &CipherBlob) -> Result<Canvas, EpinkError> {
        let packed = self.decode(blob)?;
        self.packer.unpack_canvas(&packed, &self.quantizer)
    }

    /// Release the transport's broker session.
    pub async fn close(&self) -> Result<(), EpinkError> {
        self.transport.close().await
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::AesGcmEnvelope;
    use crate::raster::Rgb;
    use crate::transport::MemoryPublisher;
    use std::sync::Arc;
    use std::time::Duration;

    fn pipeline(
        width: u32,
        height: u32,
        config: PipelineConfig,
    ) -> (Pipeline<AesGcmEnvelope, Arc<MemoryPublisher>>, Arc<MemoryPublisher>) {
        let publisher = Arc::new(MemoryPublisher::new());
        let transport = ChunkTransport::new(Arc::clone(&publisher)).with_pace(Duration::ZERO);
        let p = Pipeline::new(
            PixelFormat::three_color(width, height).unwrap(),
            &config,
            AesGcmEnvelope::from_passphrase("test"),
            transport,
        )
        .unwrap();
        (p, publisher)
    }

    #[test]
    fn encode_decode_round_trip() {
        let (p, _) = pipeline(16, 4, PipelineConfig::default());
        let mut canvas = Canvas::filled(16, 4, Rgb::WHITE);
        canvas.set_pixel(3, 1, Rgb::BLACK);
        canvas.set_pixel(9, 2, Rgb::new(0, 0, 255));

        let encoded = p.encode(&canvas).unwrap();
        assert_eq!(encoded.packed_len, 16);
        assert_eq!(encoded.blob.len(), encoded.compressed_len + 28);
        assert_eq!(p.decode_canvas(&encoded.blob).unwrap(), canvas);
    }

    #[test]
    fn full_panel_decodes() {
        let (p, _) = pipeline(800, 480, PipelineConfig::default());
        let mut canvas = Canvas::filled(800, 480, Rgb::WHITE);
        canvas.set_pixel(799, 479, Rgb::BLACK);
        let encoded = p.encode(&canvas).unwrap();
        assert_eq!(encoded.packed_len, 96_000);
        assert_eq!(p.decode_canvas(&encoded.blob).unwrap(), canvas);
    }

    #[test]
    fn stages_follow_config() {
        let config = PipelineConfig {
            threshold: 200,
            accent: Channel::Red,
            ..PipelineConfig::default()
        };
        let (p, _) = pipeline(20, 3, config);
        assert_eq!((p.format().width(), p.format().height()), (20, 3));
        assert_eq!(p.packer().bits_per_pixel(), 2);
        assert_eq!(p.packer().packed_len(), 5 * 3);
        assert_eq!(p.quantizer().threshold(), 200);
        assert_eq!(p.quantizer().accent(), Channel::Red);
    }

    #[test]
    fn one_bit_plane() {
        let config = PipelineConfig {
            pack_bits: Some(1),
            ..PipelineConfig::default()
        };
        let (p, _) = pipeline(8, 1, config);
        let packed = p.pack(&Canvas::filled(8, 1, Rgb::WHITE)).unwrap();
        assert_eq!(packed.data, vec![0xFF]);

        let encoded = p.encode(&Canvas::filled(8, 1, Rgb::WHITE)).unwrap();
        assert_eq!(p.decode(&encoded.blob).unwrap().data, vec![0xFF]);
    }

    #[test]
    fn wrong_canvas_size_produces_nothing() {
        let (p, publisher) = pipeline(16, 4, PipelineConfig::default());
        let err = p.encode(&Canvas::filled(8, 4, Rgb::WHITE)).unwrap_err();
        assert!(matches!(err, EpinkError::DimensionMismatch { .. }));
        assert!(publisher.is_empty());
    }

    #[test]
    fn decode_rejects_foreign_blob() {
        let (p, _) = pipeline(16, 4, PipelineConfig::default());
        let other = AesGcmEnvelope::from_passphrase("other");
        let blob = CipherBlob::from(other.encrypt(b"whatever").unwrap());
        assert!(matches!(p.decode(&blob), Err(EpinkError::Envelope(_))));
    }

    #[tokio::test]
    async fn deliver_publishes_fifty_parts() {
        let (p, publisher) = pipeline(64, 8, PipelineConfig::default());
        let delivery = p.deliver(&Canvas::filled(64, 8, Rgb::WHITE)).await.unwrap();
        assert_eq!(delivery.report.parts, 50);
        assert_eq!(publisher.len(), 50);
        assert_eq!(p.transport().chunks_sent(), 50);
        assert_eq!(p.transport().topic(), "ACET/image/payload");
        assert_eq!(delivery.blob_len, delivery.compressed_len + 28);
    }

    #[test]
    fn zstd_pipeline() {
        let config = PipelineConfig {
            codec: Codec::Zstd,
            level: 3,
            ..PipelineConfig::default()
        };
        let (p, _) = pipeline(32, 2, config);
        let canvas = Canvas::filled(32, 2, Rgb::BLACK);
        let encoded = p.encode(&canvas).unwrap();
        assert_eq!(p.decode_canvas(&encoded.blob).unwrap(), canvas);
    }
}
