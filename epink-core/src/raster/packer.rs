//! Bit-packing of quantized rasters into the panel's native layout.
//!
//! Each row is packed independently and starts on a byte boundary:
//!
//! ```text
//! bits = 1   | p0 p1 p2 p3 p4 p5 p6 p7 | p8 ...
//! bits = 2   | p0 p0 p1 p1 p2 p2 p3 p3 | p4 ...
//! bits = 3   | p0 p0 p0 p1 p1 p1 p2 p2 | p2 p3 ...   (codes straddle bytes)
//! ```
//!
//! Bits are filled most-significant first. Bits past the last pixel of a
//! row stay zero.

use tracing::warn;

use crate::error::EpinkError;
use crate::raster::quantize::ColorQuantizer;
use crate::raster::types::{Canvas, ChannelOrder, PackedBuffer, PixelFormat};

// ── RasterPacker ─────────────────────────────────────────────────

/// Packs canvases (or pre-quantized code grids) for one panel geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterPacker {
    width: u32,
    height: u32,
    bits: u8,
    mask: u8,
}

impl RasterPacker {
    /// Pack at the format's own bit depth.
    pub fn for_format(format: &PixelFormat) -> Self {
        Self::build(format, format.bit_depth())
    }

    /// Pack at an explicit depth.
    ///
    /// A depth narrower than the format's keeps only the low `bits` bits
    /// of every code (one plane of the palette).
    pub fn with_bit_depth(format: &PixelFormat, bits: u8) -> Result<Self, EpinkError> {
        if !(1..=8).contains(&bits) {
            return Err(EpinkError::InvalidBitDepth(bits));
        }
        if bits < format.bit_depth() {
            warn!(
                bits,
                native = format.bit_depth(),
                "packing below the palette's bit depth; codes will be masked"
            );
        }
        Ok(Self::build(format, bits))
    }

    fn build(format: &PixelFormat, bits: u8) -> Self {
        Self {
            width: format.width(),
            height: format.height(),
            bits,
            mask: (((1u16) << bits) - 1) as u8,
        }
    }

    pub fn bits_per_pixel(&self) -> u8 {
        self.bits
    }

    pub fn bytes_per_row(&self) -> usize {
        (self.width as usize * self.bits as usize).div_ceil(8)
    }

    /// Total packed size in bytes.
    pub fn packed_len(&self) -> usize {
        self.bytes_per_row() * self.height as usize
    }

    /// Quantize and pack `canvas`.
    pub fn pack<Q>(&self, canvas: &Canvas, quantizer: &Q) -> Result<PackedBuffer, EpinkError>
    where
        Q: ColorQuantizer + ?Sized,
    {
        self.check_dimensions(canvas.width(), canvas.height())?;

        let bpr = self.bytes_per_row();
        let mut data = vec![0u8; self.packed_len()];
        for (y, out) in data.chunks_exact_mut(bpr).enumerate() {
            let codes = canvas.row(y as u32).map(|px| quantizer.quantize(px));
            self.pack_row(codes, out);
        }

        Ok(self.wrap(data))
    }

    /// Pack an already-quantized, row-major grid of codes.
    pub fn pack_codes(
        &self,
        width: u32,
        height: u32,
        codes: &[u8],
    ) -> Result<PackedBuffer, EpinkError> {
        self.check_dimensions(width, height)?;
        let expected = width as usize * height as usize;
        if codes.len() != expected {
            return Err(EpinkError::InvalidCanvasLength {
                expected,
                actual: codes.len(),
            });
        }

        let bpr = self.bytes_per_row();
        let mut data = vec![0u8; self.packed_len()];
        let rows = codes.chunks_exact(width as usize);
        for (row, out) in rows.zip(data.chunks_exact_mut(bpr)) {
            self.pack_row(row.iter().copied(), out);
        }

        Ok(self.wrap(data))
    }

    /// Recover the row-major code grid from a packed buffer.
    pub fn unpack(&self, packed: &PackedBuffer) -> Result<Vec<u8>, EpinkError> {
        if packed.data.len() != self.packed_len() {
            return Err(EpinkError::InvalidPackedLength {
                expected: self.packed_len(),
                actual: packed.data.len(),
            });
        }

        let mut codes = Vec::with_capacity(self.width as usize * self.height as usize);
        for y in 0..self.height {
            let row = packed.row(y);
            for x in 0..self.width as usize {
                codes.push(self.read_code(row, x));
            }
        }
        Ok(codes)
    }

    /// Unpack and map every code back to a representative pixel.
    pub fn unpack_canvas<Q>(&self, packed: &PackedBuffer, quantizer: &Q) -> Result<Canvas, EpinkError>
    where
        Q: ColorQuantizer + ?Sized,
    {
        let codes = self.unpack(packed)?;
        let mut data = Vec::with_capacity(codes.len() * 3);
        for code in codes {
            let px = quantizer
                .representative(code)
                .ok_or(EpinkError::UnknownColorCode(code))?;
            data.extend_from_slice(&[px.r, px.g, px.b]);
        }
        Canvas::new(self.width, self.height, ChannelOrder::Rgb, data)
    }

    // ── Internal packing helpers ─────────────────────────────────

    fn check_dimensions(&self, width: u32, height: u32) -> Result<(), EpinkError> {
        if (width, height) != (self.width, self.height) {
            return Err(EpinkError::DimensionMismatch {
                expected: (self.width, self.height),
                actual: (width, height),
            });
        }
        Ok(())
    }

    fn wrap(&self, data: Vec<u8>) -> PackedBuffer {
        PackedBuffer {
            width: self.width,
            height: self.height,
            bits_per_pixel: self.bits,
            bytes_per_row: self.bytes_per_row(),
            data,
        }
    }

    /// Write codes into `out` through a 16-bit window so that a code can
    /// straddle two bytes.
    fn pack_row(&self, codes: impl Iterator<Item = u8>, out: &mut [u8]) {
        let bits = self.bits as usize;
        for (x, code) in codes.enumerate() {
            let bit = x * bits;
            let byte = bit / 8;
            let shift = 16 - bits - bit % 8;
            let window = u16::from(code & self.mask) << shift;

            out[byte] |= (window >> 8) as u8;
            if let Some(next) = out.get_mut(byte + 1) {
                *next |= window as u8;
            }
        }
    }

    fn read_code(&self, row: &[u8], x: usize) -> u8 {
        let bits = self.bits as usize;
        let bit = x * bits;
        let byte = bit / 8;
        let shift = 16 - bits - bit % 8;
        let hi = u16::from(row[byte]);
        let lo = u16::from(row.get(byte + 1).copied().unwrap_or(0));
        (((hi << 8 | lo) >> shift) as u8) & self.mask
    }
}

// ── Tests ────────────────────────────────────────────────────────
