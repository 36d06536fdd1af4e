//! Shared types for the raster stage of the pipeline.
//!
//! [`PixelFormat`] describes what the panel can show. [`Canvas`] is the
//! RGB raster handed over by the renderer. [`PackedBuffer`] is the
//! panel-native bitstream produced by the packer.

use crate::error::EpinkError;

// ── Rgb ──────────────────────────────────────────────────────────

/// A single 8-bit-per-channel pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

// ── ChannelOrder ─────────────────────────────────────────────────

/// Byte order of the three channels inside a canvas buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelOrder {
    /// Red, Green, Blue.
    #[default]
    Rgb,
    /// Blue, Green, Red (OpenCV-style buffers).
    Bgr,
}

impl ChannelOrder {
    /// Bytes consumed by a single pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        3
    }

    fn decode(self, px: &[u8]) -> Rgb {
        match self {
            ChannelOrder::Rgb => Rgb::new(px[0], px[1], px[2]),
            ChannelOrder::Bgr => Rgb::new(px[2], px[1], px[0]),
        }
    }

    fn encode(self, rgb: Rgb) -> [u8; 3] {
        match self {
            ChannelOrder::Rgb => [rgb.r, rgb.g, rgb.b],
            ChannelOrder::Bgr => [rgb.b, rgb.g, rgb.r],
        }
    }
}

// ── PixelFormat ──────────────────────────────────────────────────

/// One named entry of the panel's color table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteEntry {
    pub name: String,
    pub code: u8,
}

/// The panel's native color encoding.
///
/// `bit_depth` is derived from the number of distinct codes
/// (`ceil(log2(n))`, at least 1) and every code is checked to fit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFormat {
    width: u32,
    height: u32,
    palette: Vec<PaletteEntry>,
    bit_depth: u8,
}

impl PixelFormat {
    /// Build a format from `(name, code)` pairs.
    pub fn new<I, S>(width: u32, height: u32, palette: I) -> Result<Self, EpinkError>
    where
        I: IntoIterator<Item = (S, u8)>,
        S: Into<String>,
    {
        if width == 0 || height == 0 {
            return Err(EpinkError::InvalidFormat(format!(
                "panel must be at least 1x1, got {width}x{height}"
            )));
        }

        let mut entries: Vec<PaletteEntry> = Vec::new();
        for (name, code) in palette {
            let name = name.into();
            if entries.iter().any(|e| e.name == name) {
                return Err(EpinkError::InvalidFormat(format!(
                    "duplicate color name {name:?}"
                )));
            }
            entries.push(PaletteEntry { name, code });
        }
        if entries.is_empty() {
            return Err(EpinkError::InvalidFormat("empty color table".into()));
        }

        let mut codes: Vec<u8> = entries.iter().map(|e| e.code).collect();
        codes.sort_unstable();
        codes.dedup();
        let bit_depth = bits_for(codes.len());

        if let Some(e) = entries.iter().find(|e| u16::from(e.code) >> bit_depth != 0) {
            return Err(EpinkError::InvalidFormat(format!(
                "code {:#b} of {:?} does not fit in {bit_depth} bit(s)",
                e.code, e.name
            )));
        }

        Ok(Self {
            width,
            height,
            palette: entries,
            bit_depth,
        })
    }

    /// The white/red/black panel: `white=0b11`, `red=0b01`, `black=0b00`.
    pub fn three_color(width: u32, height: u32) -> Result<Self, EpinkError> {
        Self::new(
            width,
            height,
            [("white", 0b11), ("red", 0b01), ("black", 0b00)],
        )
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bits needed for one pixel's code.
    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    pub fn palette(&self) -> &[PaletteEntry] {
        &self.palette
    }

    /// Code registered under `name`.
    pub fn code(&self, name: &str) -> Option<u8> {
        self.palette.iter().find(|e| e.name == name).map(|e| e.code)
    }

    /// First name registered for `code`.
    pub fn name_of(&self, code: u8) -> Option<&str> {
        self.palette
            .iter()
            .find(|e| e.code == code)
            .map(|e| e.name.as_str())
    }

    /// Bytes per packed row at `bits` bits per pixel.
    pub fn bytes_per_row(&self, bits: u8) -> usize {
        (self.width as usize * bits as usize).div_ceil(8)
    }
}

/// `ceil(log2(n))`, never less than 1.
fn bits_for(distinct: usize) -> u8 {
    let mut bits = 1u8;
    while (1usize << bits) < distinct {
        bits += 1;
    }
    bits
}

// ── Canvas ───────────────────────────────────────────────────────

/// An RGB raster as produced by the renderer.
///
/// The `data` buffer holds `height` rows of `width * 3` bytes each with
/// no padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    order: ChannelOrder,
    data: Vec<u8>,
}

impl Canvas {
    /// Wrap an existing buffer.
    pub fn new(
        width: u32,
        height: u32,
        order: ChannelOrder,
        data: Vec<u8>,
    ) -> Result<Self, EpinkError> {
        let expected = width as usize * height as usize * order.bytes_per_pixel();
        if data.len() != expected {
            return Err(EpinkError::InvalidCanvasLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            order,
            data,
        })
    }

    /// A canvas where every pixel is `fill`.
    pub fn filled(width: u32, height: u32, fill: Rgb) -> Self {
        let px = ChannelOrder::Rgb.encode(fill);
        let data = px
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            order: ChannelOrder::Rgb,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    /// Raw channel bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Rgb {
        let offset = self.offset(x, y);
        self.order.decode(&self.data[offset..offset + 3])
    }

    /// Overwrites the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: Rgb) {
        let offset = self.offset(x, y);
        self.data[offset..offset + 3].copy_from_slice(&self.order.encode(rgb));
    }

    /// Iterator over one row, left to right.
    pub fn row(&self, y: u32) -> impl Iterator<Item = Rgb> + '_ {
        let stride = self.width as usize * 3;
        let start = y as usize * stride;
        self.data[start..start + stride]
            .chunks_exact(3)
            .map(move |px| self.order.decode(px))
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        assert!(x < self.width && y < self.height, "pixel ({x},{y}) out of bounds");
        (y as usize * self.width as usize + x as usize) * 3
    }
}

// ── PackedBuffer ─────────────────────────────────────────────────

/// The panel-native bitstream.
///
/// `data.len() == bytes_per_row * height`. Every row starts on a byte
/// boundary; bits are most-significant first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedBuffer {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u8,
    pub bytes_per_row: usize,
    pub data: Vec<u8>,
}

impl PackedBuffer {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// One packed row.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.bytes_per_row;
        &self.data[start..start + self.bytes_per_row]
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_color_needs_two_bits() {
        let fmt = PixelFormat::three_color(800, 480).unwrap();
        assert_eq!(fmt.bit_depth(), 2);
        assert_eq!(fmt.code("white"), Some(0b11));
        assert_eq!(fmt.name_of(0b01), Some("red"));
        assert_eq!(fmt.bytes_per_row(1), 100);
        assert_eq!(fmt.bytes_per_row(2), 200);
    }

    #[test]
    fn bit_depth_from_distinct_codes() {
        let two = PixelFormat::new(8, 1, [("white", 1), ("black", 0)]).unwrap();
        assert_eq!(two.bit_depth(), 1);

        let one = PixelFormat::new(8, 1, [("black", 0)]).unwrap();
        assert_eq!(one.bit_depth(), 1);

        let five = PixelFormat::new(8, 1, (0..5u8).map(|c| (format!("c{c}"), c))).unwrap();
        assert_eq!(five.bit_depth(), 3);
    }

    #[test]
    fn rejects_code_wider_than_depth() {
        let err = PixelFormat::new(8, 1, [("white", 0b100), ("black", 0)]).unwrap_err();
        assert!(matches!(err, EpinkError::InvalidFormat(_)));
    }

    #[test]
    fn rejects_duplicate_names_and_empty_tables() {
        assert!(PixelFormat::new(8, 1, [("a", 0), ("a", 1)]).is_err());
        assert!(PixelFormat::new(8, 1, Vec::<(String, u8)>::new()).is_err());
        assert!(PixelFormat::three_color(0, 10).is_err());
    }

    #[test]
    fn odd_width_rows_round_up() {
        let fmt = PixelFormat::three_color(10, 1).unwrap();
        assert_eq!(fmt.bytes_per_row(1), 2);
        assert_eq!(fmt.bytes_per_row(3), 4);
    }

    #[test]
    fn canvas_length_checked() {
        let err = Canvas::new(2, 2, ChannelOrder::Rgb, vec![0; 11]).unwrap_err();
        assert!(matches!(
            err,
            EpinkError::InvalidCanvasLength {
                expected: 12,
                actual: 11
            }
        ));
    }

    #[test]
    fn bgr_canvas_decodes_channels() {
        let canvas = Canvas::new(1, 1, ChannelOrder::Bgr, vec![10, 20, 30]).unwrap();
        assert_eq!(canvas.pixel(0, 0), Rgb::new(30, 20, 10));
    }

    #[test]
    fn set_pixel_respects_order() {
        let mut canvas = Canvas::new(2, 1, ChannelOrder::Bgr, vec![0; 6]).unwrap();
        canvas.set_pixel(1, 0, Rgb::new(1, 2, 3));
        assert_eq!(canvas.as_bytes(), &[0, 0, 0, 3, 2, 1]);
        assert_eq!(canvas.row(0).nth(1), Some(Rgb::new(1, 2, 3)));
    }

    #[test]
    fn filled_canvas() {
        let canvas = Canvas::filled(3, 2, Rgb::WHITE);
        assert_eq!(canvas.as_bytes().len(), 18);
        assert!(canvas.row(1).all(|px| px == Rgb::WHITE));
    }
}
