//! Raster stage: palette description, quantization and bit-packing.
//!
//! | Module     | Purpose                                              |
//! |------------|------------------------------------------------------|
//! | `types`    | `PixelFormat`, `Canvas`, `PackedBuffer`              |
//! | `quantize` | RGB → palette code decision tree                     |
//! | `packer`   | MSB-first packing at the palette's bit depth         |

pub mod packer;
pub mod quantize;
pub mod types;

pub use packer::RasterPacker;
pub use quantize::{Channel, ColorQuantizer, DEFAULT_THRESHOLD, ThresholdQuantizer};
pub use types::{Canvas, ChannelOrder, PackedBuffer, PaletteEntry, PixelFormat, Rgb};
