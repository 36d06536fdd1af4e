//! Loading the externally rendered frame.

use std::path::Path;

use epink_core::{Canvas, ChannelOrder, EpinkError, PixelFormat, Rgb};
use tracing::info;

/// Decode a PNG (or any format `image` was built with) into an RGB canvas.
pub fn load_image(path: &Path) -> Result<Canvas, EpinkError> {
    let rgb = image::open(path)
        .map_err(|e| EpinkError::Other(format!("{}: {e}", path.display())))?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    info!(path = %path.display(), width, height, "image loaded");
    Canvas::new(width, height, ChannelOrder::Rgb, rgb.into_raw())
}

/// All-white frame for clearing the panel.
pub fn blank(format: &PixelFormat) -> Canvas {
    Canvas::filled(format.width(), format.height(), Rgb::WHITE)
}
