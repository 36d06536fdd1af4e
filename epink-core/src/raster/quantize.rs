//! RGB → palette code mapping.
//!
//! The three-color panel uses a fixed decision tree rather than a
//! nearest-color search, and boundary pixels depend on its branch order:
//!
//! 1. every channel above the threshold → white
//! 2. otherwise the accent channel (blue by default) above the threshold → red
//! 3. otherwise → black

use serde::{Deserialize, Serialize};

use crate::error::EpinkError;
use crate::raster::types::{PixelFormat, Rgb};

/// Threshold used when none is configured.
pub const DEFAULT_THRESHOLD: u8 = 128;

// ── ColorQuantizer ───────────────────────────────────────────────

/// Maps a pixel to a palette code. Must be total and side-effect free.
pub trait ColorQuantizer {
    fn quantize(&self, pixel: Rgb) -> u8;

    /// A pixel that quantizes back to `code`, used to rebuild a canvas
    /// from unpacked codes.
    fn representative(&self, code: u8) -> Option<Rgb>;
}

// ── Channel ──────────────────────────────────────────────────────

/// A single color channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Red,
    Green,
    #[default]
    Blue,
}

impl Channel {
    pub const fn of(self, px: Rgb) -> u8 {
        match self {
            Channel::Red => px.r,
            Channel::Green => px.g,
            Channel::Blue => px.b,
        }
    }

    const fn only(self, value: u8) -> Rgb {
        match self {
            Channel::Red => Rgb::new(value, 0, 0),
            Channel::Green => Rgb::new(0, value, 0),
            Channel::Blue => Rgb::new(0, 0, value),
        }
    }
}

// ── ThresholdQuantizer ───────────────────────────────────────────

/// White/red/black threshold classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdQuantizer {
    white: u8,
    red: u8,
    black: u8,
    threshold: u8,
    accent: Channel,
}

impl ThresholdQuantizer {
    /// Look up the `white`, `red` and `black` codes in `format`.
    pub fn for_format(format: &PixelFormat, threshold: u8) -> Result<Self, EpinkError> {
        let lookup = |name: &'static str| format.code(name).ok_or(EpinkError::MissingColor(name));
        Ok(Self {
            white: lookup("white")?,
            red: lookup("red")?,
            black: lookup("black")?,
            threshold,
            accent: Channel::default(),
        })
    }

    /// Pick the channel that triggers the red ink.
    pub fn with_accent(mut self, accent: Channel) -> Self {
        self.accent = accent;
        self
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn accent(&self) -> Channel {
        self.accent
    }

    /// Classify `pixel` against an explicit `threshold`.
    pub fn classify(&self, pixel: Rgb, threshold: u8) -> u8 {
        if pixel.r > threshold && pixel.g > threshold && pixel.b > threshold {
            self.white
        } else if self.accent.of(pixel) > threshold {
            self.red
        } else {
            self.black
        }
    }
}

impl ColorQuantizer for ThresholdQuantizer {
    fn quantize(&self, pixel: Rgb) -> u8 {
        self.classify(pixel, self.threshold)
    }

    fn representative(&self, code: u8) -> Option<Rgb> {
        // Checked in branch order so shared codes resolve like `classify`.
        if code == self.white {
            Some(Rgb::WHITE)
        } else if code == self.red {
            Some(self.accent.only(255))
        } else if code == self.black {
            Some(Rgb::BLACK)
        } else {
            None
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn quantizer() -> ThresholdQuantizer {
        let fmt = PixelFormat::three_color(8, 1).unwrap();
        ThresholdQuantizer::for_format(&fmt, DEFAULT_THRESHOLD).unwrap()
    }

    #[test]
    fn basic_colors() {
        let q = quantizer();
        assert_eq!(q.quantize(Rgb::WHITE), 0b11);
        assert_eq!(q.quantize(Rgb::BLACK), 0b00);
        assert_eq!(q.quantize(Rgb::new(0, 0, 255)), 0b01);
    }

    #[test]
    fn exactly_at_threshold_is_black() {
        let q = quantizer();
        assert_eq!(q.quantize(Rgb::new(128, 128, 128)), 0b00);
    }

    #[test]
    fn white_check_runs_before_accent_check() {
        let q = quantizer();
        // Blue alone is high but so is everything else: white wins.
        assert_eq!(q.quantize(Rgb::new(129, 129, 129)), 0b11);
        // One channel at the threshold drops out of white into the accent check.
        assert_eq!(q.quantize(Rgb::new(128, 200, 200)), 0b01);
        assert_eq!(q.quantize(Rgb::new(200, 200, 128)), 0b00);
    }

    #[test]
    fn disagrees_with_nearest_color() {
        let q = quantizer();
        // Pure red is nearest to red but the tree classifies it black.
        assert_eq!(q.quantize(Rgb::new(255, 0, 0)), 0b00);
    }

    #[test]
    fn classify_uses_given_threshold() {
        let q = quantizer();
        assert_eq!(q.classify(Rgb::new(100, 100, 100), 99), 0b11);
        assert_eq!(q.classify(Rgb::new(100, 100, 100), 100), 0b00);
    }

    #[test]
    fn red_accent_channel() {
        let q = quantizer().with_accent(Channel::Red);
        assert_eq!(q.quantize(Rgb::new(255, 0, 0)), 0b01);
        assert_eq!(q.representative(0b01), Some(Rgb::new(255, 0, 0)));
    }

    #[test]
    fn representatives_quantize_back() {
        let q = quantizer();
        for code in [0b11, 0b01, 0b00] {
            let px = q.representative(code).unwrap();
            assert_eq!(q.quantize(px), code);
        }
        assert_eq!(q.representative(0b10), None);
    }

    #[test]
    fn missing_color_reported() {
        let fmt = PixelFormat::new(8, 1, [("white", 1), ("black", 0)]).unwrap();
        let err = ThresholdQuantizer::for_format(&fmt, 128).unwrap_err();
        assert!(matches!(err, EpinkError::MissingColor("red")));
    }
}
