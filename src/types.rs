//! Strongly-typed primitives for snapdiff.
//!
//! - Pixel data only exists as a [`PixelBuffer`] whose length matches its size
//! - Thresholds are validated fractions, never raw `f64` in the differ

use std::fmt;

use image::RgbaImage;

use crate::errors::BufferSizeError;

/// Bytes per RGBA8 pixel
pub const CHANNELS: usize = 4;

/// Error type for invalid threshold values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdError {
    /// Value is NaN
    NaN,
    /// Value is below zero
    Negative,
    /// Value is above one
    AboveOne,
}

impl fmt::Display for ThresholdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdError::NaN => write!(f, "threshold is NaN"),
            ThresholdError::Negative => write!(f, "threshold is negative"),
            ThresholdError::AboveOne => write!(f, "threshold is greater than one"),
        }
    }
}

impl std::error::Error for ThresholdError {}

/// Similarity threshold as a fraction in `[0, 1]`.
///
/// Zero means any colour change is a difference; one tolerates everything
/// short of the maximum YIQ distance. The default is near-exact.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Threshold(f64);

impl Threshold {
    /// Default threshold: near-exact match required
    pub const DEFAULT: Threshold = Threshold(0.001);

    /// Create a Threshold with validation
    pub fn try_new(val: f64) -> Result<Threshold, ThresholdError> {
        if val.is_nan() {
            Err(ThresholdError::NaN)
        } else if val < 0.0 {
            Err(ThresholdError::Negative)
        } else if val > 1.0 {
            Err(ThresholdError::AboveOne)
        } else {
            Ok(Threshold(val))
        }
    }

    #[inline]
    pub fn raw(self) -> f64 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold::DEFAULT
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Axis-aligned rectangle in CSS pixels, as reported by a bounding box query
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Grow the rectangle by `amount` on every side
    pub fn inflate(self, amount: f64) -> Rect {
        Rect {
            x: self.x - amount,
            y: self.y - amount,
            width: self.width + amount * 2.0,
            height: self.height + amount * 2.0,
        }
    }
}

/// RGBA8 raster, row-major with the origin at the top-left.
///
/// The byte length always equals `width * height * 4`; there is no way to
/// build one that breaks this.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA bytes, checking the length against the dimensions
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, BufferSizeError> {
        let expected = byte_len(width, height);
        if data.len() != expected {
            return Err(BufferSizeError {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A buffer where every pixel is `rgba`
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        let data = rgba.repeat(pixels);
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// True when the image has no pixels
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The pixel at `(x, y)`, or `None` outside the image
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = self.offset(x, y);
        let px = &self.data[at..at + CHANNELS];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// One row of pixels as bytes
    pub(crate) fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * CHANNELS;
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    pub(crate) fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.width as usize * CHANNELS;
        let start = y as usize * stride;
        &mut self.data[start..start + stride]
    }

    /// Paint a rectangular block, clipped to the image
    pub(crate) fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, rgba: [u8; 4]) {
        let x_end = x.saturating_add(width).min(self.width);
        let y_end = y.saturating_add(height).min(self.height);
        for row in y..y_end {
            for col in x..x_end {
                let at = self.offset(col, row);
                self.data[at..at + CHANNELS].copy_from_slice(&rgba);
            }
        }
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }
}

impl TryFrom<PixelBuffer> for RgbaImage {
    type Error = BufferSizeError;

    fn try_from(buffer: PixelBuffer) -> Result<Self, Self::Error> {
        let (width, height) = buffer.dimensions();
        let actual = buffer.data.len();
        RgbaImage::from_raw(width, height, buffer.data).ok_or(BufferSizeError {
            width,
            height,
            expected: byte_len(width, height),
            actual,
        })
    }
}

fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * CHANNELS
}
