//! Per-pixel difference between two equally sized images.
//!
//! Colours are compared in YIQ space, the model pixelmatch uses: translucent
//! pixels are first blended onto white, then the weighted squared distance of
//! the Y, I and Q components is checked against `MAX_YIQ_DELTA * t * t`.

use crate::errors::DimensionMismatchError;
use crate::options::DiffOptions;
use crate::types::{CHANNELS, PixelBuffer};

/// Largest possible weighted YIQ distance between two colours
pub const MAX_YIQ_DELTA: f64 = 35215.0;

/// Colour of pixels counted as different
pub const DIFF_COLOR: [u8; 4] = [255, 0, 0, 255];
/// Colour of differing pixels skipped as anti-aliasing
pub const AA_COLOR: [u8; 4] = [255, 255, 0, 255];
/// How strongly unchanged pixels show through in the diff image
const GRAY_ALPHA: f64 = 0.1;

/// Output of [`diff`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelDiff {
    /// Differences highlighted over a faded copy of the first image
    pub image: PixelBuffer,
    /// Number of pixels counted as different
    pub diff_count: u64,
}

/// Compare `a` against `b` pixel by pixel.
///
/// The count does not depend on argument order; the faded backdrop of the
/// diff image is taken from `a`.
pub fn diff(
    a: &PixelBuffer,
    b: &PixelBuffer,
    options: &DiffOptions,
) -> Result<PixelDiff, DimensionMismatchError> {
    if a.dimensions() != b.dimensions() {
        return Err(DimensionMismatchError {
            left_width: a.width(),
            left_height: a.height(),
            right_width: b.width(),
            right_height: b.height(),
        });
    }

    let (width, height) = a.dimensions();
    let mut out = PixelBuffer::filled(width, height, [0, 0, 0, 0]);

    // Identical buffers cannot differ anywhere
    if a.as_bytes() == b.as_bytes() {
        for y in 0..height {
            paint_gray_row(a.row(y), out.row_mut(y));
        }
        return Ok(PixelDiff {
            image: out,
            diff_count: 0,
        });
    }

    let threshold = options.threshold.raw();
    let max_delta = MAX_YIQ_DELTA * threshold * threshold;
    let left = Raster::new(a);
    let right = Raster::new(b);
    let mut diff_count = 0u64;

    for y in 0..height {
        for x in 0..width {
            let at = left.offset(x, y);
            let delta = color_delta(left.data, right.data, at, at, false);
            let slot = &mut out.row_mut(y)[x as usize * CHANNELS..(x as usize + 1) * CHANNELS];

            if delta.abs() > max_delta {
                if options.ignore_antialiasing
                    && (antialiased(&left, x, y, &right) || antialiased(&right, x, y, &left))
                {
                    slot.copy_from_slice(&AA_COLOR);
                } else {
                    slot.copy_from_slice(&DIFF_COLOR);
                    diff_count += 1;
                }
            } else {
                slot.copy_from_slice(&gray_pixel(&left.data[at..at + CHANNELS]));
            }
        }
    }

    Ok(PixelDiff {
        image: out,
        diff_count,
    })
}

/// Borrowed view used by the neighbourhood checks
struct Raster<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
}

impl<'a> Raster<'a> {
    fn new(buffer: &'a PixelBuffer) -> Self {
        Self {
            data: buffer.as_bytes(),
            width: buffer.width(),
            height: buffer.height(),
        }
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }

    /// Inclusive 3x3 window around `(x, y)`, clamped to the image
    fn window(&self, x: u32, y: u32) -> (u32, u32, u32, u32) {
        (
            x.saturating_sub(1),
            y.saturating_sub(1),
            (x + 1).min(self.width - 1),
            (y + 1).min(self.height - 1),
        )
    }
}

/// Whether the pixel at `(x, y)` of `img` looks like anti-aliasing.
///
/// A pixel qualifies when it sits between a darker and a brighter neighbour,
/// has at most two identical neighbours, and one of those extreme neighbours
/// sits in a flat region in both images.
fn antialiased(img: &Raster<'_>, x: u32, y: u32, other: &Raster<'_>) -> bool {
    let (x0, y0, x2, y2) = img.window(x, y);
    let at = img.offset(x, y);
    let mut zeroes = u32::from(x == x0 || x == x2 || y == y0 || y == y2);
    let mut min = 0.0;
    let mut max = 0.0;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (0, 0, 0, 0);

    for nx in x0..=x2 {
        for ny in y0..=y2 {
            if nx == x && ny == y {
                continue;
            }
            let delta = color_delta(img.data, img.data, at, img.offset(nx, ny), true);
            if delta == 0.0 {
                zeroes += 1;
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                min_x = nx;
                min_y = ny;
            } else if delta > max {
                max = delta;
                max_x = nx;
                max_y = ny;
            }
        }
    }

    if min == 0.0 || max == 0.0 {
        return false;
    }

    (has_many_siblings(img, min_x, min_y) && has_many_siblings(other, min_x, min_y))
        || (has_many_siblings(img, max_x, max_y) && has_many_siblings(other, max_x, max_y))
}

/// More than two neighbours with exactly the same colour
fn has_many_siblings(img: &Raster<'_>, x: u32, y: u32) -> bool {
    let (x0, y0, x2, y2) = img.window(x, y);
    let at = img.offset(x, y);
    let pixel = &img.data[at..at + CHANNELS];
    let mut zeroes = u32::from(x == x0 || x == x2 || y == y0 || y == y2);

    for nx in x0..=x2 {
        for ny in y0..=y2 {
            if nx == x && ny == y {
                continue;
            }
            let other = img.offset(nx, ny);
            if pixel == &img.data[other..other + CHANNELS] {
                zeroes += 1;
            }
            if zeroes > 2 {
                return true;
            }
        }
    }
    false
}

/// Signed YIQ distance between pixel `k` of `img1` and pixel `m` of `img2`.
///
/// Negative when the first pixel is brighter. With `y_only` only the
/// brightness difference is returned.
fn color_delta(img1: &[u8], img2: &[u8], k: usize, m: usize, y_only: bool) -> f64 {
    let p1 = &img1[k..k + CHANNELS];
    let p2 = &img2[m..m + CHANNELS];
    if p1 == p2 {
        return 0.0;
    }

    let (r1, g1, b1) = blend_white(p1);
    let (r2, g2, b2) = blend_white(p2);

    let y1 = rgb2y(r1, g1, b1);
    let y2 = rgb2y(r2, g2, b2);
    let y = y1 - y2;
    if y_only {
        return y;
    }

    let i = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let q = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);
    let delta = 0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q;
    if y1 > y2 { -delta } else { delta }
}

fn blend_white(pixel: &[u8]) -> (f64, f64, f64) {
    let (r, g, b, a) = (
        f64::from(pixel[0]),
        f64::from(pixel[1]),
        f64::from(pixel[2]),
        pixel[3],
    );
    if a == 255 {
        return (r, g, b);
    }
    let alpha = f64::from(a) / 255.0;
    (blend(r, alpha), blend(g, alpha), blend(b, alpha))
}

#[inline]
fn blend(c: f64, alpha: f64) -> f64 {
    255.0 + (c - 255.0) * alpha
}

#[inline]
fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.29889531 + g * 0.58662247 + b * 0.11448223
}

#[inline]
fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.59597799 - g * 0.27417610 - b * 0.32180189
}

#[inline]
fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.21147017 - g * 0.52261711 + b * 0.31114694
}

/// Faded greyscale of an unchanged pixel
fn gray_pixel(pixel: &[u8]) -> [u8; 4] {
    let luma = rgb2y(
        f64::from(pixel[0]),
        f64::from(pixel[1]),
        f64::from(pixel[2]),
    );
    let alpha = GRAY_ALPHA * f64::from(pixel[3]) / 255.0;
    let value = blend(luma, alpha).round().clamp(0.0, 255.0) as u8;
    [value, value, value, 255]
}

fn paint_gray_row(source: &[u8], target: &mut [u8]) {
    for (src, dst) in source
        .chunks_exact(CHANNELS)
        .zip(target.chunks_exact_mut(CHANNELS))
    {
        dst.copy_from_slice(&gray_pixel(src));
    }
}
