//! Canvas reconciliation for images of unequal size.
//!
//! Both images end up on a canvas of the larger width and the larger height.
//! Whatever the smaller image does not cover shows a fixed checkerboard, so a
//! size change is counted as a large, deterministic pixel difference instead
//! of being cropped away.

use std::sync::LazyLock;

use crate::types::{CHANNELS, PixelBuffer};

/// Side of one checkerboard square in pixels
const SQUARE: u32 = 8;
const LIGHT: [u8; 4] = [0xee, 0xee, 0xee, 0xff];
const DARK: [u8; 4] = [0xbf, 0xbf, 0xbf, 0xff];

static BACKGROUND: LazyLock<BackgroundPattern> = LazyLock::new(BackgroundPattern::checkerboard);

/// Read-only tile repeated across reconciliation canvases
#[derive(Debug)]
pub struct BackgroundPattern {
    tile: PixelBuffer,
}

impl BackgroundPattern {
    /// The process-wide pattern, built on first use
    pub fn shared() -> &'static BackgroundPattern {
        &BACKGROUND
    }

    fn checkerboard() -> Self {
        let side = SQUARE * 2;
        let mut tile = PixelBuffer::filled(side, side, LIGHT);
        tile.fill_rect(SQUARE, 0, SQUARE, SQUARE, DARK);
        tile.fill_rect(0, SQUARE, SQUARE, SQUARE, DARK);
        Self { tile }
    }

    pub fn tile(&self) -> &PixelBuffer {
        &self.tile
    }

    /// A `width` x `height` canvas covered by the tile, anchored at the origin
    pub fn canvas(&self, width: u32, height: u32) -> PixelBuffer {
        let mut canvas = PixelBuffer::filled(width, height, LIGHT);
        for y in 0..height {
            let source = self.tile.row(y % self.tile.height());
            let pixels = source.chunks_exact(CHANNELS).cycle();
            for (dst, src) in canvas.row_mut(y).chunks_exact_mut(CHANNELS).zip(pixels) {
                dst.copy_from_slice(src);
            }
        }
        canvas
    }
}

/// Bring two images to identical dimensions.
///
/// Images that already agree come back untouched. Otherwise each image
/// smaller than `(max width, max height)` is copied onto a background
/// canvas of that size at `(0, 0)`.
pub fn reconcile(a: PixelBuffer, b: PixelBuffer) -> (PixelBuffer, PixelBuffer) {
    if a.dimensions() == b.dimensions() {
        return (a, b);
    }

    let width = a.width().max(b.width());
    let height = a.height().max(b.height());
    crate::log::debug!(
        a_width = a.width(),
        a_height = a.height(),
        b_width = b.width(),
        b_height = b.height(),
        width,
        height,
        "reconciling canvas sizes"
    );

    (pad_to(a, width, height), pad_to(b, width, height))
}

fn pad_to(image: PixelBuffer, width: u32, height: u32) -> PixelBuffer {
    if image.dimensions() == (width, height) {
        return image;
    }

    let mut canvas = BackgroundPattern::shared().canvas(width, height);
    let span = image.width() as usize * CHANNELS;
    for y in 0..image.height() {
        canvas.row_mut(y)[..span].copy_from_slice(image.row(y));
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    #[test]
    fn equal_sizes_pass_through() {
        let a = PixelBuffer::filled(4, 3, RED);
        let b = PixelBuffer::filled(4, 3, BLUE);
        let (ra, rb) = reconcile(a.clone(), b.clone());
        assert_eq!(ra, a);
        assert_eq!(rb, b);
    }

    #[test]
    fn reconcile_same_image_is_identity() {
        let a = PixelBuffer::filled(7, 9, RED);
        let (x, y) = reconcile(a.clone(), a.clone());
        assert_eq!((x, y), (a.clone(), a));
    }

    #[test]
    fn wider_and_taller_take_the_max_of_each_axis() {
        let wide = PixelBuffer::filled(30, 10, RED);
        let tall = PixelBuffer::filled(20, 25, BLUE);
        let (a, b) = reconcile(wide, tall);
        assert_eq!(a.dimensions(), (30, 25));
        assert_eq!(b.dimensions(), (30, 25));
    }

    #[test]
    fn original_stays_anchored_at_origin() {
        let small = PixelBuffer::filled(3, 2, RED);
        let large = PixelBuffer::filled(20, 20, BLUE);
        let (padded, untouched) = reconcile(small, large.clone());
        assert_eq!(untouched, large);
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(padded.pixel(x, y), Some(RED));
            }
        }
        // Outside the original the checkerboard shows through
        assert_eq!(padded.pixel(3, 0), Some(LIGHT));
        assert_eq!(padded.pixel(8, 0), Some(DARK));
        assert_eq!(padded.pixel(0, 8), Some(DARK));
        assert_eq!(padded.pixel(8, 8), Some(LIGHT));
        assert_eq!(padded.pixel(19, 19), Some(LIGHT));
    }

    #[test]
    fn canvas_tiles_the_pattern() {
        let canvas = BackgroundPattern::shared().canvas(40, 40);
        for (x, y) in [(0, 0), (5, 17), (33, 2), (39, 39)] {
            let tile = BackgroundPattern::shared().tile();
            assert_eq!(canvas.pixel(x, y), tile.pixel(x % 16, y % 16));
        }
    }

    #[test]
    fn shared_pattern_is_a_single_instance() {
        assert!(std::ptr::eq(
            BackgroundPattern::shared(),
            BackgroundPattern::shared()
        ));
    }
}
