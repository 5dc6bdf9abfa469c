//! PNG decoding and encoding for pixel buffers.
//!
//! Everything that touches disk goes through these two functions, so a
//! fixture written by [`encode`] always decodes back to the same pixels.

use std::io::Cursor;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageError};

use crate::errors::CodecError;
use crate::types::PixelBuffer;

/// Decode image bytes into an RGBA8 buffer.
///
/// The format is sniffed from the data; anything that is not RGBA8 is
/// converted.
pub fn decode(bytes: &[u8]) -> Result<PixelBuffer, CodecError> {
    let image = image::load_from_memory(bytes).map_err(|source| match source {
        ImageError::Unsupported(_) => CodecError::Unsupported { source },
        source => CodecError::Decode { source },
    })?;
    Ok(PixelBuffer::from(image.into_rgba8()))
}

/// Encode a buffer as an RGBA8 PNG
pub fn encode(buffer: &PixelBuffer) -> Result<Vec<u8>, CodecError> {
    let (width, height) = buffer.dimensions();
    if buffer.is_empty() {
        return Err(CodecError::EmptyImage { width, height });
    }

    let mut out = Cursor::new(Vec::new());
    PngEncoder::new(&mut out)
        .write_image(buffer.as_bytes(), width, height, ExtendedColorType::Rgba8)
        .map_err(|source| CodecError::Encode {
            width,
            height,
            source,
        })?;
    Ok(out.into_inner())
}
