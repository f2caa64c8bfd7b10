//! Image decoding
//!
//! Turns downloaded bytes into an RGBA [`Bitmap`]. Decoding is CPU-bound and
//! is only ever called from the download worker thread.

use crate::Bitmap;

/// Errors produced while decoding image bytes.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("image data is empty")]
    Empty,
    #[error("malformed or unsupported image data: {0}")]
    Image(#[from] image::ImageError),
}

/// Decode raw image bytes (PNG, JPEG, GIF or WebP) into an RGBA bitmap.
pub fn decode(bytes: &[u8]) -> Result<Bitmap, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();

    Ok(Bitmap::new(width, height, rgba.into_raw()))
}
