//! Photo Gallery Render Library
//!
//! Decoded bitmap type and the image decoder that turns downloaded bytes
//! into something a display slot can show.

pub mod bitmap;
pub mod decode;

pub use bitmap::{Bitmap, BYTES_PER_PIXEL};
pub use decode::{decode, DecodeError};
