//! Decoded RGBA bitmap

use std::fmt;

/// Bytes used by one RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// A decoded thumbnail ready to be bound to a display slot.
///
/// Pixels are stored row-major in RGBA8 format.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Raw pixel data (RGBA8)
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// Create a bitmap from raw RGBA8 pixels.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Create a bitmap filled with a single RGBA color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * BYTES_PER_PIXEL);
        for _ in 0..count {
            pixels.extend_from_slice(&rgba);
        }
        Self::new(width, height, pixels)
    }

    /// Memory cost of this bitmap in bytes, computed from its dimensions.
    ///
    /// This is what the thumbnail cache charges against its byte budget.
    pub fn byte_cost(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// RGBA value at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = self.pixels.get(offset..offset + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

// Pixel buffers are large; keep Debug output to the dimensions.
impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_cost_uses_dimensions() {
        let bitmap = Bitmap::filled(75, 40, [0, 0, 0, 255]);
        assert_eq!(bitmap.byte_cost(), 75 * 40 * 4);
        assert_eq!(bitmap.pixels.len(), bitmap.byte_cost());
    }

    #[test]
    fn test_pixel_lookup() {
        let bitmap = Bitmap::filled(2, 2, [10, 20, 30, 40]);
        assert_eq!(bitmap.pixel(1, 1), Some([10, 20, 30, 40]));
        assert_eq!(bitmap.pixel(2, 0), None);
        assert_eq!(bitmap.pixel(0, 2), None);
    }

    #[test]
    fn test_debug_omits_pixels() {
        let bitmap = Bitmap::filled(3, 3, [1, 2, 3, 4]);
        let text = format!("{:?}", bitmap);
        assert!(text.contains("width: 3"));
        assert!(text.contains("bytes: 36"));
    }
}
