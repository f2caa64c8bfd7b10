use photo_gallery_render::Bitmap;
use std::hash::Hash;
use std::sync::Arc;

/// A reusable display cell in the gallery grid.
///
/// Equality and hashing must follow the cell's identity, not the photo it
/// currently shows: the same cell is rebound to many photos as the grid
/// scrolls.
pub trait ThumbnailSlot: Clone + Eq + Hash + Send + 'static {
    /// Show the placeholder image.
    fn bind_placeholder(&self);

    /// Show a decoded thumbnail.
    fn bind_thumbnail(&self, bitmap: Arc<Bitmap>);
}
