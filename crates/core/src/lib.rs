//! Photo Gallery Core Library
//!
//! Gallery controller: pagination over the photo source, cache-first slot
//! binding, and delivery of downloaded thumbnails on the driving thread.

pub mod config;
pub mod controller;
pub mod slot;

pub use config::{GalleryConfig, GalleryError};
pub use controller::GalleryController;
pub use slot::ThumbnailSlot;
