//! Photo Gallery Networking
//!
//! Blocking byte fetcher used by the thumbnail worker, plus the paginated
//! photo metadata client that feeds the gallery.

pub mod config;
pub mod fetch;
pub mod flickr;

pub use config::{ApiConfig, ApiConfigError, DEFAULT_ENDPOINT};
pub use fetch::{FetchBytes, FetchError, HttpFetcher};
pub use flickr::{parse_items, FlickrClient, FlickrMethod, GalleryItem, MetadataError, PhotoSource};
