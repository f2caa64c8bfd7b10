//! Photo Gallery Cache Library
//!
//! Bounded in-memory thumbnail cache with LRU eviction against a byte budget
//! and an entry-count cap.

pub mod config;
pub mod ram;

pub use config::{CacheConfig, ConfigError};
pub use ram::{CacheStats, ThumbnailCache};
