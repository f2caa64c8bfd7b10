//! Combined gallery configuration.

use photo_gallery_cache::{CacheConfig, ConfigError};
use photo_gallery_net::{ApiConfig, ApiConfigError};
use photo_gallery_scheduler::WorkerError;
use photo_gallery_storage::StorageError;

/// Everything needed to run a gallery: cache limits and API access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GalleryConfig {
    pub cache: CacheConfig,
    pub api: ApiConfig,
}

impl GalleryConfig {
    pub fn new(cache: CacheConfig, api: ApiConfig) -> Self {
        Self { cache, api }
    }

    /// Loads both halves from environment variables.
    ///
    /// See [`CacheConfig::from_env`] and [`ApiConfig::from_env`].
    pub fn from_env() -> Result<Self, GalleryError> {
        Ok(Self {
            cache: CacheConfig::from_env()?,
            api: ApiConfig::from_env()?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    #[error("cache configuration: {0}")]
    CacheConfig(#[from] ConfigError),
    #[error("API configuration: {0}")]
    ApiConfig(#[from] ApiConfigError),
    #[error("preferences: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error("failed to spawn page loader: {0}")]
    Spawn(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var("PHOTO_GALLERY_CACHE_ENTRIES", "8");
        env::set_var("PHOTO_GALLERY_API_KEY", "k3y");

        let config = GalleryConfig::from_env().unwrap();
        assert_eq!(config.cache.max_entries, 8);
        assert_eq!(config.api.api_key, "k3y");

        env::remove_var("PHOTO_GALLERY_CACHE_ENTRIES");
        env::remove_var("PHOTO_GALLERY_API_KEY");
    }

    #[test]
    #[serial]
    fn test_from_env_reports_which_half_failed() {
        env::set_var("PHOTO_GALLERY_ENDPOINT", "not a url");

        let err = GalleryConfig::from_env().unwrap_err();
        assert!(matches!(err, GalleryError::ApiConfig(_)));
        assert!(err.to_string().starts_with("API configuration"));

        env::remove_var("PHOTO_GALLERY_ENDPOINT");
    }
}
