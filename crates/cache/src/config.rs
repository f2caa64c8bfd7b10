//! Cache configuration for the thumbnail cache limits.
//!
//! Configuration can be loaded from a file, environment variables, or
//! created programmatically.

use std::fs;
use std::io;
use std::path::Path;

/// Configuration for the thumbnail cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Byte budget for decoded thumbnails
    pub max_bytes: usize,
    /// Entry-count cap, enforced separately from the byte budget
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: 4 * 1024 * 1024, // 4 MiB
            max_entries: 60,
        }
    }
}

impl CacheConfig {
    pub fn new(max_bytes: usize, max_entries: usize) -> Self {
        Self {
            max_bytes,
            max_entries,
        }
    }

    pub fn with_max_bytes(mut self, bytes: usize) -> Self {
        self.max_bytes = bytes;
        self
    }

    /// Sets the byte budget in kibibytes, saturating at `usize::MAX` bytes.
    pub fn with_max_kb(mut self, kb: usize) -> Self {
        self.max_bytes = kb.saturating_mul(1024);
        self
    }

    pub fn with_max_entries(mut self, entries: usize) -> Self {
        self.max_entries = entries;
        self
    }

    /// Returns the byte budget in kibibytes.
    pub fn max_kb(&self) -> usize {
        self.max_bytes / 1024
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PHOTO_GALLERY_CACHE_KB`: byte budget in KiB (default: 4096)
    /// - `PHOTO_GALLERY_CACHE_ENTRIES`: entry cap (default: 60)
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PHOTO_GALLERY_CACHE_KB") {
            config.max_bytes = parse_kb("PHOTO_GALLERY_CACHE_KB", &val)?;
        }

        if let Ok(val) = std::env::var("PHOTO_GALLERY_CACHE_ENTRIES") {
            config.max_entries = parse_usize("PHOTO_GALLERY_CACHE_ENTRIES", &val)?;
        }

        Ok(config)
    }

    /// Loads configuration from a `key = value` file.
    ///
    /// Expected file format:
    /// ```toml
    /// cache_bytes = 4194304
    /// cache_entries = 60
    /// ```
    ///
    /// `cache_kb` is accepted in place of `cache_bytes`. When both appear,
    /// the later line wins.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for line in toml_str.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"');

                match key {
                    "cache_bytes" => config.max_bytes = parse_usize(key, value)?,
                    "cache_kb" => config.max_bytes = parse_kb(key, value)?,
                    "cache_entries" => config.max_entries = parse_usize(key, value)?,
                    _ => {} // Ignore unknown keys
                }
            }
        }

        Ok(config)
    }

    /// Saves configuration to a file readable by [`CacheConfig::from_file`].
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_toml())?;
        Ok(())
    }

    fn to_toml(&self) -> String {
        format!(
            "# Photo Gallery Cache Configuration\n\
             cache_bytes = {}\n\
             cache_entries = {}\n",
            self.max_bytes,
            self.max_entries
        )
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

fn parse_kb(key: &str, value: &str) -> Result<usize, ConfigError> {
    parse_usize(key, value)?
        .checked_mul(1024)
        .ok_or_else(|| ConfigError::InvalidValue(key.to_string()))
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for configuration key: {0}")]
    InvalidValue(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
