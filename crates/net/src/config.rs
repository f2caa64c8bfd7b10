//! Photo service API configuration.
//!
//! The API key and endpoint can be set programmatically or loaded from
//! environment variables.

use url::Url;

/// REST endpoint of the photo service.
pub const DEFAULT_ENDPOINT: &str = "https://api.flickr.com/services/rest";

/// Configuration for the metadata client.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// Base REST endpoint; query parameters are appended per request
    pub endpoint: Url,
    /// API key sent with every metadata request
    pub api_key: String,
}

/// Errors that can occur while building an [`ApiConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ApiConfigError {
    #[error("invalid endpoint URL '{value}': {source}")]
    InvalidEndpoint {
        value: String,
        #[source]
        source: url::ParseError,
    },
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
        }
    }
}

fn default_endpoint() -> Url {
    // Compile-time constant; covered by `test_default_endpoint_parses`.
    Url::parse(DEFAULT_ENDPOINT).unwrap_or_else(|_| unreachable!("DEFAULT_ENDPOINT is valid"))
}

impl ApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Sets the endpoint, validating that it parses as a URL.
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self, ApiConfigError> {
        self.endpoint = parse_endpoint(endpoint)?;
        Ok(self)
    }

    /// Whether an API key has been provided.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PHOTO_GALLERY_API_KEY`: API key (default: empty)
    /// - `PHOTO_GALLERY_ENDPOINT`: REST endpoint (default: [`DEFAULT_ENDPOINT`])
    pub fn from_env() -> Result<Self, ApiConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PHOTO_GALLERY_API_KEY") {
            config.api_key = val;
        }

        if let Ok(val) = std::env::var("PHOTO_GALLERY_ENDPOINT") {
            config.endpoint = parse_endpoint(&val)?;
        }

        Ok(config)
    }
}

fn parse_endpoint(value: &str) -> Result<Url, ApiConfigError> {
    Url::parse(value).map_err(|source| ApiConfigError::InvalidEndpoint {
        value: value.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    fn test_default_endpoint_parses() {
        let config = ApiConfig::default();
        assert_eq!(config.endpoint.as_str(), DEFAULT_ENDPOINT);
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_with_endpoint() {
        let config = ApiConfig::new("key")
            .with_endpoint("http://127.0.0.1:8080/rest")
            .unwrap();
        assert_eq!(config.endpoint.as_str(), "http://127.0.0.1:8080/rest");
        assert!(config.has_api_key());

        assert!(ApiConfig::new("key").with_endpoint("::nope::").is_err());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var("PHOTO_GALLERY_API_KEY", "abc123");
        env::set_var("PHOTO_GALLERY_ENDPOINT", "http://localhost:9999/rest");

        let config = ApiConfig::from_env().unwrap();
        assert_eq!(config.api_key, "abc123");
        assert_eq!(config.endpoint.as_str(), "http://localhost:9999/rest");

        env::remove_var("PHOTO_GALLERY_API_KEY");
        env::remove_var("PHOTO_GALLERY_ENDPOINT");
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_endpoint() {
        env::set_var("PHOTO_GALLERY_ENDPOINT", "not a url");

        let result = ApiConfig::from_env();
        assert!(matches!(
            result,
            Err(ApiConfigError::InvalidEndpoint { .. })
        ));

        env::remove_var("PHOTO_GALLERY_ENDPOINT");
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        env::remove_var("PHOTO_GALLERY_API_KEY");
        env::remove_var("PHOTO_GALLERY_ENDPOINT");

        let config = ApiConfig::from_env().unwrap();
        assert_eq!(config, ApiConfig::default());
    }
}
