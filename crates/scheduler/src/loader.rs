//! Thumbnail loading: fetch bytes, then decode.

use photo_gallery_net::{FetchBytes, FetchError, HttpFetcher};
use photo_gallery_render::{decode, Bitmap, DecodeError};

/// A failed thumbnail load. Terminal for that request; never retried.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Turns a URL into a decoded bitmap. Called only on the worker thread.
pub trait ThumbnailLoader: Send + 'static {
    fn load(&self, url: &str) -> Result<Bitmap, LoadError>;
}

impl<F> ThumbnailLoader for F
where
    F: Fn(&str) -> Result<Bitmap, LoadError> + Send + 'static,
{
    fn load(&self, url: &str) -> Result<Bitmap, LoadError> {
        self(url)
    }
}

/// Loader that downloads with a [`FetchBytes`] and decodes the result.
pub struct HttpThumbnailLoader<F = HttpFetcher> {
    fetcher: F,
}

impl HttpThumbnailLoader<HttpFetcher> {
    pub fn new() -> Self {
        Self::with_fetcher(HttpFetcher::new())
    }
}

impl Default for HttpThumbnailLoader<HttpFetcher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FetchBytes + 'static> HttpThumbnailLoader<F> {
    pub fn with_fetcher(fetcher: F) -> Self {
        Self { fetcher }
    }
}

impl<F: FetchBytes + 'static> ThumbnailLoader for HttpThumbnailLoader<F> {
    fn load(&self, url: &str) -> Result<Bitmap, LoadError> {
        let bytes = self.fetcher.fetch(url)?;
        Ok(decode(&bytes)?)
    }
}
