//! Paginated photo metadata client.
//!
//! Builds REST query URLs for the recent-photos and search methods, downloads
//! one page of results and parses the JSON envelope into [`GalleryItem`]s.
//! Items without a thumbnail URL are dropped before they reach the gallery.

use crate::config::ApiConfig;
use crate::fetch::{FetchBytes, FetchError, HttpFetcher};
use serde::{Deserialize, Serialize};
use url::Url;

/// REST method names understood by the photo service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlickrMethod {
    /// Most recent public photos
    GetRecent,
    /// Full-text photo search
    Search,
}

impl FlickrMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            FlickrMethod::GetRecent => "flickr.photos.getRecent",
            FlickrMethod::Search => "flickr.photos.search",
        }
    }
}

/// One photo in the gallery. `url` is the small thumbnail URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryItem {
    pub id: String,
    pub caption: String,
    pub url: String,
    pub owner: String,
}

impl GalleryItem {
    /// Public web page for this photo.
    pub fn photo_page_url(&self) -> String {
        format!("https://www.flickr.com/photos/{}/{}", self.owner, self.id)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    photos: PhotoPage,
}

#[derive(Debug, Deserialize)]
struct PhotoPage {
    photo: Vec<PhotoRecord>,
}

#[derive(Debug, Deserialize)]
struct PhotoRecord {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    url_s: Option<String>,
}

impl PhotoRecord {
    fn into_item(self) -> Option<GalleryItem> {
        let url = self.url_s.filter(|url| !url.is_empty())?;
        Some(GalleryItem {
            id: self.id,
            caption: self.title,
            url,
            owner: self.owner,
        })
    }
}

/// Errors from a metadata page request.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("failed to fetch items: {0}")]
    Fetch(#[from] FetchError),
    #[error("failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Source of gallery pages.
///
/// `query == None` means recent-photos mode. Failures are reported as an
/// empty page, never as an error.
pub trait PhotoSource: Send + Sync {
    fn fetch_page(&self, query: Option<&str>, page: u32) -> Vec<GalleryItem>;
}

/// Metadata client for the photo service REST API.
pub struct FlickrClient<F = HttpFetcher> {
    fetcher: F,
    config: ApiConfig,
}

impl FlickrClient<HttpFetcher> {
    pub fn new(config: ApiConfig) -> Self {
        Self::with_fetcher(config, HttpFetcher::new())
    }
}

impl<F: FetchBytes> FlickrClient<F> {
    pub fn with_fetcher(config: ApiConfig, fetcher: F) -> Self {
        Self { fetcher, config }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Build the request URL for `method`.
    ///
    /// `text` is only sent for [`FlickrMethod::Search`]. A `page` of 0 means
    /// "no page parameter".
    pub fn build_url(&self, method: FlickrMethod, query: Option<&str>, page: u32) -> Url {
        let mut url = self.config.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("api_key", &self.config.api_key)
                .append_pair("format", "json")
                .append_pair("nojsoncallback", "1")
                .append_pair("extras", "url_s")
                .append_pair("method", method.as_str());

            if method == FlickrMethod::Search {
                pairs.append_pair("text", query.unwrap_or_default());
            }

            if page != 0 {
                pairs.append_pair("page", &page.to_string());
            }
        }
        url
    }

    pub fn fetch_recent_photos(&self, page: u32) -> Vec<GalleryItem> {
        let url = self.build_url(FlickrMethod::GetRecent, None, page);
        self.download_gallery_items(&url)
    }

    pub fn search_photos(&self, query: &str, page: u32) -> Vec<GalleryItem> {
        let url = self.build_url(FlickrMethod::Search, Some(query), page);
        self.download_gallery_items(&url)
    }

    /// Like [`PhotoSource::fetch_page`] but surfaces the failure.
    pub fn try_fetch_page(
        &self,
        query: Option<&str>,
        page: u32,
    ) -> Result<Vec<GalleryItem>, MetadataError> {
        let url = match query {
            Some(text) => self.build_url(FlickrMethod::Search, Some(text), page),
            None => self.build_url(FlickrMethod::GetRecent, None, page),
        };
        self.try_download_gallery_items(&url)
    }

    pub fn try_download_gallery_items(&self, url: &Url) -> Result<Vec<GalleryItem>, MetadataError> {
        let body = self.fetcher.fetch_string(url.as_str())?;
        tracing::debug!(bytes = body.len(), "received page JSON");
        Ok(parse_items(&body)?)
    }

    /// Download and parse one page, logging failures and returning an empty
    /// page instead.
    pub fn download_gallery_items(&self, url: &Url) -> Vec<GalleryItem> {
        match self.try_download_gallery_items(url) {
            Ok(items) => items,
            Err(err) => {
                tracing::error!(error = %err, "metadata page failed");
                Vec::new()
            }
        }
    }
}

impl<F: FetchBytes> PhotoSource for FlickrClient<F> {
    fn fetch_page(&self, query: Option<&str>, page: u32) -> Vec<GalleryItem> {
        match query {
            Some(text) => self.search_photos(text, page),
            None => self.fetch_recent_photos(page),
        }
    }
}

/// Parse a metadata envelope, dropping every item without a thumbnail URL.
pub fn parse_items(json: &str) -> Result<Vec<GalleryItem>, serde_json::Error> {
    let envelope: Envelope = serde_json::from_str(json)?;
    Ok(envelope
        .photos
        .photo
        .into_iter()
        .filter_map(PhotoRecord::into_item)
        .collect())
}
