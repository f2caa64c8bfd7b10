//! Blocking HTTP GET returning the whole response body.

use std::io::Read;

const USER_AGENT: &str = concat!("photo-gallery/", env!("CARGO_PKG_VERSION"));

/// Errors produced by a byte fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{message}: with {url} (status {status})")]
    Status {
        status: u16,
        message: String,
        url: String,
    },
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },
    #[error("failed to read response body from {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// HTTP status code, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Something that can download the bytes behind a URL.
///
/// Implementations block the calling thread until the full body has been
/// read. There are no retries: a failure is final for that call.
pub trait FetchBytes: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    /// Fetch and interpret the body as UTF-8 (invalid sequences are replaced).
    fn fetch_string(&self, url: &str) -> Result<String, FetchError> {
        let bytes = self.fetch(url)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// [`FetchBytes`] over a shared `ureq` agent.
///
/// No timeout is configured beyond the transport defaults.
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().user_agent(USER_AGENT).build(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchBytes for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = match self.agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                return Err(FetchError::Status {
                    status,
                    message: response.status_text().to_string(),
                    url: url.to_string(),
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(FetchError::Transport {
                    url: url.to_string(),
                    message: transport.to_string(),
                });
            }
        };

        // Unfollowed redirects and other non-2xx answers still count as failures.
        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(FetchError::Status {
                status,
                message: response.status_text().to_string(),
                url: url.to_string(),
            });
        }

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|source| FetchError::Io {
                url: url.to_string(),
                source,
            })?;

        tracing::trace!(url, bytes = bytes.len(), "fetched");
        Ok(bytes)
    }
}
