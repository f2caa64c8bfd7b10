//! Photo Gallery Scheduler Library
//!
//! Single-worker thumbnail download queue.
//!
//! Requests are keyed by display target: enqueuing a new URL for a target that
//! is still waiting replaces its URL in place, and a result that finishes after
//! its target has been given a newer URL is dropped instead of delivered.
//! Finished thumbnails are handed back to the driving thread over a channel.
//!
//! # Example
//!
//! ```no_run
//! use photo_gallery_scheduler::{HttpThumbnailLoader, ThumbnailDownloader};
//! use std::time::Duration;
//!
//! let mut downloader = ThumbnailDownloader::<usize>::new(HttpThumbnailLoader::new());
//! downloader.start().expect("worker should start");
//!
//! // Slot 3 first shows one photo, then gets recycled for another.
//! downloader.enqueue(3, "https://live.example/a_s.jpg");
//! downloader.enqueue(3, "https://live.example/b_s.jpg");
//!
//! if let Some(ready) = downloader.recv_ready_timeout(Duration::from_secs(10)) {
//!     assert_eq!(ready.url, "https://live.example/b_s.jpg");
//! }
//!
//! downloader.quit();
//! ```

mod loader;
mod pending;
mod worker;

pub use loader::{HttpThumbnailLoader, LoadError, ThumbnailLoader};
pub use pending::{DownloadRequest, PendingQueue};
pub use worker::{ThumbnailDownloader, ThumbnailReady, WorkerError, WorkerState, WorkerStats};
