//! Gallery controller
//!
//! Owns the item list, the thumbnail cache and the download worker, and runs
//! entirely on the driving thread. Background work (metadata pages and
//! thumbnail downloads) reports back over channels that [`GalleryController::pump`]
//! drains, so every slot binding and cache insert happens on the caller's
//! thread.

use crate::config::{GalleryConfig, GalleryError};
use crate::slot::ThumbnailSlot;
use photo_gallery_cache::{CacheStats, ThumbnailCache};
use photo_gallery_net::{GalleryItem, PhotoSource};
use photo_gallery_scheduler::{ThumbnailDownloader, ThumbnailLoader, WorkerStats};
use photo_gallery_storage::Storage;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

/// A finished metadata page, tagged with the query generation it was
/// requested under.
struct PageLoaded {
    generation: u64,
    page: u32,
    items: Vec<GalleryItem>,
}

pub struct GalleryController<S> {
    source: Arc<dyn PhotoSource>,
    storage: Storage,
    cache: ThumbnailCache,
    downloader: ThumbnailDownloader<S>,

    items: Vec<GalleryItem>,

    /// URL each slot was last bound to; a thumbnail is only shown on a slot
    /// that still expects it
    expected: HashMap<S, String>,

    /// A page request is outstanding for the current query
    updating: bool,

    /// Bumped whenever the query changes; older page loads are discarded
    query_generation: u64,

    page_tx: Sender<PageLoaded>,
    page_rx: Receiver<PageLoaded>,
}

impl<S: ThumbnailSlot> GalleryController<S> {
    /// Start the download worker and request the first page of the stored
    /// query (or of recent photos when none is stored).
    pub fn new(
        config: &GalleryConfig,
        source: Arc<dyn PhotoSource>,
        loader: impl ThumbnailLoader,
        storage: Storage,
    ) -> Result<Self, GalleryError> {
        let mut downloader = ThumbnailDownloader::new(loader);
        downloader.start()?;

        let (page_tx, page_rx) = mpsc::channel();
        let mut controller = Self {
            source,
            storage,
            cache: ThumbnailCache::from_config(&config.cache),
            downloader,
            items: Vec::new(),
            expected: HashMap::new(),
            updating: false,
            query_generation: 0,
            page_tx,
            page_rx,
        };

        controller.storage.set_stored_page(1)?;
        controller.request_page()?;
        Ok(controller)
    }

    /// Bind `slot` to the item at `position`.
    ///
    /// The slot shows its placeholder first. A cached thumbnail is bound
    /// immediately; otherwise a download is queued and bound later by
    /// [`pump`](Self::pump).
    pub fn bind_slot(&mut self, slot: S, position: usize) {
        slot.bind_placeholder();

        let Some(item) = self.items.get(position) else {
            self.expected.remove(&slot);
            return;
        };
        self.expected.insert(slot.clone(), item.url.clone());

        match self.cache.get(&item.url) {
            Some(bitmap) => slot.bind_thumbnail(bitmap),
            None => self.downloader.enqueue(slot, item.url.clone()),
        }
    }

    /// Apply finished page loads and deliver finished thumbnails.
    ///
    /// Every delivered thumbnail is cached. It is bound only if its slot
    /// still expects that URL: a slot bound from the cache in the meantime
    /// keeps what it shows. Returns the number of thumbnails bound.
    pub fn pump(&mut self) -> usize {
        while let Ok(loaded) = self.page_rx.try_recv() {
            self.apply_page(loaded);
        }

        let cache = &mut self.cache;
        let expected = &self.expected;
        let mut bound = 0;
        self.downloader.dispatch_ready(|ready| {
            if expected.get(&ready.target) == Some(&ready.url) {
                ready.target.bind_thumbnail(Arc::clone(&ready.bitmap));
                bound += 1;
            } else {
                tracing::trace!(url = %ready.url, "slot no longer shows this thumbnail");
            }
            cache.put(ready.url, ready.bitmap);
        });
        bound
    }

    /// Request the next page when the grid has been scrolled down to its
    /// last item.
    ///
    /// Returns `true` if a page request was started.
    pub fn on_scrolled(&mut self, last_visible: usize, dy: i32) -> Result<bool, GalleryError> {
        if self.updating || dy <= 0 || last_visible + 1 < self.items.len() {
            return Ok(false);
        }

        let page = self.storage.stored_page()?.saturating_add(1);
        self.storage.set_stored_page(page)?;
        self.request_page()?;
        Ok(true)
    }

    /// Store `text` as the query and reload from its first page.
    pub fn submit_query(&mut self, text: &str) -> Result<(), GalleryError> {
        self.storage.set_stored_query(Some(text))?;
        self.reload()
    }

    /// Forget the stored query and reload recent photos from the first page.
    pub fn clear_query(&mut self) -> Result<(), GalleryError> {
        self.storage.set_stored_query(None)?;
        self.reload()
    }

    /// The grid went away: drop queued downloads but keep the worker.
    pub fn on_view_destroyed(&self) {
        self.downloader.clear_queue();
    }

    /// Stop the download worker. Nothing is delivered afterwards.
    pub fn shutdown(&self) {
        self.downloader.quit();
    }

    pub fn items(&self) -> &[GalleryItem] {
        &self.items
    }

    pub fn is_updating(&self) -> bool {
        self.updating
    }

    pub fn cache(&self) -> &ThumbnailCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn worker_stats(&self) -> WorkerStats {
        self.downloader.stats()
    }

    fn reload(&mut self) -> Result<(), GalleryError> {
        self.query_generation += 1;
        self.items.clear();
        self.expected.clear();
        self.downloader.clear_queue();
        self.storage.set_stored_page(1)?;
        self.request_page()
    }

    fn request_page(&mut self) -> Result<(), GalleryError> {
        let query = self.storage.stored_query()?;
        let page = self.storage.stored_page()?;
        let generation = self.query_generation;
        tracing::debug!(?query, page, "requesting gallery page");

        let source = Arc::clone(&self.source);
        let page_tx = self.page_tx.clone();
        thread::Builder::new()
            .name("gallery-page-loader".to_string())
            .spawn(move || {
                let items = source.fetch_page(query.as_deref(), page);
                // The controller may be gone by now.
                let _ = page_tx.send(PageLoaded { generation, page, items });
            })
            .map_err(GalleryError::Spawn)?;

        self.updating = true;
        Ok(())
    }

    fn apply_page(&mut self, loaded: PageLoaded) {
        if loaded.generation != self.query_generation {
            tracing::debug!(page = loaded.page, "discarding page for an old query");
            return;
        }

        tracing::debug!(page = loaded.page, count = loaded.items.len(), "gallery page loaded");
        self.items.extend(loaded.items);
        self.updating = false;
    }
}
