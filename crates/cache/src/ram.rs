//! RAM thumbnail cache with LRU eviction
//!
//! Provides in-memory caching of decoded thumbnails keyed by URL, with
//! automatic eviction of the least recently used entries whenever the byte
//! budget or the entry-count cap is exceeded.
//!
//! The cache has no internal locking. It is owned by the driving context,
//! which is the only writer (it inserts results handed back by the download
//! worker), so every mutating method takes `&mut self`.

use crate::config::CacheConfig;
use lru::LruCache;
use photo_gallery_render::Bitmap;
use std::sync::Arc;

/// A cached thumbnail and the cost charged for it at insert time.
#[derive(Debug, Clone)]
struct CachedThumbnail {
    bitmap: Arc<Bitmap>,
    cost: usize,
}

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of thumbnails currently in cache
    pub entry_count: usize,

    /// Aggregate cost of cached thumbnails (bytes)
    pub bytes_used: usize,

    /// Byte budget
    pub max_bytes: usize,

    /// Entry-count cap
    pub max_entries: usize,

    /// Number of cache hits
    pub hits: u64,

    /// Number of cache misses
    pub misses: u64,

    /// Number of thumbnails evicted by either limit
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded URL → bitmap cache.
///
/// # Example
///
/// ```
/// use photo_gallery_cache::ThumbnailCache;
/// use photo_gallery_render::Bitmap;
/// use std::sync::Arc;
///
/// let mut cache = ThumbnailCache::new(1024 * 1024, 60);
///
/// cache.put("https://live.example/1_s.jpg", Arc::new(Bitmap::filled(75, 75, [0, 0, 0, 255])));
///
/// if let Some(bitmap) = cache.get("https://live.example/1_s.jpg") {
///     println!("Cache hit! {}x{}", bitmap.width, bitmap.height);
/// }
///
/// let stats = cache.stats();
/// println!("Used: {} / {} bytes", stats.bytes_used, stats.max_bytes);
/// ```
pub struct ThumbnailCache {
    /// Entries ordered by recency (touched = inserted or read)
    entries: LruCache<String, CachedThumbnail>,

    /// Aggregate cost in bytes
    bytes_used: usize,

    max_bytes: usize,
    max_entries: usize,

    hits: u64,
    misses: u64,
    evictions: u64,
}

impl ThumbnailCache {
    /// Create a cache with a byte budget and an entry-count cap.
    pub fn new(max_bytes: usize, max_entries: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            bytes_used: 0,
            max_bytes,
            max_entries,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_bytes, config.max_entries)
    }

    /// Look up a thumbnail and mark it as most recently used.
    pub fn get(&mut self, url: &str) -> Option<Arc<Bitmap>> {
        match self.entries.get(url) {
            Some(entry) => {
                self.hits += 1;
                Some(Arc::clone(&entry.bitmap))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Insert or replace a thumbnail.
    ///
    /// The entry's cost is computed from the bitmap dimensions. After the
    /// insert, the byte budget and the entry cap are each checked and least
    /// recently used entries are evicted until both hold. A bitmap larger
    /// than the whole budget is therefore evicted immediately.
    pub fn put(&mut self, url: impl Into<String>, bitmap: Arc<Bitmap>) {
        let cost = bitmap.byte_cost();

        if let Some(old) = self.entries.put(url.into(), CachedThumbnail { bitmap, cost }) {
            self.bytes_used = self.bytes_used.saturating_sub(old.cost);
        }
        self.bytes_used += cost;

        self.trim_to_bytes(self.max_bytes);
        self.trim_to_count(self.max_entries);
    }

    /// Check for a thumbnail without updating recency or hit statistics.
    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains(url)
    }

    /// Remove a thumbnail, returning it if it was cached.
    pub fn remove(&mut self, url: &str) -> Option<Arc<Bitmap>> {
        let entry = self.entries.pop(url)?;
        self.bytes_used = self.bytes_used.saturating_sub(entry.cost);
        Some(entry.bitmap)
    }

    /// Clear all thumbnails from the cache
    pub fn clear(&mut self) {
        self.entries.clear();
        self.bytes_used = 0;
    }

    /// Update the byte budget, evicting immediately if now over it.
    pub fn set_max_bytes(&mut self, max_bytes: usize) {
        self.max_bytes = max_bytes;
        self.trim_to_bytes(max_bytes);
    }

    /// Update the entry cap, evicting immediately if now over it.
    pub fn set_max_entries(&mut self, max_entries: usize) {
        self.max_entries = max_entries;
        self.trim_to_count(max_entries);
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get current cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len(),
            bytes_used: self.bytes_used,
            max_bytes: self.max_bytes,
            max_entries: self.max_entries,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }

    fn trim_to_bytes(&mut self, max_bytes: usize) {
        while self.bytes_used > max_bytes {
            if !self.evict_lru() {
                break;
            }
        }
    }

    fn trim_to_count(&mut self, max_entries: usize) {
        while self.entries.len() > max_entries {
            if !self.evict_lru() {
                break;
            }
        }
    }

    /// Evict the least recently used thumbnail. Returns false when empty.
    fn evict_lru(&mut self) -> bool {
        match self.entries.pop_lru() {
            Some((url, entry)) => {
                self.bytes_used = self.bytes_used.saturating_sub(entry.cost);
                self.evictions += 1;
                tracing::trace!(%url, cost = entry.cost, "evicted thumbnail");
                true
            }
            None => false,
        }
    }
}

impl Default for ThumbnailCache {
    /// Create a cache with the default 4 MiB budget and 60 entry cap
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    /// 64x64 RGBA = 16 KiB
    const SMALL: usize = 64 * 64 * 4;

    fn small() -> Arc<Bitmap> {
        Arc::new(Bitmap::filled(64, 64, [0, 0, 0, 255]))
    }

    fn url(n: usize) -> String {
        format!("https://live.example/{n}_s.jpg")
    }

    #[test]
    fn test_basic_put_get() {
        let mut cache = ThumbnailCache::new(1024 * 1024, 60);

        let bitmap = Arc::new(Bitmap::filled(75, 50, [1, 2, 3, 4]));
        cache.put(url(1), bitmap.clone());

        let hit = cache.get(&url(1)).expect("thumbnail should be cached");
        assert!(Arc::ptr_eq(&hit, &bitmap));
        assert_eq!(cache.bytes_used(), 75 * 50 * 4);
    }

    #[test]
    fn test_cache_miss() {
        let mut cache = ThumbnailCache::new(1024 * 1024, 60);

        assert!(cache.get("https://live.example/missing.jpg").is_none());

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_byte_budget_eviction() {
        let mut cache = ThumbnailCache::new(2 * SMALL, 60);

        cache.put(url(1), small());
        cache.put(url(2), small());
        cache.put(url(3), small()); // Should evict 1

        assert!(!cache.contains(&url(1)));
        assert!(cache.contains(&url(2)));
        assert!(cache.contains(&url(3)));
        assert_eq!(cache.bytes_used(), 2 * SMALL);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_read_refreshes_recency() {
        let mut cache = ThumbnailCache::new(2 * SMALL, 60);

        cache.put(url(1), small());
        cache.put(url(2), small());

        // Reading 1 makes 2 the oldest
        assert!(cache.get(&url(1)).is_some());

        cache.put(url(3), small());

        assert!(cache.contains(&url(1)));
        assert!(!cache.contains(&url(2)));
        assert!(cache.contains(&url(3)));
    }

    #[test]
    fn test_contains_does_not_refresh_recency() {
        let mut cache = ThumbnailCache::new(2 * SMALL, 60);

        cache.put(url(1), small());
        cache.put(url(2), small());
        assert!(cache.contains(&url(1)));

        cache.put(url(3), small());
        assert!(!cache.contains(&url(1)));
    }

    #[test]
    fn test_entry_cap_independent_of_bytes() {
        // Plenty of byte budget, but only 3 entries allowed
        let mut cache = ThumbnailCache::new(1024 * 1024 * 1024, 3);

        for n in 0..5 {
            cache.put(url(n), Arc::new(Bitmap::filled(1, 1, [0; 4])));
        }

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&url(0)));
        assert!(!cache.contains(&url(1)));
        assert!(cache.contains(&url(4)));
        assert_eq!(cache.stats().evictions, 2);
    }

    #[test]
    fn test_replace_updates_cost() {
        let mut cache = ThumbnailCache::new(1024 * 1024, 60);

        cache.put(url(1), Arc::new(Bitmap::filled(10, 10, [0; 4])));
        cache.put(url(1), Arc::new(Bitmap::filled(20, 10, [9; 4])));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.bytes_used(), 20 * 10 * 4);
        assert_eq!(cache.get(&url(1)).unwrap().width, 20);
    }

    #[test]
    fn test_oversized_entry_is_not_kept() {
        let mut cache = ThumbnailCache::new(SMALL, 60);

        cache.put(url(1), small());
        cache.put(url(2), Arc::new(Bitmap::filled(128, 128, [0; 4])));

        assert!(cache.is_empty());
        assert_eq!(cache.bytes_used(), 0);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cache = ThumbnailCache::new(1024 * 1024, 60);

        cache.put(url(1), small());
        cache.put(url(2), small());

        assert!(cache.remove(&url(1)).is_some());
        assert!(cache.remove(&url(1)).is_none());
        assert_eq!(cache.bytes_used(), SMALL);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.bytes_used(), 0);
    }

    #[test]
    fn test_shrinking_limits_evicts() {
        let mut cache = ThumbnailCache::new(1024 * 1024, 60);
        for n in 0..4 {
            cache.put(url(n), small());
        }

        cache.set_max_bytes(2 * SMALL);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&url(2)));
        assert!(cache.contains(&url(3)));

        cache.set_max_entries(1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&url(3)));
    }

    #[test]
    fn test_stats() {
        let mut cache = ThumbnailCache::new(1024 * 1024, 60);
        cache.put(url(1), small());

        let _ = cache.get(&url(1));
        let _ = cache.get(&url(2));
        let _ = cache.get(&url(3));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.bytes_used, SMALL);
        assert!((stats.hit_rate() - 0.333).abs() < 0.01);
    }

    #[test]
    fn test_default_cache() {
        let cache = ThumbnailCache::default();
        assert_eq!(cache.max_bytes(), 4 * 1024 * 1024);
        assert_eq!(cache.max_entries(), 60);
    }

    #[test]
    fn test_random_inserts_stay_within_budget() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let budget = 256 * 1024;
        let mut cache = ThumbnailCache::new(budget, 60);

        for n in 0..500 {
            let w = rng.gen_range(1..=160);
            let h = rng.gen_range(1..=160);
            cache.put(url(n % 120), Arc::new(Bitmap::filled(w, h, [0; 4])));
            if rng.gen_bool(0.3) {
                let _ = cache.get(&url(rng.gen_range(0..120)));
            }

            assert!(cache.bytes_used() <= budget);
            assert!(cache.len() <= 60);
        }
    }

    #[test]
    fn test_lru_eviction_order_over_many_reads() {
        // Room for 10 thumbnails
        let mut cache = ThumbnailCache::new(10 * SMALL, 60);

        for n in 0..10 {
            cache.put(url(n), small());
        }

        // Touch the even ones; odd ones are now the oldest
        for n in (0..10).step_by(2) {
            assert!(cache.get(&url(n)).is_some());
        }

        for n in 10..15 {
            cache.put(url(n), small());
        }

        for n in (1..10).step_by(2) {
            assert!(!cache.contains(&url(n)), "{} should be evicted", url(n));
        }
        for n in (0..10).step_by(2) {
            assert!(cache.contains(&url(n)), "{} should survive", url(n));
        }
    }
}
