//! Pending download queue
//!
//! An ordered map from display target to the most recently requested URL for
//! that target. Each target appears at most once. Re-queuing a target that is
//! already waiting replaces its URL without moving it, so the queue drains in
//! the order targets were first queued.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// A request to download `url` for display target `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest<T> {
    pub target: T,
    pub url: String,

    /// Enqueue sequence number; newer requests for a target have larger values
    pub generation: u64,
}

#[derive(Debug)]
struct PendingEntry {
    url: String,
    generation: u64,

    /// Insertion order (fixed at first insert, kept across overwrites)
    order: u64,
}

/// Target-keyed FIFO with overwrite-in-place.
///
/// Not synchronized; the download worker wraps it in its own mutex.
#[derive(Debug)]
pub struct PendingQueue<T> {
    entries: HashMap<T, PendingEntry>,

    /// Insertion order → target
    order: BTreeMap<u64, T>,

    insertion_counter: u64,
}

impl<T: Clone + Eq + Hash> PendingQueue<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            insertion_counter: 0,
        }
    }

    /// Queue `url` for `target`.
    ///
    /// Returns `true` when an entry for `target` was already waiting and has
    /// been overwritten in place.
    pub fn push(&mut self, target: T, url: String, generation: u64) -> bool {
        if let Some(entry) = self.entries.get_mut(&target) {
            entry.url = url;
            entry.generation = generation;
            return true;
        }

        let order = self.insertion_counter;
        self.insertion_counter += 1;

        self.order.insert(order, target.clone());
        self.entries.insert(
            target,
            PendingEntry {
                url,
                generation,
                order,
            },
        );
        false
    }

    /// Remove and return the oldest waiting request.
    pub fn pop(&mut self) -> Option<DownloadRequest<T>> {
        while let Some((_, target)) = self.order.pop_first() {
            if let Some(entry) = self.entries.remove(&target) {
                return Some(DownloadRequest {
                    target,
                    url: entry.url,
                    generation: entry.generation,
                });
            }
        }
        None
    }

    /// Remove the waiting request for `target`, if any.
    pub fn remove(&mut self, target: &T) -> Option<DownloadRequest<T>> {
        let entry = self.entries.remove(target)?;
        self.order.remove(&entry.order);
        Some(DownloadRequest {
            target: target.clone(),
            url: entry.url,
            generation: entry.generation,
        })
    }

    /// URL currently waiting for `target`.
    pub fn url_for(&self, target: &T) -> Option<&str> {
        self.entries.get(target).map(|entry| entry.url.as_str())
    }

    /// Drop every waiting request, returning the targets that were queued.
    pub fn clear(&mut self) -> Vec<T> {
        self.entries.clear();
        std::mem::take(&mut self.order).into_values().collect()
    }

    /// Waiting requests in drain order.
    pub fn requests(&self) -> Vec<DownloadRequest<T>> {
        self.order
            .values()
            .filter_map(|target| {
                self.entries.get(target).map(|entry| DownloadRequest {
                    target: target.clone(),
                    url: entry.url.clone(),
                    generation: entry.generation,
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone + Eq + Hash> Default for PendingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
