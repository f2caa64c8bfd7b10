//! Thumbnail download worker.
//!
//! One background thread drains the [`PendingQueue`], loading one thumbnail at
//! a time, and sends finished bitmaps back to the driving thread over a
//! channel. The driving thread never blocks on the worker: `enqueue`,
//! `clear_queue` and `quit` only touch the queue under a short lock.
//!
//! A result is dropped instead of delivered when its target has since been
//! given a different URL. This is checked twice: on the worker right after the
//! load finishes (a newer URL is waiting in the queue), and on the driving
//! thread when the message is received (the target's latest generation has
//! moved on while the message sat in the channel).

use crate::loader::{LoadError, ThumbnailLoader};
use crate::pending::{DownloadRequest, PendingQueue};
use photo_gallery_render::Bitmap;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Lifecycle of the download worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Nothing queued and nothing in flight
    Idle,
    /// Requests are queued or one is in flight
    Draining,
    /// `quit` was called; every later operation is a no-op
    Stopped,
}

/// Counters describing what happened to enqueued requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Accepted `enqueue` calls
    pub enqueued: u64,
    /// Enqueues that replaced a waiting URL for the same target
    pub overwritten: u64,
    /// Results delivered to the driving thread
    pub completed: u64,
    /// Results dropped because the target had been given a newer URL
    pub stale: u64,
    /// Loads that failed with a fetch or decode error
    pub failed: u64,
    /// Waiting requests dropped by `clear_queue` or `quit`
    pub cleared: u64,
}

/// A finished thumbnail for `target`, downloaded from `url`.
#[derive(Debug, Clone)]
pub struct ThumbnailReady<T> {
    pub target: T,
    pub bitmap: Arc<Bitmap>,
    pub url: String,
    generation: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("download worker already started")]
    AlreadyStarted,
    #[error("download worker has quit")]
    Stopped,
    #[error("failed to spawn download worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("download worker panicked")]
    Panicked,
}

/// Why an in-flight request did not produce a delivery.
enum Outcome<T> {
    Dispatch(ThumbnailReady<T>),
    Stale,
    Failed(LoadError),
}

struct QueueState<T> {
    pending: PendingQueue<T>,

    /// The worker is loading a request right now
    in_flight: bool,

    /// Latest generation handed out per target still awaiting a result
    latest: HashMap<T, u64>,

    next_generation: u64,
    state: WorkerState,
    quit: bool,
    stats: WorkerStats,
}

struct Shared<T> {
    queue: Mutex<QueueState<T>>,
    wake: Condvar,
}

impl<T> Shared<T> {
    // Every critical section leaves the queue consistent, so a panic
    // elsewhere while holding the lock does not invalidate it.
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Single-worker thumbnail download queue keyed by display target.
///
/// `T` identifies a display slot. Slots are reused for different photos over
/// time, so `T` is not a download identity: only the most recent URL queued
/// for a slot is ever delivered to it.
///
/// The downloader itself lives on the driving thread. Results come back
/// through [`dispatch_ready`](Self::dispatch_ready) or
/// [`recv_ready_timeout`](Self::recv_ready_timeout), both of which run on the
/// caller's thread.
pub struct ThumbnailDownloader<T> {
    shared: Arc<Shared<T>>,
    loader: Option<Box<dyn ThumbnailLoader>>,
    ready_tx: Option<Sender<ThumbnailReady<T>>>,
    ready_rx: Receiver<ThumbnailReady<T>>,
    thread: Option<JoinHandle<()>>,
}

impl<T> ThumbnailDownloader<T>
where
    T: Clone + Eq + Hash + Send + 'static,
{
    /// Create a downloader. Requests may be queued before [`start`](Self::start).
    pub fn new(loader: impl ThumbnailLoader) -> Self {
        let (ready_tx, ready_rx) = mpsc::channel();
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(QueueState {
                    pending: PendingQueue::new(),
                    in_flight: false,
                    latest: HashMap::new(),
                    next_generation: 0,
                    state: WorkerState::Idle,
                    quit: false,
                    stats: WorkerStats::default(),
                }),
                wake: Condvar::new(),
            }),
            loader: Some(Box::new(loader)),
            ready_tx: Some(ready_tx),
            ready_rx,
            thread: None,
        }
    }

    /// Spawn the background worker thread.
    pub fn start(&mut self) -> Result<(), WorkerError> {
        if self.shared.lock().quit {
            return Err(WorkerError::Stopped);
        }
        let (Some(loader), Some(ready_tx)) = (self.loader.take(), self.ready_tx.take()) else {
            return Err(WorkerError::AlreadyStarted);
        };

        let shared = Arc::clone(&self.shared);
        let thread = thread::Builder::new()
            .name("thumbnail-downloader".to_string())
            .spawn(move || run(shared, loader, ready_tx))?;

        self.thread = Some(thread);
        tracing::info!("thumbnail downloader started");
        Ok(())
    }

    /// Queue a download of `url` for `target`.
    ///
    /// A request still waiting for the same target is overwritten in place.
    /// Does nothing once [`quit`](Self::quit) has been called.
    pub fn enqueue(&self, target: T, url: impl Into<String>) {
        let url = url.into();
        let mut queue = self.shared.lock();
        if queue.quit {
            tracing::trace!(%url, "enqueue after quit ignored");
            return;
        }

        let generation = queue.next_generation;
        queue.next_generation += 1;

        let overwritten = queue.pending.push(target.clone(), url, generation);
        queue.latest.insert(target, generation);

        queue.stats.enqueued += 1;
        if overwritten {
            queue.stats.overwritten += 1;
        }

        if queue.state == WorkerState::Idle {
            queue.state = WorkerState::Draining;
            tracing::debug!("downloader draining");
        }
        drop(queue);

        self.shared.wake.notify_one();
    }

    /// Drop every request that has not started yet.
    ///
    /// The in-flight request (if any) runs to completion and is delivered or
    /// discarded as usual. The worker stays alive.
    pub fn clear_queue(&self) {
        let mut queue = self.shared.lock();
        if queue.quit {
            return;
        }

        let cleared = queue.pending.clear();
        for target in &cleared {
            // A cleared request superseded whatever is in flight for the
            // same target, so that result must not be delivered either.
            queue.latest.remove(target);
        }
        queue.stats.cleared += cleared.len() as u64;

        if !queue.in_flight {
            queue.state = WorkerState::Idle;
        }
        tracing::debug!(cleared = cleared.len(), "download queue cleared");
    }

    /// Stop the worker after the in-flight request (if any) finishes.
    ///
    /// Takes effect immediately for callers: later `enqueue` calls are
    /// ignored, waiting requests are dropped and nothing more is delivered.
    pub fn quit(&self) {
        let mut queue = self.shared.lock();
        if queue.quit {
            return;
        }
        queue.quit = true;

        let cleared = queue.pending.clear();
        queue.stats.cleared += cleared.len() as u64;
        queue.latest.clear();

        if !queue.in_flight {
            queue.state = WorkerState::Stopped;
        }
        drop(queue);

        self.shared.wake.notify_all();
        tracing::info!("thumbnail downloader quitting");
    }

    /// Quit and wait for the worker thread to exit.
    pub fn join(mut self) -> Result<(), WorkerError> {
        self.quit();
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| WorkerError::Panicked),
            None => Ok(()),
        }
    }

    /// Deliver every finished thumbnail to `on_ready` on the calling thread.
    ///
    /// Never blocks. Returns the number of thumbnails delivered.
    pub fn dispatch_ready<F>(&self, mut on_ready: F) -> usize
    where
        F: FnMut(ThumbnailReady<T>),
    {
        let mut delivered = 0;
        while let Ok(ready) = self.ready_rx.try_recv() {
            if self.accept(&ready) {
                on_ready(ready);
                delivered += 1;
            }
        }
        delivered
    }

    /// Wait up to `timeout` for the next deliverable thumbnail.
    pub fn recv_ready_timeout(&self, timeout: Duration) -> Option<ThumbnailReady<T>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.ready_rx.recv_timeout(remaining) {
                Ok(ready) => {
                    if self.accept(&ready) {
                        return Some(ready);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None;
                }
            }
        }
    }

    pub fn state(&self) -> WorkerState {
        self.shared.lock().state
    }

    /// Number of requests waiting (the in-flight one is not counted).
    pub fn pending_len(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Waiting requests in the order they will be loaded.
    pub fn pending_requests(&self) -> Vec<DownloadRequest<T>> {
        self.shared.lock().pending.requests()
    }

    pub fn stats(&self) -> WorkerStats {
        self.shared.lock().stats
    }

    /// Final check on the driving thread: only the latest request for a
    /// target may be delivered.
    fn accept(&self, ready: &ThumbnailReady<T>) -> bool {
        let mut queue = self.shared.lock();
        if queue.quit {
            return false;
        }

        match queue.latest.get(&ready.target) {
            Some(&generation) if generation == ready.generation => {
                queue.latest.remove(&ready.target);
                queue.stats.completed += 1;
                true
            }
            _ => {
                queue.stats.stale += 1;
                tracing::trace!(url = %ready.url, "stale thumbnail dropped on receipt");
                false
            }
        }
    }
}

impl<T> Drop for ThumbnailDownloader<T> {
    fn drop(&mut self) {
        // Detach rather than join: an in-flight fetch may take a while.
        let mut queue = self.shared.lock();
        queue.quit = true;
        if !queue.in_flight {
            queue.state = WorkerState::Stopped;
        }
        drop(queue);
        self.shared.wake.notify_all();
    }
}

/// Main worker loop.
fn run<T>(
    shared: Arc<Shared<T>>,
    loader: Box<dyn ThumbnailLoader>,
    ready_tx: Sender<ThumbnailReady<T>>,
) where
    T: Clone + Eq + Hash + Send + 'static,
{
    while let Some(request) = next_request(&shared) {
        // No lock is held while loading.
        let result = loader.load(&request.url);

        let mut queue = shared.lock();
        queue.in_flight = false;

        if queue.quit {
            queue.state = WorkerState::Stopped;
            break;
        }

        let outcome = match result {
            Ok(bitmap) => settle(&mut queue, request, bitmap),
            Err(err) => {
                forget_failed(&mut queue, &request);
                Outcome::Failed(err)
            }
        };

        match &outcome {
            Outcome::Dispatch(_) => {}
            Outcome::Stale => queue.stats.stale += 1,
            Outcome::Failed(_) => queue.stats.failed += 1,
        }

        if queue.pending.is_empty() {
            queue.state = WorkerState::Idle;
        }
        drop(queue);

        match outcome {
            Outcome::Dispatch(ready) => {
                if ready_tx.send(ready).is_err() {
                    // Receiver gone: the downloader was dropped.
                    break;
                }
            }
            Outcome::Stale => {}
            Outcome::Failed(err) => {
                tracing::warn!(error = %err, "thumbnail download failed");
            }
        }
    }

    tracing::info!("thumbnail downloader stopped");
}

/// Block until a request is available or the worker should stop.
fn next_request<T>(shared: &Shared<T>) -> Option<DownloadRequest<T>>
where
    T: Clone + Eq + Hash,
{
    let mut queue = shared.lock();
    loop {
        if queue.quit {
            queue.state = WorkerState::Stopped;
            return None;
        }

        if let Some(request) = queue.pending.pop() {
            queue.in_flight = true;
            queue.state = WorkerState::Draining;
            return Some(request);
        }

        queue.state = WorkerState::Idle;
        queue = shared
            .wake
            .wait(queue)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// A failed request will never be delivered, so it stops being the latest
/// for its target unless something newer was queued meanwhile.
fn forget_failed<T>(queue: &mut QueueState<T>, request: &DownloadRequest<T>)
where
    T: Clone + Eq + Hash,
{
    if queue.latest.get(&request.target) == Some(&request.generation) {
        queue.latest.remove(&request.target);
    }
}

/// Decide what to do with a successful load, given what was queued for the
/// same target while it was in flight.
fn settle<T>(queue: &mut QueueState<T>, request: DownloadRequest<T>, bitmap: Bitmap) -> Outcome<T>
where
    T: Clone + Eq + Hash,
{
    let generation = match queue.pending.url_for(&request.target) {
        None => request.generation,
        Some(url) if url != request.url => {
            tracing::trace!(url = %request.url, "stale thumbnail dropped");
            return Outcome::Stale;
        }
        // The same URL was queued again: deliver once and drop the duplicate.
        Some(_) => match queue.pending.remove(&request.target) {
            Some(duplicate) => duplicate.generation,
            None => request.generation,
        },
    };

    Outcome::Dispatch(ThumbnailReady {
        target: request.target,
        bitmap: Arc::new(bitmap),
        url: request.url,
        generation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WAIT: Duration = Duration::from_secs(5);

    fn ok_loader(url: &str) -> Result<Bitmap, LoadError> {
        Ok(Bitmap::filled(url.len() as u32, 1, [0; 4]))
    }

    /// Poll until `cond` holds or the deadline passes.
    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_initial_state() {
        let downloader = ThumbnailDownloader::<u32>::new(ok_loader);
        assert_eq!(downloader.state(), WorkerState::Idle);
        assert_eq!(downloader.pending_len(), 0);
        assert_eq!(downloader.stats(), WorkerStats::default());
    }

    #[test]
    fn test_overwrite_before_start_loads_only_latest() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let mut downloader = ThumbnailDownloader::<u32>::new(move |url: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            ok_loader(url)
        });

        downloader.enqueue(1, "url1");
        downloader.enqueue(1, "url2");
        assert_eq!(downloader.pending_len(), 1);
        assert_eq!(downloader.state(), WorkerState::Draining);

        downloader.start().unwrap();

        let ready = downloader.recv_ready_timeout(WAIT).expect("thumbnail");
        assert_eq!(ready.target, 1);
        assert_eq!(ready.url, "url2");

        assert!(wait_until(|| downloader.state() == WorkerState::Idle));
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        let stats = downloader.stats();
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.overwritten, 1);
        assert_eq!(stats.completed, 1);
    }

    #[test]
    fn test_start_twice_fails() {
        let mut downloader = ThumbnailDownloader::<u32>::new(ok_loader);
        downloader.start().unwrap();
        assert!(matches!(downloader.start(), Err(WorkerError::AlreadyStarted)));
        downloader.join().unwrap();
    }

    #[test]
    fn test_start_after_quit_fails() {
        let mut downloader = ThumbnailDownloader::<u32>::new(ok_loader);
        downloader.quit();
        assert_eq!(downloader.state(), WorkerState::Stopped);
        assert!(matches!(downloader.start(), Err(WorkerError::Stopped)));
    }

    #[test]
    fn test_enqueue_after_quit_is_ignored() {
        let downloader = ThumbnailDownloader::<u32>::new(ok_loader);
        downloader.quit();
        downloader.enqueue(1, "late");

        assert_eq!(downloader.pending_len(), 0);
        assert_eq!(downloader.stats().enqueued, 0);
        assert_eq!(downloader.dispatch_ready(|_| panic!("no delivery expected")), 0);
    }

    #[test]
    fn test_clear_queue_before_start() {
        let downloader = ThumbnailDownloader::<u32>::new(ok_loader);
        downloader.enqueue(1, "a");
        downloader.enqueue(2, "b");

        downloader.clear_queue();

        assert_eq!(downloader.pending_len(), 0);
        assert_eq!(downloader.state(), WorkerState::Idle);
        assert_eq!(downloader.stats().cleared, 2);
    }

    #[test]
    fn test_failure_is_counted_and_not_delivered() {
        let mut downloader = ThumbnailDownloader::<u32>::new(|url: &str| {
            if url == "good" {
                ok_loader(url)
            } else {
                Err(LoadError::Decode(photo_gallery_render::DecodeError::Empty))
            }
        });
        downloader.start().unwrap();

        downloader.enqueue(1, "bad");
        downloader.enqueue(2, "good");

        let ready = downloader.recv_ready_timeout(WAIT).expect("good thumbnail");
        assert_eq!(ready.target, 2);
        assert_eq!(downloader.stats().failed, 1);

        downloader.join().unwrap();
    }

    #[test]
    fn test_failed_load_forgets_target() {
        let mut downloader = ThumbnailDownloader::<u32>::new(|_: &str| {
            Err(LoadError::Decode(photo_gallery_render::DecodeError::Empty))
        });
        downloader.start().unwrap();

        downloader.enqueue(1, "bad");
        downloader.enqueue(2, "worse");

        assert!(wait_until(|| downloader.stats().failed == 2));
        assert!(downloader.shared.lock().latest.is_empty());
        assert_eq!(downloader.dispatch_ready(|_| panic!("failures are not delivered")), 0);

        downloader.join().unwrap();
    }

    #[test]
    fn test_failed_load_keeps_newer_request_for_target() {
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let mut downloader = ThumbnailDownloader::<u32>::new(move |url: &str| {
            let _ = release_rx.recv_timeout(WAIT);
            if url == "old" {
                Err(LoadError::Decode(photo_gallery_render::DecodeError::Empty))
            } else {
                ok_loader(url)
            }
        });
        downloader.start().unwrap();

        downloader.enqueue(1, "old");
        assert!(wait_until(|| downloader.pending_len() == 0));
        downloader.enqueue(1, "new");

        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();

        let ready = downloader.recv_ready_timeout(WAIT).expect("newer thumbnail");
        assert_eq!(ready.url, "new");
        assert_eq!(downloader.stats().failed, 1);

        downloader.join().unwrap();
    }

    #[test]
    fn test_pending_requests_in_drain_order() {
        let downloader = ThumbnailDownloader::<&'static str>::new(ok_loader);
        downloader.enqueue("t1", "a");
        downloader.enqueue("t2", "b");
        downloader.enqueue("t1", "c");

        let order: Vec<_> = downloader
            .pending_requests()
            .into_iter()
            .map(|req| (req.target, req.url))
            .collect();
        assert_eq!(
            order,
            vec![("t1", "c".to_string()), ("t2", "b".to_string())]
        );
    }
}
