use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use photo_gallery_cache::{CacheStats, ThumbnailCache};
use photo_gallery_core::GalleryConfig;
use photo_gallery_net::{ApiConfig, FlickrClient, GalleryItem};
use photo_gallery_scheduler::{HttpThumbnailLoader, ThumbnailDownloader, WorkerStats};
use serde::Serialize;
use std::ffi::OsString;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "photo-gallery")]
#[command(about = "Photo gallery thumbnail pipeline CLI")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print a page of recent photos as JSON.
    Recent {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Print a page of search results as JSON.
    Search {
        #[arg(value_name = "TEXT")]
        text: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Download a page of thumbnails through the worker and cache.
    Thumbs {
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
    /// Print the effective configuration as JSON.
    Config,
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct ConfigOutput {
    cache_max_bytes: usize,
    cache_max_entries: usize,
    endpoint: String,
    api_key_set: bool,
}

#[derive(Debug, Serialize)]
struct ThumbOutput {
    position: usize,
    url: String,
    width: u32,
    height: u32,
}

#[derive(Debug, Serialize)]
struct CacheOutput {
    entries: usize,
    bytes_used: usize,
    max_bytes: usize,
    max_entries: usize,
    evictions: u64,
}

impl From<CacheStats> for CacheOutput {
    fn from(stats: CacheStats) -> Self {
        Self {
            entries: stats.entry_count,
            bytes_used: stats.bytes_used,
            max_bytes: stats.max_bytes,
            max_entries: stats.max_entries,
            evictions: stats.evictions,
        }
    }
}

#[derive(Debug, Serialize)]
struct WorkerOutput {
    enqueued: u64,
    completed: u64,
    stale: u64,
    failed: u64,
}

impl From<WorkerStats> for WorkerOutput {
    fn from(stats: WorkerStats) -> Self {
        Self {
            enqueued: stats.enqueued,
            completed: stats.completed,
            stale: stats.stale,
            failed: stats.failed,
        }
    }
}

#[derive(Debug, Serialize)]
struct ThumbsOutput {
    query: Option<String>,
    page: u32,
    requested: usize,
    thumbnails: Vec<ThumbOutput>,
    cache: CacheOutput,
    worker: WorkerOutput,
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the default
/// `warn` level.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt().with_env_filter(env_filter).with_target(false).with_writer(std::io::stderr).init();
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Recent { page } => run_page(None, page),
        Commands::Search { text, page } => run_page(Some(&text), page),
        Commands::Thumbs { query, page, limit, timeout_secs } => {
            run_thumbs(query, page, limit, Duration::from_secs(timeout_secs))
        }
        Commands::Config => run_config(),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config() -> Result<GalleryConfig> {
    GalleryConfig::from_env().context("invalid configuration")
}

fn client(api: ApiConfig) -> Result<FlickrClient> {
    if !api.has_api_key() {
        anyhow::bail!("no API key configured; set PHOTO_GALLERY_API_KEY");
    }
    Ok(FlickrClient::new(api))
}

fn fetch_items(client: &FlickrClient, query: Option<&str>, page: u32) -> Result<Vec<GalleryItem>> {
    client.try_fetch_page(query, page).context("failed to fetch photo page")
}

fn run_page(query: Option<&str>, page: u32) -> Result<()> {
    let config = load_config()?;
    let client = client(config.api)?;
    let items = fetch_items(&client, query, page)?;

    let json = serde_json::to_string_pretty(&items)?;
    println!("{json}");
    Ok(())
}

fn run_thumbs(query: Option<String>, page: u32, limit: usize, timeout: Duration) -> Result<()> {
    let config = load_config()?;
    let client = client(config.api)?;
    let items = fetch_items(&client, query.as_deref(), page)?;

    let mut cache = ThumbnailCache::from_config(&config.cache);
    let mut downloader = ThumbnailDownloader::new(HttpThumbnailLoader::new());
    downloader.start().context("failed to start thumbnail worker")?;

    let requested = items.len().min(limit);
    for (position, item) in items.iter().take(requested).enumerate() {
        downloader.enqueue(position, item.url.clone());
    }

    let mut thumbnails = Vec::with_capacity(requested);
    let deadline = Instant::now() + timeout;
    loop {
        let settled = {
            let stats = downloader.stats();
            stats.completed + stats.failed + stats.stale
        };
        if settled as usize >= requested {
            break;
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tracing::warn!(
                requested,
                delivered = thumbnails.len(),
                "timed out waiting for thumbnails"
            );
            break;
        }

        let wait = remaining.min(Duration::from_millis(100));
        if let Some(ready) = downloader.recv_ready_timeout(wait) {
            thumbnails.push(ThumbOutput {
                position: ready.target,
                url: ready.url.clone(),
                width: ready.bitmap.width,
                height: ready.bitmap.height,
            });
            cache.put(ready.url, ready.bitmap);
        }
    }

    let worker = WorkerOutput::from(downloader.stats());
    downloader.quit();
    thumbnails.sort_by_key(|thumb| thumb.position);

    let payload = ThumbsOutput {
        query,
        page,
        requested,
        thumbnails,
        cache: cache.stats().into(),
        worker,
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");
    Ok(())
}

fn run_config() -> Result<()> {
    let config = load_config()?;

    let payload = ConfigOutput {
        cache_max_bytes: config.cache.max_bytes,
        cache_max_entries: config.cache.max_entries,
        endpoint: config.api.endpoint.to_string(),
        api_key_set: config.api.has_api_key(),
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");
    Ok(())
}
