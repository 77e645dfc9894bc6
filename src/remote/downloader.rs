//! Downloaders fetching encoded image bytes for remote sources.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::trace;

use crate::config::HttpConfig;
use crate::error::{DownloadError, ImageSourceError, Result};
use crate::runtime::pool::lock;

/// Download progress as a fraction in `0.0..=1.0`.
pub type DownloadProgress = Arc<dyn Fn(f64) + Send + Sync + 'static>;

/// Fetches the encoded bytes behind a URL.
#[async_trait]
pub trait ImageDownloader: Send + Sync + 'static {
    async fn download(&self, url: &Url, progress: DownloadProgress) -> Result<Vec<u8>, DownloadError>;
}

/// Up-front allocation for bodies with a declared length.
const MAX_PREALLOCATION: u64 = 1024 * 1024;

/// Plain HTTP(S) downloader.
#[derive(Debug, Clone)]
pub struct HttpImageDownloader {
    client: Client,
    max_body_bytes: u64,
}

impl HttpImageDownloader {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder.build().map_err(ImageSourceError::HttpClient)?;
        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

#[async_trait]
impl ImageDownloader for HttpImageDownloader {
    async fn download(&self, url: &Url, progress: DownloadProgress) -> Result<Vec<u8>, DownloadError> {
        let mut response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }

        let limit = self.max_body_bytes;
        let total = response.content_length().filter(|&total| total > 0);
        if total.is_some_and(|total| total > limit) {
            return Err(DownloadError::TooLarge { limit });
        }

        // The declared length is untrusted
        let mut bytes = Vec::with_capacity(total.map_or(0, |total| total.min(MAX_PREALLOCATION)) as usize);
        while let Some(chunk) = response.chunk().await? {
            if (bytes.len() + chunk.len()) as u64 > limit {
                return Err(DownloadError::TooLarge { limit });
            }
            bytes.extend_from_slice(&chunk);
            if let Some(total) = total {
                progress((bytes.len() as f64 / total as f64).min(1.0));
            }
        }

        progress(1.0);
        trace!(%url, len = bytes.len(), "downloaded image");
        Ok(bytes)
    }
}

#[derive(Default)]
struct MemoryCache {
    entries: HashMap<Url, Arc<Vec<u8>>>,
    // Least recently used first
    order: VecDeque<Url>,
}

impl MemoryCache {
    fn get(&mut self, url: &Url) -> Option<Arc<Vec<u8>>> {
        let bytes = self.entries.get(url).cloned()?;
        self.touch(url);
        Some(bytes)
    }

    fn insert(&mut self, url: Url, bytes: Arc<Vec<u8>>, capacity: usize) {
        if capacity == 0 {
            return;
        }
        if self.entries.insert(url.clone(), bytes).is_some() {
            self.touch(&url);
            return;
        }
        self.order.push_back(url);
        while self.order.len() > capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
    }

    fn touch(&mut self, url: &Url) {
        if let Some(position) = self.order.iter().position(|cached| cached == url) {
            if let Some(url) = self.order.remove(position) {
                self.order.push_back(url);
            }
        }
    }
}

/// Wraps another downloader with a bounded in-memory cache keyed by URL.
pub struct CachedImageDownloader<D> {
    inner: D,
    capacity: usize,
    cache: Mutex<MemoryCache>,
}

impl<D: ImageDownloader> CachedImageDownloader<D> {
    pub fn new(inner: D, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            cache: Mutex::default(),
        }
    }

    pub fn cached(&self) -> usize {
        lock(&self.cache).entries.len()
    }
}

impl CachedImageDownloader<HttpImageDownloader> {
    /// HTTP downloader with the cache size taken from config
    pub fn http(config: &HttpConfig) -> Result<Self> {
        Ok(Self::new(HttpImageDownloader::new(config)?, config.cache_capacity))
    }
}

#[async_trait]
impl<D: ImageDownloader> ImageDownloader for CachedImageDownloader<D> {
    async fn download(&self, url: &Url, progress: DownloadProgress) -> Result<Vec<u8>, DownloadError> {
        let hit = lock(&self.cache).get(url);
        if let Some(bytes) = hit {
            trace!(%url, "image cache hit");
            progress(1.0);
            return Ok(bytes.as_ref().clone());
        }

        let bytes = self.inner.download(url, progress).await?;
        lock(&self.cache).insert(url.clone(), Arc::new(bytes.clone()), self.capacity);
        Ok(bytes)
    }
}
