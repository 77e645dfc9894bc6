//! Runtime configuration.
//!
//! Stored as JSON. Every field has a default, so an empty object (`{}`) is a
//! valid config.

use std::num::NonZeroUsize;
use std::path::Path;
use std::thread;

use serde::{Deserialize, Serialize};

use crate::error::{ImageSourceError, Result};

/// Settings for an [`ImageContext`](crate::ImageContext).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ImageSourceConfig {
    /// Upper bound on decodes running at the same time, across all sources
    pub max_concurrent_decodes: usize,

    /// Async worker threads driving downloads and the decode queue
    pub worker_threads: usize,

    /// Name of the thread every result handler runs on
    pub callback_thread_name: String,

    pub http: HttpConfig,
}

/// Settings for the bundled HTTP downloader.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,

    /// Whole-request timeout in seconds (0 = none)
    pub timeout_secs: u64,

    /// Images kept by the caching downloader
    pub cache_capacity: usize,

    /// Larger response bodies fail the download
    pub max_body_bytes: u64,
}

impl Default for ImageSourceConfig {
    fn default() -> Self {
        let parallelism = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(4);

        Self {
            max_concurrent_decodes: parallelism,
            worker_threads: 2,
            callback_thread_name: "image-source-callbacks".to_owned(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("image-source/", env!("CARGO_PKG_VERSION")).to_owned(),
            timeout_secs: 60,
            cache_capacity: 64,
            max_body_bytes: 256 * 1024 * 1024,
        }
    }
}

impl ImageSourceConfig {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| ImageSourceError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Zero values fall back to one so the pool can always make progress
    pub(crate) fn decode_permits(&self) -> usize {
        self.max_concurrent_decodes.max(1)
    }
}
