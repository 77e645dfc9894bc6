use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while setting up sources and contexts.
///
/// Failures of individual requests never show up here: they are delivered
/// as results without an image.
#[derive(Debug, Error)]
pub enum ImageSourceError {
    #[error("failed to start image runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("expected a file URL, got {0}")]
    NotAFileUrl(String),

    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Why a decode produced no image.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read image: {0}")]
    Io(#[from] io::Error),

    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
}

impl DecodeError {
    /// Missing files are routine (deleted assets, stale caches)
    pub fn is_not_found(&self) -> bool {
        matches!(self, DecodeError::Io(err) if err.kind() == io::ErrorKind::NotFound)
    }
}

/// Why a download produced no bytes.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("response body exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    /// For downloaders other than the bundled HTTP one
    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = ImageSourceError> = std::result::Result<T, E>;
