//! Remote images
//!
//! Downloads encoded bytes through a pluggable [`ImageDownloader`](downloader::ImageDownloader)
//! and decodes them with the same pipeline as local files.

pub mod downloader;
pub mod source;
