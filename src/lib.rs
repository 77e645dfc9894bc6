//! Uniform asynchronous image fetching
//!
//! One request/cancel/deliver contract over three image origins:
//! - Local files, decoded and oriented on a bounded worker pool
//! - Photo library assets, bridged through a host-provided [`PhotoLibrary`]
//! - Remote URLs, downloaded through an [`ImageDownloader`]
//!
//! All result handlers run on the callback thread of an [`ImageContext`].

pub mod any;
pub mod asset;
pub mod config;
pub mod error;
pub mod local;
pub mod remote;
pub mod request;
pub mod runtime;

#[cfg(test)]
mod test_support;

pub use any::AnyImageSource;
pub use asset::backend::{
    Asset, AssetDeliveryMode, AssetFetchResult, AssetRequestOptions, AssetResizeMode, AssetResultInfo,
    ContentEditingInput, ContentMode, PhotoLibrary, TargetSize,
};
pub use asset::source::PhotoAssetImageSource;
pub use config::{HttpConfig, ImageSourceConfig};
pub use error::{DecodeError, DownloadError, ImageSourceError, Result};
pub use local::properties::GeoLocation;
pub use local::source::LocalImageSource;
pub use remote::downloader::{CachedImageDownloader, DownloadProgress, HttpImageDownloader, ImageDownloader};
pub use remote::source::RemoteImageSource;
pub use request::id::ImageRequestId;
pub use request::image::{FromDecodedImage, Size};
pub use request::metadata::{ImageMetadata, Properties, PropertyValue};
pub use request::options::{ImageDeliveryMode, ImageRequestOptions, ImageRequestOptionsVersion, ImageSizeOption};
pub use request::orientation::ExifOrientation;
pub use request::result::ImageRequestResult;
pub use request::source::ImageSource;
pub use runtime::context::ImageContext;
