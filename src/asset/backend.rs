//! Interface to the platform photo library.
//!
//! Implementations wrap whatever the host OS offers. Callbacks may be invoked
//! on any thread, any number of times, and even before the requesting call
//! returns.

use std::path::PathBuf;
use std::sync::Arc;

use image::DynamicImage;

use crate::request::image::Size;
use crate::request::options::ImageRequestOptionsVersion;

/// Request id issued by the platform for an image request.
pub type NativeRequestId = i32;

/// Request id issued by the platform for a content editing input request.
pub type EditingRequestId = i32;

/// Progress callback: fraction in `0.0..=1.0` and the request it belongs to.
pub type ProgressHandler = Box<dyn Fn(f64, NativeRequestId) + Send + Sync + 'static>;

/// Image callback: the image (if any) and what the platform says about it.
pub type AssetResultHandler = Box<dyn Fn(Option<DynamicImage>, AssetResultInfo) + Send + Sync + 'static>;

pub type DataHandler = Box<dyn FnOnce(Option<Vec<u8>>) + Send + 'static>;

pub type EditingInputHandler = Box<dyn FnOnce(Option<ContentEditingInput>) + Send + 'static>;

/// A photo library entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Asset {
    /// Stable identifier of the asset within the library
    pub local_identifier: String,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl Asset {
    pub fn new(local_identifier: impl Into<String>, pixel_width: u32, pixel_height: u32) -> Self {
        Self {
            local_identifier: local_identifier.into(),
            pixel_width,
            pixel_height,
        }
    }

    pub fn pixel_size(&self) -> Size {
        Size::new(self.pixel_width, self.pixel_height)
    }
}

/// An ordered query result whose assets are resolved on access.
pub trait AssetFetchResult: Send + Sync + 'static {
    fn object_at(&self, index: usize) -> Asset;
}

/// Quality/speed trade-off for platform delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetDeliveryMode {
    /// Fast previews first, then the high quality image
    Opportunistic,
    /// Only the high quality image
    HighQualityFormat,
    /// Only a fast, possibly degraded, image
    FastFormat,
}

/// How exactly the platform honors the target size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetResizeMode {
    None,
    Fast,
    Exact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    AspectFit,
    AspectFill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSize {
    /// The largest size available
    Maximum,
    Bounded(Size),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetRequestOptions {
    pub delivery_mode: AssetDeliveryMode,
    pub resize_mode: AssetResizeMode,
    pub version: ImageRequestOptionsVersion,
    /// Allow downloading assets kept in cloud storage
    pub network_access_allowed: bool,
}

/// Details attached to each image callback.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssetResultInfo {
    pub request_id: NativeRequestId,
    /// A low quality image that a better one will follow
    pub degraded: bool,
    /// The request was cancelled; no further callbacks follow
    pub cancelled: bool,
    pub error: Option<String>,
}

/// Unmodified original of an asset, used to read its full metadata.
#[derive(Debug, Clone, Default)]
pub struct ContentEditingInput {
    pub full_size_image_path: Option<PathBuf>,
}

/// The platform photo library.
pub trait PhotoLibrary: Send + Sync + 'static {
    /// Start an image request. `result` may run several times.
    fn request_image(
        &self,
        asset: &Asset,
        target_size: TargetSize,
        content_mode: ContentMode,
        options: AssetRequestOptions,
        progress: ProgressHandler,
        result: AssetResultHandler,
    ) -> NativeRequestId;

    fn cancel_image_request(&self, id: NativeRequestId);

    /// Fetch the encoded bytes of the asset.
    fn request_image_data(&self, asset: &Asset, options: AssetRequestOptions, completion: DataHandler);

    /// Fetch the unmodified original for reading metadata.
    fn request_content_editing_input(
        &self,
        asset: &Asset,
        network_access_allowed: bool,
        completion: EditingInputHandler,
    ) -> EditingRequestId;

    fn cancel_content_editing_input_request(&self, asset: &Asset, id: EditingRequestId);
}

/// How a source gets hold of its asset.
#[derive(Clone)]
pub(crate) enum AssetRef {
    Resolved(Asset),
    Fetched {
        result: Arc<dyn AssetFetchResult>,
        index: usize,
    },
}

impl AssetRef {
    pub(crate) fn load(&self) -> Asset {
        match self {
            AssetRef::Resolved(asset) => asset.clone(),
            AssetRef::Fetched { result, index } => result.object_at(*index),
        }
    }
}
