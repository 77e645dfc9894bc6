use std::fmt;
use std::sync::Arc;

use super::id::ImageRequestId;
use super::image::Size;

/// Hook fired on the callback context with the id of the request it concerns.
pub type RequestHook = Arc<dyn Fn(ImageRequestId) + Send + Sync + 'static>;

/// How large the delivered image should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSizeOption {
    /// Original pixel dimensions (after orientation correction)
    #[default]
    FullResolution,
    /// Fit entirely within the bounds, preserving aspect ratio
    FitSize(Size),
    /// Cover the bounds, preserving aspect ratio
    FillSize(Size),
}

/// Whether a request may deliver low quality previews before the final image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageDeliveryMode {
    /// Deliver once, at the best available quality
    #[default]
    Best,
    /// Deliver degraded previews first, then the final image
    Progressive,
}

/// Which version of a photo library asset to request.
///
/// Only photo library sources look at this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageRequestOptionsVersion {
    /// The most recent version, reflecting all edits
    Current,
    /// The version without adjustments
    Unadjusted,
    /// The original, highest-fidelity version
    #[default]
    Original,
}

/// Options passed to every image request.
#[derive(Clone, Default)]
pub struct ImageRequestOptions {
    pub size: ImageSizeOption,
    pub delivery_mode: ImageDeliveryMode,
    pub version: ImageRequestOptionsVersion,
    pub needs_metadata: bool,
    /// Called on the callback context when the image download starts
    pub on_download_start: Option<RequestHook>,
    /// Called on the callback context when the image download finishes
    pub on_download_finish: Option<RequestHook>,
}

impl ImageRequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, size: ImageSizeOption) -> Self {
        self.size = size;
        self
    }

    pub fn with_delivery_mode(mut self, delivery_mode: ImageDeliveryMode) -> Self {
        self.delivery_mode = delivery_mode;
        self
    }

    pub fn with_version(mut self, version: ImageRequestOptionsVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_metadata(mut self, needs_metadata: bool) -> Self {
        self.needs_metadata = needs_metadata;
        self
    }

    pub fn on_download_start(mut self, hook: impl Fn(ImageRequestId) + Send + Sync + 'static) -> Self {
        self.on_download_start = Some(Arc::new(hook));
        self
    }

    pub fn on_download_finish(mut self, hook: impl Fn(ImageRequestId) + Send + Sync + 'static) -> Self {
        self.on_download_finish = Some(Arc::new(hook));
        self
    }

    pub fn is_progressive(&self) -> bool {
        self.delivery_mode == ImageDeliveryMode::Progressive
    }
}

impl fmt::Debug for ImageRequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageRequestOptions")
            .field("size", &self.size)
            .field("delivery_mode", &self.delivery_mode)
            .field("version", &self.version)
            .field("needs_metadata", &self.needs_metadata)
            .field("on_download_start", &self.on_download_start.is_some())
            .field("on_download_finish", &self.on_download_finish.is_some())
            .finish()
    }
}
