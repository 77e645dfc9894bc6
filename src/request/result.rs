use super::id::ImageRequestId;
use super::metadata::ImageMetadata;

/// One delivery for an image request.
#[derive(Debug, Clone)]
pub struct ImageRequestResult<T> {
    /// `None` when the image could not be decoded or fetched
    pub image: Option<T>,
    /// True when `image` is a low quality preview that a better delivery will follow
    pub degraded: bool,
    pub request_id: ImageRequestId,
    pub metadata: ImageMetadata,
}

impl<T> ImageRequestResult<T> {
    pub fn new(image: Option<T>, degraded: bool, request_id: ImageRequestId) -> Self {
        Self {
            image,
            degraded,
            request_id,
            metadata: ImageMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ImageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// A terminal result carrying no image.
    pub fn failed(request_id: ImageRequestId) -> Self {
        Self::new(None, false, request_id)
    }
}
