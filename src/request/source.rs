use crate::AnyImageSource;

use super::id::ImageRequestId;
use super::image::{FromDecodedImage, Size};
use super::options::ImageRequestOptions;
use super::result::ImageRequestResult;

/// Uniform asynchronous access to an image, wherever it lives.
///
/// Every callback runs on the callback context of the owning
/// [`ImageContext`](crate::ImageContext), never concurrently with itself.
pub trait ImageSource: Send + Sync {
    /// Start a request and return its id.
    ///
    /// `result_handler`:
    /// - is called at least once unless the request is cancelled first
    /// - is never called once `cancel_request` for the id has returned on the
    ///   callback context; from any other thread a delivery that has already
    ///   started may still complete
    /// - is called at most once with [`ImageDeliveryMode::Best`](crate::ImageDeliveryMode::Best)
    /// - may be called several times with
    ///   [`ImageDeliveryMode::Progressive`](crate::ImageDeliveryMode::Progressive);
    ///   only deliveries before the last one may be degraded
    /// - may be called before this function returns when invoked on the callback context
    fn request_image<T, F>(&self, options: ImageRequestOptions, result_handler: F) -> ImageRequestId
    where
        T: FromDecodedImage,
        F: FnMut(ImageRequestResult<T>) + Send + 'static;

    /// Stop delivering results for `id`. Unknown and finished ids are ignored.
    fn cancel_request(&self, id: ImageRequestId);

    /// Displayed pixel size of the image, or `None` if it cannot be determined.
    fn image_size<F>(&self, completion: F)
    where
        F: FnOnce(Option<Size>) + Send + 'static;

    /// The original encoded bytes, or `None` on failure.
    fn full_resolution_image_data<F>(&self, completion: F)
    where
        F: FnOnce(Option<Vec<u8>>) + Send + 'static;

    /// True when `other` refers to the same underlying image.
    fn is_equal_to(&self, other: &AnyImageSource) -> bool;
}
