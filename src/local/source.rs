use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::DynamicImage;
use reqwest::Url;
use tracing::{debug, trace};

use crate::error::{ImageSourceError, Result};
use crate::request::id::ImageRequestId;
use crate::request::image::{FromDecodedImage, Size};
use crate::request::options::ImageRequestOptions;
use crate::request::result::ImageRequestResult;
use crate::request::source::ImageSource;
use crate::runtime::context::ImageContext;
use crate::runtime::delivery::Delivery;
use crate::runtime::pool::lock;
use crate::AnyImageSource;

use super::pipeline::{self, DecodeRequest, ImageInput};
use super::properties::GeoLocation;

/// An image stored in a local file.
#[derive(Clone)]
pub struct LocalImageSource {
    path: PathBuf,
    preview_image: Option<Arc<DynamicImage>>,
    location: Option<GeoLocation>,
    context: Arc<ImageContext>,
    full_size: Arc<Mutex<Option<Size>>>,
}

impl LocalImageSource {
    pub fn new(context: Arc<ImageContext>, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            preview_image: None,
            location: None,
            context,
            full_size: Arc::default(),
        }
    }

    /// Create from a `file://` URL. Use [`RemoteImageSource`](crate::RemoteImageSource) for anything else.
    pub fn from_url(context: Arc<ImageContext>, url: &Url) -> Result<Self> {
        if url.scheme() != "file" {
            return Err(ImageSourceError::NotAFileUrl(url.to_string()));
        }
        let path = url
            .to_file_path()
            .map_err(|()| ImageSourceError::NotAFileUrl(url.to_string()))?;
        Ok(Self::new(context, path))
    }

    /// Low quality image delivered first to progressive requests
    pub fn with_preview(mut self, preview: DynamicImage) -> Self {
        self.preview_image = Some(Arc::new(preview));
        self
    }

    /// Device location merged into the GPS metadata when the file has none
    pub fn with_location(mut self, location: GeoLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn input(&self) -> ImageInput {
        ImageInput::File(self.path.clone())
    }
}

impl ImageSource for LocalImageSource {
    fn request_image<T, F>(&self, options: ImageRequestOptions, result_handler: F) -> ImageRequestId
    where
        T: FromDecodedImage,
        F: FnMut(ImageRequestResult<T>) + Send + 'static,
    {
        let id = self.context.next_request_id();
        let pool = self.context.pool().clone();
        let callbacks = self.context.callbacks().clone();
        let delivery = Delivery::new(id, pool.register(id), pool.clone(), result_handler);

        if let (Some(preview), true) = (&self.preview_image, options.is_progressive()) {
            let preview = Arc::clone(preview);
            let delivery = Arc::clone(&delivery);
            callbacks.dispatch(move || {
                let image = T::from_decoded((*preview).clone());
                delivery.deliver(ImageRequestResult::new(image, true, id));
            });
        }

        let request = DecodeRequest {
            input: self.input(),
            size: options.size,
            needs_metadata: options.needs_metadata,
            location: self.location,
        };
        trace!(%id, path = %self.path.display(), size = ?options.size, "local image requested");

        pool.spawn(move || match pipeline::decode(&request, delivery.token()) {
            Ok(decoded) => {
                let image = decoded.image.and_then(T::from_decoded);
                let result = ImageRequestResult::new(image, false, id).with_metadata(decoded.metadata);
                callbacks.post(move || delivery.deliver(result));
            }
            Err(_cancelled) => {
                debug!(%id, "local image request cancelled");
                delivery.abandon();
            }
        });

        id
    }

    fn cancel_request(&self, id: ImageRequestId) {
        self.context.pool().cancel(id);
    }

    fn image_size<F>(&self, completion: F)
    where
        F: FnOnce(Option<Size>) + Send + 'static,
    {
        let callbacks = self.context.callbacks().clone();
        let cached = *lock(&self.full_size);
        if let Some(size) = cached {
            callbacks.dispatch(move || completion(Some(size)));
            return;
        }

        let input = self.input();
        let cache = Arc::clone(&self.full_size);
        self.context.pool().spawn(move || {
            let size = input.displayed_size();
            callbacks.post(move || {
                if size.is_some() {
                    *lock(&cache) = size;
                }
                completion(size);
            });
        });
    }

    fn full_resolution_image_data<F>(&self, completion: F)
    where
        F: FnOnce(Option<Vec<u8>>) + Send + 'static,
    {
        let callbacks = self.context.callbacks().clone();
        let path = self.path.clone();
        self.context.pool().spawn(move || {
            let data = match std::fs::read(&path) {
                Ok(data) => Some(data),
                Err(err) => {
                    debug!("cannot read {}: {err}", path.display());
                    None
                }
            };
            callbacks.post(move || completion(data));
        });
    }

    fn is_equal_to(&self, other: &AnyImageSource) -> bool {
        matches!(other, AnyImageSource::Local(other) if other.path == self.path)
    }
}

impl fmt::Debug for LocalImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalImageSource")
            .field("path", &self.path)
            .field("has_preview", &self.preview_image.is_some())
            .field("location", &self.location)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::options::{ImageDeliveryMode, ImageSizeOption};
    use crate::test_support::{
        announce_decodes, block_callbacks, collect_results, jpeg_bytes, jpeg_with_exif, test_context, write_fixture,
        AnnouncedImage, ExifEntry,
    };
    use std::sync::mpsc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_full_resolution_single_delivery() {
        let context = test_context();
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "dog.jpg", &jpeg_bytes(100, 200));
        let source = LocalImageSource::new(context, path);

        let (tx, rx) = mpsc::channel();
        let id = source.request_image::<DynamicImage, _>(ImageRequestOptions::default(), move |result| {
            tx.send(result).unwrap();
        });

        let result = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(result.request_id, id);
        assert!(!result.degraded);
        assert!(result.metadata.is_empty());
        let image = result.image.unwrap();
        assert_eq!((image.width(), image.height()), (100, 200));

        // Best delivery mode: nothing else arrives
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_fit_size_preserves_aspect_ratio() {
        let context = test_context();
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "dog.jpg", &jpeg_bytes(100, 200));
        let source = LocalImageSource::new(context, path);

        let options = ImageRequestOptions::new().with_size(ImageSizeOption::FitSize(Size::new(50, 50)));
        let results = collect_results::<image::RgbaImage>(|tx| {
            source.request_image(options, move |result| tx.send(result).unwrap());
        }, 1);

        let image = results[0].image.as_ref().unwrap();
        assert_eq!(image.dimensions(), (25, 50));
    }

    #[test]
    fn test_missing_file_delivers_empty_result() {
        let source = LocalImageSource::new(test_context(), "/nonexistent/dog.jpg");

        let results = collect_results::<DynamicImage>(|tx| {
            source.request_image(ImageRequestOptions::default(), move |result| tx.send(result).unwrap());
        }, 1);

        assert!(results[0].image.is_none());
        assert!(!results[0].degraded);
    }

    #[test]
    fn test_progressive_preview_comes_first() {
        let context = test_context();
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "dog.jpg", &jpeg_bytes(100, 200));
        let source = LocalImageSource::new(context, path).with_preview(DynamicImage::new_rgb8(5, 10));

        let options = ImageRequestOptions::new().with_delivery_mode(ImageDeliveryMode::Progressive);
        let results = collect_results::<DynamicImage>(|tx| {
            source.request_image(options, move |result| tx.send(result).unwrap());
        }, 2);

        assert!(results[0].degraded);
        assert_eq!(results[0].image.as_ref().unwrap().width(), 5);
        assert!(!results[1].degraded);
        assert_eq!(results[1].image.as_ref().unwrap().width(), 100);
        assert_eq!(results[0].request_id, results[1].request_id);
    }

    #[test]
    fn test_best_mode_skips_preview() {
        let context = test_context();
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "dog.jpg", &jpeg_bytes(20, 20));
        let source = LocalImageSource::new(context, path).with_preview(DynamicImage::new_rgb8(5, 5));

        let (tx, rx) = mpsc::channel();
        source.request_image::<DynamicImage, _>(ImageRequestOptions::default(), move |result| {
            tx.send(result).unwrap();
        });

        let result = rx.recv_timeout(WAIT).unwrap();
        assert!(!result.degraded);
        assert_eq!(result.image.unwrap().width(), 20);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_cancelled_request_stays_silent() {
        let context = test_context();
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "dog.jpg", &jpeg_bytes(300, 300));
        let source = LocalImageSource::new(context, path);

        let (tx, rx) = mpsc::channel();
        let first_tx = tx.clone();
        let first = source.request_image::<DynamicImage, _>(ImageRequestOptions::default(), move |result| {
            first_tx.send(result.request_id).unwrap();
        });
        source.cancel_request(first);

        let second = source.request_image::<DynamicImage, _>(ImageRequestOptions::default(), move |result| {
            tx.send(result.request_id).unwrap();
        });

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), second);
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());

        // Cancelling again, or cancelling a finished request, is harmless
        source.cancel_request(first);
        source.cancel_request(second);
    }

    #[test]
    fn test_cancel_after_decode_before_delivery() {
        let context = test_context();
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "decoded.jpg", &jpeg_bytes(73, 10));
        let source = LocalImageSource::new(context.clone(), path);
        let decoded = announce_decodes(73);

        let release = block_callbacks(&context);
        let (tx, rx) = mpsc::channel();
        let id = source.request_image::<AnnouncedImage, _>(ImageRequestOptions::default(), move |result| {
            tx.send(result.request_id).unwrap();
        });

        decoded.recv_timeout(WAIT).unwrap();
        source.cancel_request(id);
        release.send(()).unwrap();

        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
        assert_eq!(context.pool().in_flight(), 0);
    }

    #[test]
    fn test_cancel_from_preview_handler_stops_final_delivery() {
        let context = test_context();
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "dog.jpg", &jpeg_bytes(60, 60));
        let source = LocalImageSource::new(context, path).with_preview(DynamicImage::new_rgb8(6, 6));

        let (tx, rx) = mpsc::channel();
        let canceller = source.clone();
        let options = ImageRequestOptions::new().with_delivery_mode(ImageDeliveryMode::Progressive);
        source.request_image::<DynamicImage, _>(options, move |result| {
            if result.degraded {
                canceller.cancel_request(result.request_id);
            }
            tx.send(result.degraded).unwrap();
        });

        assert!(rx.recv_timeout(WAIT).unwrap());
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn test_metadata_only_when_requested() {
        let context = test_context();
        let dir = tempfile::tempdir().unwrap();
        let bytes = jpeg_with_exif(&jpeg_bytes(40, 20), &[ExifEntry::Make("Acme")]);
        let path = write_fixture(dir.path(), "meta.jpg", &bytes);
        let source = LocalImageSource::new(context, path).with_location(GeoLocation::new(-1.0, 2.0));

        let results = collect_results::<DynamicImage>(|tx| {
            source.request_image(ImageRequestOptions::new().with_metadata(true), move |result| {
                tx.send(result).unwrap()
            });
        }, 1);

        let metadata = &results[0].metadata;
        assert_eq!(metadata.get("PixelWidth"), Some(&serde_json::json!(40)));
        assert_eq!(
            metadata.get("TIFF").and_then(|tiff| tiff.get("Make")),
            Some(&serde_json::json!("Acme"))
        );
        assert_eq!(
            metadata.get("GPS").and_then(|gps| gps.get("GPSLatitudeRef")),
            Some(&serde_json::json!("S"))
        );
    }

    #[test]
    fn test_image_size_applies_orientation() {
        let context = test_context();
        let dir = tempfile::tempdir().unwrap();
        let bytes = jpeg_with_exif(&jpeg_bytes(30, 10), &[ExifEntry::Orientation(6)]);
        let path = write_fixture(dir.path(), "rotated.jpg", &bytes);
        let source = LocalImageSource::new(context, path);

        for _ in 0..2 {
            let (tx, rx) = mpsc::channel();
            source.image_size(move |size| tx.send(size).unwrap());
            assert_eq!(rx.recv_timeout(WAIT).unwrap(), Some(Size::new(10, 30)));
        }
    }

    #[test]
    fn test_image_size_of_missing_file() {
        let source = LocalImageSource::new(test_context(), "/nonexistent/dog.jpg");
        let (tx, rx) = mpsc::channel();
        source.image_size(move |size| tx.send(size).unwrap());
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), None);
    }

    #[test]
    fn test_full_resolution_data_is_file_bytes() {
        let context = test_context();
        let dir = tempfile::tempdir().unwrap();
        let bytes = jpeg_bytes(8, 8);
        let path = write_fixture(dir.path(), "raw.jpg", &bytes);
        let source = LocalImageSource::new(context, path);

        let (tx, rx) = mpsc::channel();
        source.full_resolution_image_data(move |data| tx.send(data).unwrap());
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Some(bytes));
    }

    #[test]
    fn test_equality_by_path() {
        let context = test_context();
        let a = AnyImageSource::from(LocalImageSource::new(context.clone(), "/photos/a.jpg"));
        let b = AnyImageSource::from(LocalImageSource::new(context.clone(), "/photos/a.jpg"));
        let c = AnyImageSource::from(LocalImageSource::new(context, "/photos/c.jpg"));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_from_url_requires_file_scheme() {
        let context = test_context();
        let url = Url::parse("file:///photos/a.jpg").unwrap();
        let source = LocalImageSource::from_url(context.clone(), &url).unwrap();
        assert_eq!(source.path(), Path::new("/photos/a.jpg"));

        let remote = Url::parse("https://example.com/a.jpg").unwrap();
        assert!(matches!(
            LocalImageSource::from_url(context, &remote),
            Err(ImageSourceError::NotAFileUrl(_))
        ));
    }
}
