use std::fmt;
use std::sync::{Arc, Mutex};

use image::DynamicImage;
use reqwest::Url;
use tracing::{debug, trace, warn};

use crate::local::pipeline::{self, DecodeRequest, ImageInput};
use crate::request::id::ImageRequestId;
use crate::request::image::{FromDecodedImage, Size};
use crate::request::options::ImageRequestOptions;
use crate::request::result::ImageRequestResult;
use crate::request::source::ImageSource;
use crate::runtime::callback::CallbackQueue;
use crate::runtime::context::ImageContext;
use crate::runtime::delivery::Delivery;
use crate::runtime::download::DownloadTracker;
use crate::runtime::pool::lock;
use crate::AnyImageSource;

use super::downloader::{DownloadProgress, ImageDownloader};

/// An image behind a URL, fetched through an [`ImageDownloader`].
#[derive(Clone)]
pub struct RemoteImageSource {
    url: Url,
    preview_image: Option<Arc<DynamicImage>>,
    downloader: Arc<dyn ImageDownloader>,
    context: Arc<ImageContext>,
    full_size: Arc<Mutex<Option<Size>>>,
}

impl RemoteImageSource {
    pub fn new(context: Arc<ImageContext>, url: Url, downloader: Arc<dyn ImageDownloader>) -> Self {
        Self {
            url,
            preview_image: None,
            downloader,
            context,
            full_size: Arc::default(),
        }
    }

    /// Low quality image delivered first to progressive requests
    pub fn with_preview(mut self, preview: DynamicImage) -> Self {
        self.preview_image = Some(Arc::new(preview));
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Posts the download finish hook when dropped, so an aborted task still reports it.
struct FinishOnDrop {
    tracker: Arc<DownloadTracker>,
    callbacks: CallbackQueue,
    id: ImageRequestId,
}

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        let tracker = Arc::clone(&self.tracker);
        let id = self.id;
        self.callbacks.post(move || tracker.finish(id));
    }
}

fn trace_progress(id: ImageRequestId) -> DownloadProgress {
    Arc::new(move |fraction: f64| trace!(%id, fraction, "download progress"))
}

impl ImageSource for RemoteImageSource {
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

        let tracker = Arc::new(DownloadTracker::new(&options));
        let downloader = Arc::clone(&self.downloader);
        let url = self.url.clone();
        trace!(%id, %url, size = ?options.size, "remote image requested");

        let task_delivery = Arc::clone(&delivery);
        let task = self.context.handle().spawn(async move {
            let delivery = task_delivery;
            let token = Arc::clone(delivery.token());
            if token.is_cancelled() {
                delivery.abandon();
                return;
            }

            let started = Arc::clone(&tracker);
            callbacks.post(move || started.start(id));
            let finish = FinishOnDrop {
                tracker,
                callbacks: callbacks.clone(),
                id,
            };
            let downloaded = downloader.download(&url, trace_progress(id)).await;
            drop(finish);

            let bytes = match downloaded {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(%id, %url, "download failed: {err}");
                    callbacks.post(move || delivery.deliver(ImageRequestResult::failed(id)));
                    return;
                }
            };

            let request = DecodeRequest {
                input: ImageInput::Memory(bytes.into()),
                size: options.size,
                needs_metadata: options.needs_metadata,
                location: None,
            };
            let decode_token = Arc::clone(&token);
            let decoded = pool.run(move || pipeline::decode(&request, &decode_token)).await;

            match decoded {
                Some(Ok(decoded)) => {
                    let image = decoded.image.and_then(T::from_decoded);
                    let result = ImageRequestResult::new(image, false, id).with_metadata(decoded.metadata);
                    callbacks.post(move || delivery.deliver(result));
                }
                Some(Err(_cancelled)) => {
                    debug!(%id, "remote image request cancelled");
                    delivery.abandon();
                }
                None => callbacks.post(move || delivery.deliver(ImageRequestResult::failed(id))),
            }
        });
        delivery.token().set_abort_handle(task.abort_handle());

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

        let downloader = Arc::clone(&self.downloader);
        let pool = self.context.pool().clone();
        let url = self.url.clone();
        let cache = Arc::clone(&self.full_size);
        self.context.handle().spawn(async move {
            let size = match downloader.download(&url, Arc::new(|_: f64| {})).await {
                Ok(bytes) => {
                    let input = ImageInput::Memory(bytes.into());
                    pool.run(move || input.displayed_size()).await.flatten()
                }
                Err(err) => {
                    warn!(%url, "cannot fetch image size: {err}");
                    None
                }
            };
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
        let downloader = Arc::clone(&self.downloader);
        let url = self.url.clone();
        self.context.handle().spawn(async move {
            let data = match downloader.download(&url, Arc::new(|_: f64| {})).await {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    warn!(%url, "cannot fetch image data: {err}");
                    None
                }
            };
            callbacks.post(move || completion(data));
        });
    }

    fn is_equal_to(&self, other: &AnyImageSource) -> bool {
        matches!(other, AnyImageSource::Remote(other) if other.url == self.url)
    }
}

impl fmt::Debug for RemoteImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteImageSource")
            .field("url", &self.url.as_str())
            .field("has_preview", &self.preview_image.is_some())
            .finish()
    }
}
