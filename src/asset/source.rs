use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use image::DynamicImage;
use tracing::{debug, trace};

use crate::local::pipeline::ImageInput;
use crate::request::id::ImageRequestId;
use crate::request::image::{FromDecodedImage, Size};
use crate::request::metadata::ImageMetadata;
use crate::request::options::{ImageDeliveryMode, ImageRequestOptions, ImageSizeOption};
use crate::request::result::ImageRequestResult;
use crate::request::source::ImageSource;
use crate::runtime::context::ImageContext;
use crate::runtime::download::DownloadTracker;
use crate::runtime::pool::{lock, RequestToken};
use crate::AnyImageSource;

use super::backend::{
    Asset, AssetDeliveryMode, AssetFetchResult, AssetRef, AssetRequestOptions, AssetResizeMode,
    AssetResultInfo, ContentMode, EditingRequestId, NativeRequestId, PhotoLibrary, TargetSize,
};

/// Bookkeeping shared by every request of one source.
///
/// Native ids are only unique among outstanding requests, so entries live
/// exactly as long as the request they belong to.
#[derive(Default)]
struct BridgeState {
    outstanding: HashMap<ImageRequestId, Arc<RequestToken>>,
    editing_requests: HashMap<ImageRequestId, EditingRequestId>,
}

/// An image in the platform photo library.
#[derive(Clone)]
pub struct PhotoAssetImageSource {
    asset: AssetRef,
    library: Arc<dyn PhotoLibrary>,
    context: Arc<ImageContext>,
    state: Arc<Mutex<BridgeState>>,
}

impl PhotoAssetImageSource {
    pub fn new(context: Arc<ImageContext>, asset: Asset, library: Arc<dyn PhotoLibrary>) -> Self {
        Self::with_asset_ref(context, AssetRef::Resolved(asset), library)
    }

    /// Source for the asset at `index` of a fetch result, resolved on each use.
    pub fn from_fetch_result(
        context: Arc<ImageContext>,
        result: Arc<dyn AssetFetchResult>,
        index: usize,
        library: Arc<dyn PhotoLibrary>,
    ) -> Self {
        Self::with_asset_ref(context, AssetRef::Fetched { result, index }, library)
    }

    fn with_asset_ref(context: Arc<ImageContext>, asset: AssetRef, library: Arc<dyn PhotoLibrary>) -> Self {
        Self {
            asset,
            library,
            context,
            state: Arc::default(),
        }
    }

    pub fn asset(&self) -> Asset {
        self.asset.load()
    }

    #[cfg(test)]
    fn outstanding_requests(&self) -> usize {
        lock(&self.state).outstanding.len()
    }
}

/// Platform parameters for a request.
pub(crate) fn request_parameters(options: &ImageRequestOptions) -> (AssetRequestOptions, TargetSize, ContentMode) {
    let (delivery_mode, resize_mode) = match options.delivery_mode {
        ImageDeliveryMode::Progressive => (AssetDeliveryMode::Opportunistic, AssetResizeMode::Fast),
        ImageDeliveryMode::Best => (AssetDeliveryMode::HighQualityFormat, AssetResizeMode::Exact),
    };

    let (target_size, content_mode) = match options.size {
        ImageSizeOption::FullResolution => (TargetSize::Maximum, ContentMode::AspectFill),
        ImageSizeOption::FitSize(size) => (TargetSize::Bounded(size), ContentMode::AspectFit),
        ImageSizeOption::FillSize(size) => (TargetSize::Bounded(size), ContentMode::AspectFill),
    };

    let platform_options = AssetRequestOptions {
        delivery_mode,
        resize_mode,
        version: options.version,
        network_access_allowed: true,
    };

    (platform_options, target_size, content_mode)
}

/// State of one request, shared by the platform callbacks.
struct AssetRequest<T> {
    source: PhotoAssetImageSource,
    token: Arc<RequestToken>,
    finished: AtomicBool,
    tracker: DownloadTracker,
    needs_metadata: bool,
    handler: Mutex<Box<dyn FnMut(ImageRequestResult<T>) + Send + 'static>>,
}

impl<T: FromDecodedImage> AssetRequest<T> {
    fn on_progress(&self, progress: f64, native_id: NativeRequestId) {
        let id = ImageRequestId::from(native_id);
        self.tracker.start(id);
        if progress >= 1.0 {
            self.tracker.finish(id);
        }
    }

    fn on_result(self: Arc<Self>, image: Option<DynamicImage>, info: AssetResultInfo) {
        let id = ImageRequestId::from(info.request_id);
        if info.cancelled {
            // Cancelled by the platform itself counts the same as by the caller
            self.token.cancel();
        }
        let cancelled = self.token.is_cancelled();
        let likely_last = (image.is_some() && !info.degraded) || cancelled;

        // Progress may never report 1.0, so guess here as well
        if likely_last {
            self.tracker.finish(id);
        }

        if cancelled {
            self.complete(id);
            trace!(%id, "dropping result of cancelled asset request");
            return;
        }

        if let Some(error) = &info.error {
            debug!(%id, "asset request failed: {error}");
        }

        let image = image.and_then(T::from_decoded);
        if likely_last && self.needs_metadata {
            self.fetch_metadata_and_deliver(image, info.degraded, id);
        } else {
            if !info.degraded {
                self.complete(id);
            }
            self.deliver(ImageRequestResult::new(image, info.degraded, id));
        }
    }

    fn fetch_metadata_and_deliver(self: Arc<Self>, image: Option<T>, degraded: bool, id: ImageRequestId) {
        let asset = self.source.asset();
        let callbacks = self.source.context.callbacks().clone();
        let pool = self.source.context.pool().clone();
        let library = Arc::clone(&self.source.library);
        let request = Arc::clone(&self);

        let editing_id = library.request_content_editing_input(
            &asset,
            true,
            Box::new(move |input| {
                let path = input.and_then(|input| input.full_size_image_path);
                // Reading the original may be slow; keep it off the callback thread
                pool.spawn(move || {
                    let metadata = path
                        .map(|path| ImageMetadata::new(ImageInput::File(path).properties().properties))
                        .unwrap_or_default();
                    // Always queued, so the map entry below exists before this runs
                    callbacks.post(move || request.finish_with_metadata(image, degraded, id, metadata));
                });
            }),
        );

        lock(&self.source.state).editing_requests.insert(id, editing_id);
    }

    fn finish_with_metadata(&self, image: Option<T>, degraded: bool, id: ImageRequestId, metadata: ImageMetadata) {
        lock(&self.source.state).editing_requests.remove(&id);
        self.complete(id);
        if self.token.is_cancelled() {
            trace!(%id, "dropping metadata result of cancelled asset request");
            return;
        }
        self.deliver(ImageRequestResult::new(image, degraded, id).with_metadata(metadata));
    }

    /// The terminal callback was consumed: stop tracking this request.
    fn complete(&self, id: ImageRequestId) {
        let mut state = lock(&self.source.state);
        self.finished.store(true, Ordering::SeqCst);
        // A reused id may already belong to a newer request
        let ours = state
            .outstanding
            .get(&id)
            .is_some_and(|token| Arc::ptr_eq(token, &self.token));
        if ours {
            state.outstanding.remove(&id);
        }
    }

    fn deliver(&self, result: ImageRequestResult<T>) {
        let mut handler = lock(&self.handler);
        (*handler)(result);
    }
}

impl ImageSource for PhotoAssetImageSource {
    fn request_image<T, F>(&self, options: ImageRequestOptions, result_handler: F) -> ImageRequestId
    where
        T: FromDecodedImage,
        F: FnMut(ImageRequestResult<T>) + Send + 'static,
    {
        let (platform_options, target_size, content_mode) = request_parameters(&options);
        let callbacks = self.context.callbacks().clone();

        let request = Arc::new(AssetRequest {
            source: self.clone(),
            token: Arc::new(RequestToken::default()),
            finished: AtomicBool::new(false),
            tracker: DownloadTracker::new(&options),
            needs_metadata: options.needs_metadata,
            handler: Mutex::new(Box::new(result_handler)),
        });

        let progress = {
            let request = Arc::clone(&request);
            let callbacks = callbacks.clone();
            Box::new(move |progress: f64, native_id: NativeRequestId| {
                let request = Arc::clone(&request);
                callbacks.dispatch(move || request.on_progress(progress, native_id));
            })
        };

        let result = {
            let request = Arc::clone(&request);
            Box::new(move |image: Option<DynamicImage>, info: AssetResultInfo| {
                let request = Arc::clone(&request);
                callbacks.dispatch(move || request.on_result(image, info));
            })
        };

        let asset = self.asset();
        let native_id = self
            .library
            .request_image(&asset, target_size, content_mode, platform_options, progress, result);

        let id = ImageRequestId::from(native_id);

        // Results may already have arrived, even the final one
        {
            let mut state = lock(&self.state);
            if !request.finished.load(Ordering::SeqCst) {
                state.outstanding.insert(id, Arc::clone(&request.token));
            }
        }

        trace!(native_id, asset = %asset.local_identifier, "asset image requested");
        id
    }

    fn cancel_request(&self, id: ImageRequestId) {
        let token = lock(&self.state).outstanding.remove(&id);
        let Some(token) = token else {
            trace!(%id, "ignoring cancel of unknown or finished asset request");
            return;
        };
        // Marked right away so results already in flight are dropped
        token.cancel();

        let source = self.clone();
        self.context.callbacks().dispatch(move || {
            if let Ok(native_id) = NativeRequestId::try_from(id.raw()) {
                source.library.cancel_image_request(native_id);
            }
            let editing_id = lock(&source.state).editing_requests.remove(&id);
            if let Some(editing_id) = editing_id {
                source
                    .library
                    .cancel_content_editing_input_request(&source.asset(), editing_id);
            }
        });
    }

    fn image_size<F>(&self, completion: F)
    where
        F: FnOnce(Option<Size>) + Send + 'static,
    {
        let asset = self.asset.clone();
        self.context
            .callbacks()
            .dispatch(move || completion(Some(asset.load().pixel_size())));
    }

    fn full_resolution_image_data<F>(&self, completion: F)
    where
        F: FnOnce(Option<Vec<u8>>) + Send + 'static,
    {
        let options = AssetRequestOptions {
            delivery_mode: AssetDeliveryMode::HighQualityFormat,
            resize_mode: AssetResizeMode::None,
            version: Default::default(),
            network_access_allowed: true,
        };
        let callbacks = self.context.callbacks().clone();
        self.library.request_image_data(
            &self.asset(),
            options,
            Box::new(move |data| callbacks.dispatch(move || completion(data))),
        );
    }

    fn is_equal_to(&self, other: &AnyImageSource) -> bool {
        match other {
            AnyImageSource::Asset(other) => {
                Arc::ptr_eq(&self.state, &other.state)
                    || other.asset().local_identifier == self.asset().local_identifier
            }
            _ => false,
        }
    }
}

impl fmt::Debug for PhotoAssetImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhotoAssetImageSource")
            .field("asset", &self.asset().local_identifier)
            .finish()
    }
}
