//! Fixtures shared by the unit tests.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use reqwest::Url;

use crate::asset::backend::{
    Asset, AssetRequestOptions, AssetResultHandler, AssetResultInfo, ContentEditingInput, ContentMode,
    DataHandler, EditingInputHandler, EditingRequestId, NativeRequestId, PhotoLibrary, ProgressHandler,
    TargetSize,
};
use crate::config::ImageSourceConfig;
use crate::error::DownloadError;
use crate::remote::downloader::{DownloadProgress, ImageDownloader};
use crate::request::image::FromDecodedImage;
use crate::request::result::ImageRequestResult;
use crate::runtime::context::ImageContext;

const WAIT: Duration = Duration::from_secs(5);

pub fn test_context() -> Arc<ImageContext> {
    ImageContext::new(ImageSourceConfig::default()).unwrap()
}

/// A gradient JPEG of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    });
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut bytes, ImageFormat::Jpeg)
        .unwrap();
    bytes.into_inner()
}

#[derive(Debug, Clone, Copy)]
pub enum ExifEntry {
    Orientation(u16),
    Make(&'static str),
}

impl ExifEntry {
    fn tag(&self) -> u16 {
        match self {
            ExifEntry::Make(_) => 0x010F,
            ExifEntry::Orientation(_) => 0x0112,
        }
    }
}

/// Insert an EXIF segment with the given IFD0 entries right after SOI.
pub fn jpeg_with_exif(jpeg: &[u8], entries: &[ExifEntry]) -> Vec<u8> {
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "not a JPEG");

    let mut entries = entries.to_vec();
    entries.sort_by_key(ExifEntry::tag);

    // Big-endian TIFF header, IFD0 at offset 8
    let mut tiff = b"MM\x00\x2A\x00\x00\x00\x08".to_vec();
    let mut data_offset = 8 + 2 + 12 * entries.len() as u32 + 4;
    let mut data = Vec::new();

    tiff.extend_from_slice(&(entries.len() as u16).to_be_bytes());
    for entry in &entries {
        tiff.extend_from_slice(&entry.tag().to_be_bytes());
        match entry {
            ExifEntry::Orientation(value) => {
                tiff.extend_from_slice(&3u16.to_be_bytes());
                tiff.extend_from_slice(&1u32.to_be_bytes());
                tiff.extend_from_slice(&value.to_be_bytes());
                tiff.extend_from_slice(&[0, 0]);
            }
            ExifEntry::Make(make) => {
                let mut value = make.as_bytes().to_vec();
                value.push(0);
                tiff.extend_from_slice(&2u16.to_be_bytes());
                tiff.extend_from_slice(&(value.len() as u32).to_be_bytes());
                if value.len() <= 4 {
                    value.resize(4, 0);
                    tiff.extend_from_slice(&value);
                } else {
                    tiff.extend_from_slice(&data_offset.to_be_bytes());
                    data_offset += value.len() as u32;
                    data.extend_from_slice(&value);
                }
            }
        }
    }
    tiff.extend_from_slice(&0u32.to_be_bytes());
    tiff.extend_from_slice(&data);

    let mut segment = vec![0xFF, 0xE1];
    segment.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    segment.extend_from_slice(b"Exif\x00\x00");
    segment.extend_from_slice(&tiff);

    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&segment);
    out.extend_from_slice(&jpeg[2..]);
    out
}

pub fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Start requests through `start` and wait for `count` results.
pub fn collect_results<T>(
    start: impl FnOnce(mpsc::Sender<ImageRequestResult<T>>),
    count: usize,
) -> Vec<ImageRequestResult<T>> {
    let (tx, rx) = mpsc::channel();
    start(tx);
    (0..count).map(|_| rx.recv_timeout(WAIT).unwrap()).collect()
}

static DECODE_LISTENERS: Mutex<Vec<(u32, mpsc::Sender<()>)>> = Mutex::new(Vec::new());

/// Notified each time an [`AnnouncedImage`] of the given width is converted.
///
/// Tests share the list, so pick a width no other test decodes.
pub fn announce_decodes(width: u32) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel();
    DECODE_LISTENERS.lock().unwrap().push((width, tx));
    rx
}

/// Decoded image that tells listeners it is ready, before delivery starts.
pub struct AnnouncedImage(pub DynamicImage);

impl FromDecodedImage for AnnouncedImage {
    fn from_decoded(image: DynamicImage) -> Option<Self> {
        for (width, listener) in DECODE_LISTENERS.lock().unwrap().iter() {
            if *width == image.width() {
                let _ = listener.send(());
            }
        }
        Some(Self(image))
    }
}

/// Keep the callback thread busy until the returned sender is dropped or used.
pub fn block_callbacks(context: &ImageContext) -> mpsc::Sender<()> {
    let (release, released) = mpsc::channel::<()>();
    context.callbacks().post(move || {
        let _ = released.recv_timeout(WAIT);
    });
    release
}

fn wait_until(mut ready: impl FnMut() -> bool, what: &str) {
    let deadline = Instant::now() + WAIT;
    while !ready() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Calls the sources made into the fake library.
#[derive(Debug, Default, Clone)]
pub struct FakeCalls {
    pub cancelled_images: Vec<NativeRequestId>,
    pub cancelled_editing: Vec<EditingRequestId>,
}

type ImageHandlers = Arc<(ProgressHandler, AssetResultHandler)>;

#[derive(Default)]
struct FakeLibraryState {
    last_request_id: NativeRequestId,
    fixed_request_id: Option<NativeRequestId>,
    requests: HashMap<NativeRequestId, ImageHandlers>,
    last_editing_id: EditingRequestId,
    editing: HashMap<EditingRequestId, EditingInputHandler>,
    image_data: Option<Vec<u8>>,
    calls: FakeCalls,
}

/// Photo library driven by the test: callbacks fire only when the test says so.
#[derive(Default)]
pub struct FakePhotoLibrary {
    state: Mutex<FakeLibraryState>,
}

impl FakePhotoLibrary {
    pub fn last_request_id(&self) -> NativeRequestId {
        let id = self.state.lock().unwrap().last_request_id;
        assert!(id > 0, "no image requested yet");
        id
    }

    /// Hand out `id` for every image request, like a backend recycling ids.
    pub fn reuse_request_id(&self, id: NativeRequestId) {
        self.state.lock().unwrap().fixed_request_id = Some(id);
    }

    fn handlers(&self, id: NativeRequestId) -> ImageHandlers {
        Arc::clone(&self.state.lock().unwrap().requests[&id])
    }

    pub fn progress(&self, id: NativeRequestId, fraction: f64) {
        let handlers = self.handlers(id);
        (handlers.0)(fraction, id);
    }

    pub fn deliver(&self, id: NativeRequestId, image: Option<DynamicImage>, info: AssetResultInfo) {
        let handlers = self.handlers(id);
        (handlers.1)(image, info);
    }

    pub fn calls(&self) -> FakeCalls {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn wait_for(&self, mut done: impl FnMut(&FakeCalls) -> bool) {
        wait_until(|| done(&self.state.lock().unwrap().calls), "library call");
    }

    /// Wait for a content editing input request and return its id.
    pub fn wait_for_editing_request(&self) -> EditingRequestId {
        wait_until(|| self.state.lock().unwrap().last_editing_id > 0, "editing input request");
        self.state.lock().unwrap().last_editing_id
    }

    pub fn complete_editing_input(&self, id: EditingRequestId, path: Option<PathBuf>) {
        let completion = self.state.lock().unwrap().editing.remove(&id).unwrap();
        completion(path.map(|path| ContentEditingInput {
            full_size_image_path: Some(path),
        }));
    }

    pub fn set_image_data(&self, data: Vec<u8>) {
        self.state.lock().unwrap().image_data = Some(data);
    }
}

impl PhotoLibrary for FakePhotoLibrary {
    fn request_image(
        &self,
        _asset: &Asset,
        _target_size: TargetSize,
        _content_mode: ContentMode,
        _options: AssetRequestOptions,
        progress: ProgressHandler,
        result: AssetResultHandler,
    ) -> NativeRequestId {
        let mut state = self.state.lock().unwrap();
        let id = state.fixed_request_id.unwrap_or(state.last_request_id + 1);
        state.last_request_id = id;
        state.requests.insert(id, Arc::new((progress, result)));
        id
    }

    fn cancel_image_request(&self, id: NativeRequestId) {
        self.state.lock().unwrap().calls.cancelled_images.push(id);
    }

    fn request_image_data(&self, _asset: &Asset, _options: AssetRequestOptions, completion: DataHandler) {
        let data = self.state.lock().unwrap().image_data.clone();
        completion(data);
    }

    fn request_content_editing_input(
        &self,
        _asset: &Asset,
        _network_access_allowed: bool,
        completion: EditingInputHandler,
    ) -> EditingRequestId {
        let mut state = self.state.lock().unwrap();
        state.last_editing_id += 1;
        let id = state.last_editing_id;
        state.editing.insert(id, completion);
        id
    }

    fn cancel_content_editing_input_request(&self, _asset: &Asset, id: EditingRequestId) {
        self.state.lock().unwrap().calls.cancelled_editing.push(id);
    }
}

#[derive(Default)]
struct FakeDownloads {
    responses: Mutex<HashMap<Url, Vec<u8>>>,
    delay: Mutex<Option<Duration>>,
    count: AtomicUsize,
}

/// In-memory downloader; unknown URLs fail.
#[derive(Clone, Default)]
pub struct FakeDownloader {
    inner: Arc<FakeDownloads>,
}

impl FakeDownloader {
    pub fn insert(&self, url: Url, bytes: Vec<u8>) {
        self.inner.responses.lock().unwrap().insert(url, bytes);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.inner.delay.lock().unwrap() = Some(delay);
    }

    pub fn download_count(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageDownloader for FakeDownloader {
    async fn download(&self, url: &Url, progress: DownloadProgress) -> Result<Vec<u8>, DownloadError> {
        self.inner.count.fetch_add(1, Ordering::SeqCst);
        let delay = *self.inner.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let bytes = self.inner.responses.lock().unwrap().get(url).cloned();
        match bytes {
            Some(bytes) => {
                progress(1.0);
                Ok(bytes)
            }
            None => Err(DownloadError::Other(format!("no response for {url}"))),
        }
    }
}
