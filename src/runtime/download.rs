use std::sync::atomic::{AtomicBool, Ordering};

use crate::request::id::ImageRequestId;
use crate::request::options::{ImageRequestOptions, RequestHook};

/// Fires the download start/finish hooks of one request.
///
/// Backends rarely report reliably when a download is done. Photo library
/// progress may never reach 1.0, so finish is assumed at full progress, at
/// the first non-degraded image, or at cancellation, whichever comes first.
/// Each hook fires at most once and only after a start. Call these methods
/// on the callback context only.
pub(crate) struct DownloadTracker {
    started: AtomicBool,
    finished: AtomicBool,
    on_start: Option<RequestHook>,
    on_finish: Option<RequestHook>,
}

impl DownloadTracker {
    pub(crate) fn new(options: &ImageRequestOptions) -> Self {
        Self {
            started: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            on_start: options.on_download_start.clone(),
            on_finish: options.on_download_finish.clone(),
        }
    }

    pub(crate) fn start(&self, id: ImageRequestId) {
        if !self.started.swap(true, Ordering::SeqCst) {
            if let Some(hook) = &self.on_start {
                hook(id);
            }
        }
    }

    pub(crate) fn finish(&self, id: ImageRequestId) {
        if self.started.load(Ordering::SeqCst) && !self.finished.swap(true, Ordering::SeqCst) {
            if let Some(hook) = &self.on_finish {
                hook(id);
            }
        }
    }
}
