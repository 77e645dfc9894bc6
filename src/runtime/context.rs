use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::debug;

use crate::config::ImageSourceConfig;
use crate::error::{ImageSourceError, Result};
use crate::request::id::ImageRequestId;

use super::callback::CallbackQueue;
use super::pool::DecodePool;

/// Process-wide state shared by image sources.
///
/// Create one at startup and hand clones of the `Arc` to every source.
/// It owns the callback thread, the bounded decode pool and the request id
/// counter.
pub struct ImageContext {
    config: ImageSourceConfig,
    runtime: Option<Runtime>,
    pool: DecodePool,
    callbacks: CallbackQueue,
    next_request_id: AtomicI64,
}

impl ImageContext {
    /// Start a context with its own tokio runtime.
    pub fn new(config: ImageSourceConfig) -> Result<Arc<Self>> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name("image-source-worker")
            .enable_all()
            .build()
            .map_err(ImageSourceError::Runtime)?;
        let handle = runtime.handle().clone();

        Self::build(config, Some(runtime), handle)
    }

    /// Start a context on an existing multi-threaded tokio runtime.
    pub fn with_handle(handle: Handle, config: ImageSourceConfig) -> Result<Arc<Self>> {
        Self::build(config, None, handle)
    }

    fn build(config: ImageSourceConfig, runtime: Option<Runtime>, handle: Handle) -> Result<Arc<Self>> {
        let callbacks = CallbackQueue::start(&config.callback_thread_name)?;
        let pool = DecodePool::new(handle, config.decode_permits());

        debug!(
            max_concurrent_decodes = config.decode_permits(),
            owns_runtime = runtime.is_some(),
            "image context started"
        );

        Ok(Arc::new(Self {
            config,
            runtime,
            pool,
            callbacks,
            next_request_id: AtomicI64::new(1),
        }))
    }

    pub fn config(&self) -> &ImageSourceConfig {
        &self.config
    }

    pub fn callbacks(&self) -> &CallbackQueue {
        &self.callbacks
    }

    pub fn pool(&self) -> &DecodePool {
        &self.pool
    }

    pub fn handle(&self) -> &Handle {
        self.pool.handle()
    }

    /// Next id from the process-wide counter
    pub(crate) fn next_request_id(&self) -> ImageRequestId {
        ImageRequestId::from_raw(self.next_request_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Drop for ImageContext {
    fn drop(&mut self) {
        // Blocking shutdown panics when the last reference goes away inside async code
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl fmt::Debug for ImageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageContext")
            .field("config", &self.config)
            .field("owns_runtime", &self.runtime.is_some())
            .field("in_flight", &self.pool.in_flight())
            .finish()
    }
}
