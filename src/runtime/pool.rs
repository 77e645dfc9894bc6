use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::{self, AbortHandle};
use tracing::{trace, warn};

use crate::request::id::ImageRequestId;

/// Returned by [`RequestToken::checkpoint`] once the request is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("request was cancelled")]
pub struct Cancelled;

/// Cancellation state for one in-flight request.
#[derive(Debug, Default)]
pub struct RequestToken {
    cancelled: AtomicBool,
    abort: Mutex<Option<AbortHandle>>,
}

impl RequestToken {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(handle) = lock(&self.abort).take() {
            handle.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Phase boundary: bail out with `?` once cancelled.
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Attach the async task doing the work so cancelling can abort it.
    pub(crate) fn set_abort_handle(&self, handle: AbortHandle) {
        let mut slot = lock(&self.abort);
        if self.is_cancelled() {
            handle.abort();
        } else {
            *slot = Some(handle);
        }
    }
}

/// Bounded pool for CPU-bound decode work, shared by every source of a context.
///
/// Also tracks the requests currently in flight so a source can find and
/// cancel work that is queued or running.
#[derive(Clone)]
pub struct DecodePool {
    handle: Handle,
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashMap<ImageRequestId, Arc<RequestToken>>>>,
}

impl DecodePool {
    pub(crate) fn new(handle: Handle, max_concurrent: usize) -> Self {
        Self {
            handle,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            in_flight: Arc::default(),
        }
    }

    pub(crate) fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Track a new request and hand back its token.
    pub fn register(&self, id: ImageRequestId) -> Arc<RequestToken> {
        let token = Arc::new(RequestToken::default());
        lock(&self.in_flight).insert(id, Arc::clone(&token));
        token
    }

    /// Stop tracking a request that delivered or gave up.
    pub fn finish(&self, id: ImageRequestId) {
        lock(&self.in_flight).remove(&id);
    }

    /// Cancel a tracked request. Returns false if `id` is not in flight.
    pub fn cancel(&self, id: ImageRequestId) -> bool {
        let token = lock(&self.in_flight).remove(&id);
        match token {
            Some(token) => {
                token.cancel();
                trace!(%id, "cancelled in-flight request");
                true
            }
            None => false,
        }
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Run `job` on a blocking thread once a permit is free, without waiting for it.
    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let pool = self.clone();
        self.handle.spawn(async move {
            pool.run(job).await;
        });
    }

    /// Run `job` on a blocking thread once a permit is free and wait for its output.
    ///
    /// Returns `None` if the job panicked or the pool is shutting down.
    pub async fn run<F, R>(&self, job: F) -> Option<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let _permit = Arc::clone(&self.permits).acquire_owned().await.ok()?;
        match task::spawn_blocking(job).await {
            Ok(output) => Some(output),
            Err(err) => {
                warn!("decode job failed: {err}");
                None
            }
        }
    }
}

/// Lock ignoring poisoning: the guarded maps stay consistent across a panicking holder.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
