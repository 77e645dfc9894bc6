use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::request::id::ImageRequestId;
use crate::request::result::ImageRequestResult;

use super::pool::{lock, DecodePool, RequestToken};

type Handler<T> = Box<dyn FnMut(ImageRequestResult<T>) + Send + 'static>;

/// Result handler of one pool-tracked request.
///
/// `deliver` must only be called on the callback context. It drops results
/// once the request is cancelled and stops tracking the request after the
/// first non-degraded delivery.
pub(crate) struct Delivery<T> {
    id: ImageRequestId,
    token: Arc<RequestToken>,
    pool: DecodePool,
    handler: Mutex<Handler<T>>,
}

impl<T> Delivery<T> {
    pub(crate) fn new<F>(id: ImageRequestId, token: Arc<RequestToken>, pool: DecodePool, handler: F) -> Arc<Self>
    where
        F: FnMut(ImageRequestResult<T>) + Send + 'static,
    {
        Arc::new(Self {
            id,
            token,
            pool,
            handler: Mutex::new(Box::new(handler)),
        })
    }

    pub(crate) fn token(&self) -> &Arc<RequestToken> {
        &self.token
    }

    pub(crate) fn deliver(&self, result: ImageRequestResult<T>) {
        if self.token.is_cancelled() {
            trace!(id = %self.id, "dropping result of cancelled request");
            return;
        }
        if !result.degraded {
            self.pool.finish(self.id);
        }
        let mut handler = lock(&self.handler);
        (*handler)(result);
    }

    /// Give up without calling back.
    pub(crate) fn abandon(&self) {
        self.pool.finish(self.id);
    }
}
