use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, ThreadId};

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::{ImageSourceError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// The single thread every result handler and hook runs on.
///
/// Jobs run one at a time, in the order they were queued. The thread exits
/// once every handle to the queue is gone and the backlog is drained.
#[derive(Clone)]
pub struct CallbackQueue {
    sender: mpsc::UnboundedSender<Job>,
    thread_id: ThreadId,
}

impl CallbackQueue {
    pub(crate) fn start(name: &str) -> Result<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    // A panicking handler must not take the queue down with it
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!("image callback panicked");
                    }
                }
                debug!("callback queue closed");
            })
            .map_err(ImageSourceError::Runtime)?;

        Ok(Self {
            sender,
            thread_id: handle.thread().id(),
        })
    }

    /// True when called from the callback thread
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Queue `job` behind everything already queued.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) {
        if self.sender.send(Box::new(job)).is_err() {
            warn!("callback queue is gone, dropping job");
        }
    }

    /// Run `job` right away when already on the callback thread, otherwise queue it.
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        if self.is_current() {
            job();
        } else {
            self.post(job);
        }
    }
}
