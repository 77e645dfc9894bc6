//! Execution model shared by all sources.
//!
//! - One callback thread where results are delivered (callback.rs)
//! - A bounded pool for decode work plus in-flight request tracking (pool.rs)
//! - Cancellation-aware result handlers (delivery.rs)
//! - Download start/finish hooks (download.rs)
//! - The process-wide context tying them together (context.rs)

pub mod callback;
pub mod context;
pub(crate) mod delivery;
pub(crate) mod download;
pub mod pool;
