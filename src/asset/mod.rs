//! Photo library assets
//!
//! Bridges the image request contract onto a platform photo library:
//! - The backend interface the host implements (backend.rs)
//! - The image source translating requests, cancellation and metadata (source.rs)

pub mod backend;
pub mod source;
