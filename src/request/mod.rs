//! Request types shared by every image origin.
//!
//! - Request ids, options and results
//! - JSON-only image metadata
//! - EXIF orientation
//! - The `ImageSource` capability itself

pub mod id;
pub mod image;
pub mod metadata;
pub mod options;
pub mod orientation;
pub mod result;
pub mod source;
