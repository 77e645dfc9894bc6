//! Local image files
//!
//! This module handles:
//! - Decoding files with eager pixel materialization
//! - Orientation correction and bounded thumbnails
//! - EXIF/GPS property extraction
//! - The local file image source

pub mod pipeline;
pub mod properties;
pub mod source;
