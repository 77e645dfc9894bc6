use image::{DynamicImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

/// Pixel dimensions of an image.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The larger of the two dimensions
    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Width and height exchanged
    pub fn swapped(&self) -> Self {
        Self::new(self.height, self.width)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A pixel buffer type that requests can deliver.
///
/// Conversion usually runs on a decode worker, so it may be expensive. Returning
/// `None` is reported to the caller the same way as a decode failure.
pub trait FromDecodedImage: Sized + Send + 'static {
    fn from_decoded(image: DynamicImage) -> Option<Self>;
}

impl FromDecodedImage for DynamicImage {
    fn from_decoded(image: DynamicImage) -> Option<Self> {
        Some(image)
    }
}

impl FromDecodedImage for RgbaImage {
    fn from_decoded(image: DynamicImage) -> Option<Self> {
        Some(image.into_rgba8())
    }
}

impl FromDecodedImage for RgbImage {
    fn from_decoded(image: DynamicImage) -> Option<Self> {
        Some(image.into_rgb8())
    }
}
