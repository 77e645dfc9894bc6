//! Decode pipeline for encoded images (local files or downloaded bytes)
//!
//! Every step runs on a decode worker. The request token is checked between
//! phases; a cancelled request stops at the next boundary and produces
//! nothing.

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::PathBuf;
use std::sync::Arc;

use image::{imageops::FilterType, DynamicImage, ImageReader};
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::request::image::Size;
use crate::request::metadata::ImageMetadata;
use crate::request::options::ImageSizeOption;
use crate::request::orientation::ExifOrientation;
use crate::runtime::pool::{Cancelled, RequestToken};

use super::properties::{read_properties, GeoLocation, ImageProperties};

/// Encoded image data to decode.
#[derive(Debug, Clone)]
pub enum ImageInput {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

impl ImageInput {
    /// Stored pixel size, read from the header only
    pub fn header_size(&self) -> Result<Size, DecodeError> {
        let (width, height) = match self {
            ImageInput::File(path) => ImageReader::open(path)?
                .with_guessed_format()?
                .into_dimensions()?,
            ImageInput::Memory(bytes) => ImageReader::new(Cursor::new(&bytes[..]))
                .with_guessed_format()?
                .into_dimensions()?,
        };
        Ok(Size::new(width, height))
    }

    /// Fully decode the pixels. The returned buffer is materialized, not lazy.
    pub fn decode(&self) -> Result<DynamicImage, DecodeError> {
        let image = match self {
            ImageInput::File(path) => ImageReader::open(path)?.with_guessed_format()?.decode()?,
            ImageInput::Memory(bytes) => ImageReader::new(Cursor::new(&bytes[..]))
                .with_guessed_format()?
                .decode()?,
        };
        Ok(image)
    }

    /// Header size plus EXIF properties. Unreadable input yields empty properties.
    pub fn properties(&self) -> ImageProperties {
        let size = self.header_size().ok();
        match self {
            ImageInput::File(path) => match File::open(path) {
                Ok(file) => read_properties(&mut BufReader::new(file), size),
                Err(err) => {
                    debug!("cannot read properties of {}: {err}", path.display());
                    ImageProperties::default()
                }
            },
            ImageInput::Memory(bytes) => read_properties(&mut Cursor::new(&bytes[..]), size),
        }
    }

    /// Size as displayed, i.e. with the EXIF orientation applied
    pub fn displayed_size(&self) -> Option<Size> {
        let raw = self.header_size().ok()?;
        Some(self.properties().orientation.displayed_size(raw))
    }

    fn describe(&self) -> String {
        match self {
            ImageInput::File(path) => path.display().to_string(),
            ImageInput::Memory(bytes) => format!("<{} bytes in memory>", bytes.len()),
        }
    }
}

/// What to decode and how.
#[derive(Debug, Clone)]
pub struct DecodeRequest {
    pub input: ImageInput,
    pub size: ImageSizeOption,
    pub needs_metadata: bool,
    pub location: Option<GeoLocation>,
}

/// Pipeline output. `image` is `None` when decoding failed.
#[derive(Debug, Default)]
pub struct Decoded {
    pub image: Option<DynamicImage>,
    pub metadata: ImageMetadata,
}

/// Run the pipeline, stopping with `Err(Cancelled)` at the first boundary after cancellation.
pub fn decode(request: &DecodeRequest, token: &RequestToken) -> Result<Decoded, Cancelled> {
    match request.size {
        ImageSizeOption::FullResolution => full_resolution(request, token),
        // Fit and fill both produce a thumbnail bounded by the larger side;
        // the display layer applies the actual content mode
        ImageSizeOption::FitSize(size) | ImageSizeOption::FillSize(size) => {
            thumbnail(request, size.max_dimension(), token)
        }
    }
}

fn full_resolution(request: &DecodeRequest, token: &RequestToken) -> Result<Decoded, Cancelled> {
    token.checkpoint()?;

    // Step 1: Read the header and properties without decoding pixels
    let mut properties = request.input.properties();
    properties.merge_location(request.location);
    let orientation = properties.orientation;

    // Step 2: Decode eagerly
    token.checkpoint()?;
    let mut image = decode_or_log(&request.input);

    // Step 3: Turn the pixels upright
    if image.is_some() && orientation != ExifOrientation::Up {
        token.checkpoint()?;
        image = image.map(|image| orientation.apply(image));
    }

    token.checkpoint()?;
    Ok(Decoded {
        image,
        metadata: if request.needs_metadata {
            ImageMetadata::new(properties.properties)
        } else {
            ImageMetadata::default()
        },
    })
}

fn thumbnail(request: &DecodeRequest, max_pixel_size: u32, token: &RequestToken) -> Result<Decoded, Cancelled> {
    token.checkpoint()?;

    // Orientation is needed either way; the rest only when metadata was asked for
    let mut properties = request.input.properties();
    let metadata = if request.needs_metadata {
        properties.merge_location(request.location);
        ImageMetadata::new(std::mem::take(&mut properties.properties))
    } else {
        ImageMetadata::default()
    };

    token.checkpoint()?;
    let image = decode_or_log(&request.input)
        .map(|image| shrink_to_fit(properties.orientation.apply(image), max_pixel_size));

    token.checkpoint()?;
    Ok(Decoded { image, metadata })
}

/// Resize so that neither side exceeds `max_pixel_size`. Never upscales.
pub fn shrink_to_fit(image: DynamicImage, max_pixel_size: u32) -> DynamicImage {
    let max_pixel_size = max_pixel_size.max(1);
    if image.width().max(image.height()) <= max_pixel_size {
        return image;
    }
    // Resize maintaining aspect ratio
    image.resize(max_pixel_size, max_pixel_size, FilterType::Lanczos3)
}

fn decode_or_log(input: &ImageInput) -> Option<DynamicImage> {
    match input.decode() {
        Ok(image) => Some(image),
        Err(err) if err.is_not_found() => {
            debug!("image not found: {}", input.describe());
            None
        }
        Err(err) => {
            warn!("failed to decode {}: {err}", input.describe());
            None
        }
    }
}
