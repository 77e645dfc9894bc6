//! EXIF property extraction.
//!
//! Produces a property dictionary laid out like the platform image I/O
//! dictionaries: pixel size and orientation at the top level, tag groups
//! (`TIFF`, `Exif`, `GPS`, `Interop`) as nested dictionaries.

use std::io::{BufRead, Seek};

use exif::{Context, Field, In, Reader, Tag, Value};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::request::image::Size;
use crate::request::metadata::{Properties, PropertyValue};
use crate::request::orientation::ExifOrientation;

pub const PIXEL_WIDTH: &str = "PixelWidth";
pub const PIXEL_HEIGHT: &str = "PixelHeight";
pub const ORIENTATION: &str = "Orientation";
pub const GPS: &str = "GPS";

/// Where the device was when the image was captured.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// GPS dictionary derived from this location, as stored under [`GPS`].
    pub fn gps_properties(&self) -> Properties {
        let latitude_ref = if self.latitude < 0.0 { "S" } else { "N" };
        let longitude_ref = if self.longitude < 0.0 { "W" } else { "E" };

        let mut gps = Properties::new();
        gps.insert("GPSLatitude".into(), self.latitude.into());
        gps.insert("GPSLatitudeRef".into(), latitude_ref.into());
        gps.insert("GPSLongitude".into(), self.longitude.into());
        gps.insert("GPSLongitudeRef".into(), longitude_ref.into());
        gps
    }
}

/// Properties read from an image plus the orientation needed to display it.
#[derive(Debug, Clone, Default)]
pub struct ImageProperties {
    pub properties: Properties,
    pub orientation: ExifOrientation,
}

impl ImageProperties {
    /// Add the device location without overriding anything read from the file.
    pub fn merge_location(&mut self, location: Option<GeoLocation>) {
        if let Some(location) = location {
            self.properties
                .entry(GPS.to_owned())
                .or_insert_with(|| PropertyValue::Dictionary(location.gps_properties()));
        }
    }
}

/// Read EXIF properties from an image container.
///
/// `size` is the stored pixel size when the header could be read. Images
/// without EXIF data yield just the size and an upright orientation.
pub fn read_properties<R: BufRead + Seek>(reader: &mut R, size: Option<Size>) -> ImageProperties {
    let mut result = ImageProperties::default();
    if let Some(size) = size {
        result.properties.insert(PIXEL_WIDTH.into(), PropertyValue::Int(size.width.into()));
        result.properties.insert(PIXEL_HEIGHT.into(), PropertyValue::Int(size.height.into()));
    }

    let exif = match Reader::new().read_from_container(reader) {
        Ok(exif) => exif,
        Err(err) => {
            trace!("no EXIF data: {err}");
            return result;
        }
    };

    if let Some(value) = exif
        .get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
    {
        result.properties.insert(ORIENTATION.into(), PropertyValue::Int(value.into()));
        result.orientation = ExifOrientation::from_tag(value).unwrap_or_default();
    }

    for field in exif.fields().filter(|field| field.ifd_num == In::PRIMARY) {
        let Some(group) = group_name(field.tag.context()) else {
            continue;
        };
        let entry = result
            .properties
            .entry(group.to_owned())
            .or_insert_with(|| PropertyValue::Dictionary(Properties::new()));
        if let PropertyValue::Dictionary(entries) = entry {
            entries.insert(field.tag.to_string(), field_value(field));
        }
    }

    result
}

fn group_name(context: Context) -> Option<&'static str> {
    match context {
        Context::Tiff => Some("TIFF"),
        Context::Exif => Some("Exif"),
        Context::Gps => Some(GPS),
        Context::Interop => Some("Interop"),
        _ => None,
    }
}

fn field_value(field: &Field) -> PropertyValue {
    // Coordinates are stored as degrees/minutes/seconds; expose decimal degrees
    if field.tag == Tag::GPSLatitude || field.tag == Tag::GPSLongitude {
        if let Value::Rational(parts) = &field.value {
            if let [degrees, minutes, seconds] = parts.as_slice() {
                return PropertyValue::Float(
                    degrees.to_f64() + minutes.to_f64() / 60.0 + seconds.to_f64() / 3600.0,
                );
            }
        }
    }
    property_value(&field.value)
}

fn property_value(value: &Value) -> PropertyValue {
    match value {
        Value::Byte(values) => collapse(values.iter().map(|&v| PropertyValue::Int(v.into()))),
        Value::SByte(values) => collapse(values.iter().map(|&v| PropertyValue::Int(v.into()))),
        Value::Short(values) => collapse(values.iter().map(|&v| PropertyValue::Int(v.into()))),
        Value::SShort(values) => collapse(values.iter().map(|&v| PropertyValue::Int(v.into()))),
        Value::Long(values) => collapse(values.iter().map(|&v| PropertyValue::Int(v.into()))),
        Value::SLong(values) => collapse(values.iter().map(|&v| PropertyValue::Int(v.into()))),
        Value::Rational(values) => collapse(
            values
                .iter()
                .map(|r| PropertyValue::Float(f64::from(r.num) / f64::from(r.denom))),
        ),
        Value::SRational(values) => collapse(
            values
                .iter()
                .map(|r| PropertyValue::Float(f64::from(r.num) / f64::from(r.denom))),
        ),
        Value::Float(values) => collapse(values.iter().map(|&v| PropertyValue::Float(v.into()))),
        Value::Double(values) => collapse(values.iter().map(|&v| PropertyValue::Float(v))),
        Value::Ascii(strings) => collapse(strings.iter().map(|bytes| {
            PropertyValue::String(
                String::from_utf8_lossy(bytes)
                    .trim_end_matches('\0')
                    .to_owned(),
            )
        })),
        Value::Undefined(bytes, _) => PropertyValue::Bytes(bytes.clone()),
        Value::Unknown(..) => PropertyValue::Bytes(Vec::new()),
    }
}

/// Single values stand alone, everything else becomes an array
fn collapse(values: impl Iterator<Item = PropertyValue>) -> PropertyValue {
    let mut values: Vec<_> = values.collect();
    if values.len() == 1 {
        values.swap_remove(0)
    } else {
        PropertyValue::Array(values)
    }
}
