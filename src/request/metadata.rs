//! JSON-serializable image metadata.
//!
//! Decoders and platform backends describe image properties as a
//! [`PropertyValue`] tree that may contain values JSON cannot carry (raw
//! byte blobs, non-finite numbers). [`ImageMetadata`] keeps only the
//! serializable part of that tree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Property dictionary as produced by decoders and backends.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A property value before JSON filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Integers above `i64::MAX`
    UInt(u64),
    Float(f64),
    String(String),
    Array(Vec<PropertyValue>),
    Dictionary(Properties),
    /// Raw bytes; never serializable
    Bytes(Vec<u8>),
}

impl PropertyValue {
    /// Convert to JSON if this value and everything inside it is serializable.
    ///
    /// Only reached for dictionaries nested in arrays; top-level and nested
    /// dictionaries go through [`filtered`] entry by entry.
    fn to_json(&self) -> Option<Value> {
        match self {
            PropertyValue::Null => Some(Value::Null),
            PropertyValue::Bool(value) => Some(Value::Bool(*value)),
            PropertyValue::Int(value) => Some(Value::Number((*value).into())),
            PropertyValue::UInt(value) => Some(Value::Number((*value).into())),
            PropertyValue::Float(value) => Number::from_f64(*value).map(Value::Number),
            PropertyValue::String(value) => Some(Value::String(value.clone())),
            PropertyValue::Array(values) => values
                .iter()
                .map(PropertyValue::to_json)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            PropertyValue::Dictionary(entries) => {
                let mut object = Map::new();
                for (key, value) in entries {
                    object.insert(key.clone(), value.to_json()?);
                }
                Some(Value::Object(object))
            }
            PropertyValue::Bytes(_) => None,
        }
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => PropertyValue::Null,
            Value::Bool(value) => PropertyValue::Bool(value),
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    PropertyValue::Int(int)
                } else if let Some(uint) = number.as_u64() {
                    PropertyValue::UInt(uint)
                } else {
                    PropertyValue::Float(number.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(value) => PropertyValue::String(value),
            Value::Array(values) => {
                PropertyValue::Array(values.into_iter().map(PropertyValue::from).collect())
            }
            Value::Object(entries) => PropertyValue::Dictionary(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, PropertyValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_owned())
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(int) => PropertyValue::Int(int),
            Err(_) => PropertyValue::UInt(value),
        }
    }
}

/// Key/value metadata attached to an image result.
///
/// Holds only JSON-serializable values. Nested dictionaries are filtered
/// recursively; any other non-serializable value (including an array
/// containing one) is dropped together with its key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct ImageMetadata {
    entries: Map<String, Value>,
}

impl ImageMetadata {
    pub fn new(properties: Properties) -> Self {
        Self {
            entries: filtered(properties),
        }
    }

    /// Build from JSON entries, applying the same filtering as [`ImageMetadata::new`].
    pub fn from_json(entries: Map<String, Value>) -> Self {
        Self::new(
            entries
                .into_iter()
                .map(|(key, value)| (key, PropertyValue::from(value)))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.entries
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.entries
    }
}

fn filtered(properties: Properties) -> Map<String, Value> {
    let mut result = Map::new();
    for (key, value) in properties {
        match value {
            PropertyValue::Dictionary(nested) => {
                result.insert(key, Value::Object(filtered(nested)));
            }
            other => {
                if let Some(json) = other.to_json() {
                    result.insert(key, json);
                }
            }
        }
    }
    result
}
