use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Opaque token identifying one outstanding image request.
///
/// Ids are unique among the requests concurrently outstanding on one origin.
/// They are not stable across origins: a local file request and a photo
/// library request may carry the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageRequestId(i64);

impl ImageRequestId {
    pub(crate) const fn from_raw(value: i64) -> Self {
        Self(value)
    }

    /// Derive an id from any hashable value.
    pub fn from_hashable<T: Hash + ?Sized>(value: &T) -> Self {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        Self(hasher.finish() as i64)
    }

    pub(crate) const fn raw(self) -> i64 {
        self.0
    }
}

/// Platform backends hand out 32-bit request ids.
impl From<i32> for ImageRequestId {
    fn from(value: i32) -> Self {
        Self(i64::from(value))
    }
}

impl fmt::Display for ImageRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
