//! The value stored against a [`crate::ShapeId`] in a cache backend.

use serde::{Deserialize, Serialize};

/// A cached read result, keyed externally by its `ShapeId`.
///
/// The coordinator stores nothing beyond the raw result: freshness is owned
/// entirely by the Dependency Engine's invalidation calls, not by any
/// timestamp or watermark carried alongside the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub result: V,
}

impl<V> CacheEntry<V> {
    pub fn new(result: V) -> Self {
        Self { result }
    }

    pub fn into_result(self) -> V {
        self.result
    }
}
