//! The cache backend contract shared by every adapter.

use async_trait::async_trait;
use ormcache_core::ShapeId;
use std::time::Duration;

/// A key/value cache keyed by opaque [`ShapeId`]s.
///
/// Implementations are liveness-first: a backend that cannot reach its
/// store (a dropped connection, a full disk) must behave as an empty cache
/// rather than fail the caller's read or write. `get` returning `None` is
/// always a legitimate "treat this as a miss" outcome, never a distinguishable
/// error.
///
/// `clear`, `size`, and `destroy` are optional capabilities: a backend with
/// no efficient implementation may leave them at their default no-op/`None`.
#[async_trait]
pub trait Cache<V>: Send + Sync
where
    V: Send + Sync,
{
    /// Fetch the value stored for `key`, or `None` on a miss.
    async fn get(&self, key: &ShapeId) -> Option<V>;

    /// Store `value` under `key`, replacing any existing entry.
    ///
    /// `ttl` of `None` means the backend's own default applies; backends
    /// that don't support expiry at all may ignore it entirely.
    async fn set(&self, key: ShapeId, value: V, ttl: Option<Duration>);

    /// Remove any entry stored for `key`. A no-op if there is none.
    async fn delete(&self, key: &ShapeId);

    /// Remove every entry. Default: unimplemented as a bulk operation;
    /// adapters for which this is cheap should override it.
    async fn clear(&self) {}

    /// The number of entries currently held, if the backend can report one
    /// cheaply. Remote backends typically cannot and should return `None`.
    async fn size(&self) -> Option<usize> {
        None
    }

    /// Release any resources owned by this cache (background tasks,
    /// connections) and stop accepting further traffic. Must not block
    /// process exit.
    async fn destroy(&self) {}
}
