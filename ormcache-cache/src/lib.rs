//! Cache backend adapters for the ORM cache coordinator.
//!
//! This crate defines the [`Cache`] contract and ships two adapters: an
//! in-process [`LruTtlCache`] and a remote, prefix-namespaced [`RemoteCache`].
//! The coordinator itself lives in the `ormcache` crate and is generic over
//! `Cache<V>`; it has no idea which adapter it's talking to.

pub mod backend;
pub mod traits;

pub use backend::{LruConfig, LruTtlCache, RemoteCache, RemoteCacheConfig, DEFAULT_PREFIX};
pub use traits::Cache;
