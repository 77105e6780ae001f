//! A marshalling client for the Dependency Engine's ABI.
//!
//! `ormcache-engine` owns the boundary between the coordinator and the
//! engine: it never tracks dependencies itself, only shuttles JSON across
//! the engine's linear memory and translates status codes into
//! [`ormcache_core::CacheError`].

mod abi;
mod client;

#[cfg(feature = "test-util")]
pub mod testing;

pub use abi::{LinearMemory, RawEngine};
pub use client::{EngineClient, ExplainResult, VersionInfo};
