//! An ORM-integrated, dependency-aware query-result cache.
//!
//! The coordinator ([`Coordinator`]) sits between a host ORM and its
//! database, short-circuiting reads whose shape is already cached and
//! asking the Dependency Engine which cached shapes a write invalidates. It
//! never computes invalidation itself -- that's the engine's job, reached
//! through `ormcache-engine`'s ABI client -- and never assumes anything
//! about the cache backend beyond the `ormcache_cache::Cache` contract.
//!
//! [`Facade`] is the thin integration surface most callers actually use: it
//! pairs a [`Coordinator`] with the host's own ORM client so cache-aware
//! reads and writes read like ordinary ORM calls.

mod coordinator;
mod diagnostics;
mod facade;
mod insights;
mod mapper;

pub use coordinator::{Coordinator, TxHandle};
pub use diagnostics::CacheStats;
pub use facade::Facade;
pub use insights::{InsightSink, NoopInsightSink};
pub use mapper::OrmMapper;

pub use ormcache_core::{
    AppSchema, CacheEntry, CacheError, CacheResult, Change, DependenciesSummary, EngineError,
    EngineErrorCode, FilterCondition, FilterNode, FilterOperator, InsightEvent, Mutation,
    SchemaError, SerializationError, ShapeId, SingleFlightTimeoutError, Statement,
};
