//! Shared data types for the cache coordinator and its collaborators.
//!
//! This crate contains only data types and their invariants -- no I/O, no
//! engine ABI, no cache backend. `ormcache-engine`, `ormcache-cache`, and
//! `ormcache-schema` all depend on it; it depends on nothing in this
//! workspace.

mod cache_entry;
mod error;
mod insights;
mod mutation;
mod schema;
mod shape;
mod statement;

pub use cache_entry::CacheEntry;
pub use error::{
    CacheError, CacheResult, EngineError, EngineErrorCode, SchemaError, SerializationError,
    SingleFlightTimeoutError,
};
pub use insights::{DependenciesSummary, InsightEvent};
pub use mutation::{Change, Mutation};
pub use schema::{AppSchema, Cardinality, IdDescriptor, Model, Relation};
pub use shape::ShapeId;
pub use statement::{
    FilterCondition, FilterNode, FilterOperator, Grouping, Inclusion, Pagination, SortDirection,
    SortKey, Statement,
};

pub mod health;
