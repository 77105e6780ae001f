//! The boundary between a host ORM's own query/mutation types and the
//! canonical [`Statement`]/[`Mutation`] the coordinator and engine share.
//!
//! Each ORM integration implements [`OrmMapper`] once; the coordinator is
//! generic over it and never sees the host's native query types itself.

use ormcache_core::{Mutation, Statement};

/// Translates a host ORM's query and mutation representations into the
/// canonical statement/mutation shapes.
///
/// Implementations should be conservative: a query construct the mapper
/// cannot precisely express should still produce a `Statement`, using
/// `FilterOperator::Unsupported`/`Unknown` for whatever it cannot translate
/// exactly, rather than failing to build one at all.
///
/// There's no `extend_client` method here. A JS ORM mapper can monkey-patch
/// a client object at runtime to route its methods through the coordinator;
/// Rust has no equivalent, so that wiring happens once per integration, by
/// hand, in a wrapper built on [`crate::Facade`] -- per-entity cached getters
/// sitting next to plain passthrough methods on the same struct, the way
/// `CachedDbClient` wraps `DbClient` method-by-method.
pub trait OrmMapper: Send + Sync {
    /// The host ORM's own read-query representation.
    type Query: Send + Sync;
    /// The host ORM's own write-input representation.
    type MutationInput: Send + Sync;

    fn build_statement(&self, query: &Self::Query) -> Statement;
    fn build_mutation(&self, input: &Self::MutationInput) -> Mutation;
}
