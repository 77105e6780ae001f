//! The integration surface: a host ORM client paired with its coordinator.

use crate::coordinator::{Coordinator, TxHandle};
use crate::diagnostics::CacheStats;
use crate::mapper::OrmMapper;
use ormcache_cache::Cache;
use ormcache_core::{CacheEntry, CacheResult};
use ormcache_engine::{RawEngine, VersionInfo};
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

/// Wraps a host ORM client with a [`Coordinator`], so cache-aware reads and
/// writes can be called alongside the client's own methods.
///
/// `Facade` derefs to the wrapped client: any method the host client exposes
/// is still callable directly on the facade, uncached, exactly as if the
/// facade weren't there. Only `execute_read`/`execute_write` (and
/// transaction/diagnostics methods) go through the coordinator.
pub struct Facade<Mapper, Backend, Engine, Client> {
    coordinator: Arc<Coordinator<Mapper, Backend, Engine>>,
    client: Client,
}

impl<Mapper, Backend, Engine, Client> Facade<Mapper, Backend, Engine, Client>
where
    Mapper: OrmMapper,
    Backend: Cache<CacheEntry<serde_json::Value>>,
    Engine: RawEngine,
{
    pub fn new(client: Client, coordinator: Coordinator<Mapper, Backend, Engine>) -> Self {
        Self {
            client,
            coordinator: Arc::new(coordinator),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn execute_read<T, F, Fut>(&self, query: &Mapper::Query, fetch: F) -> CacheResult<T>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Box<dyn std::error::Error + Send + Sync>>>,
    {
        self.coordinator.execute_read(query, fetch).await
    }

    pub async fn execute_read_with_hint<T, F, Fut>(
        &self,
        query: &Mapper::Query,
        fetch: F,
        result_hint: Option<&serde_json::Value>,
    ) -> CacheResult<T>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Box<dyn std::error::Error + Send + Sync>>>,
    {
        self.coordinator
            .execute_read_with_hint(query, fetch, result_hint)
            .await
    }

    pub async fn execute_write<T, F, Fut>(
        &self,
        tx: Option<&TxHandle>,
        input: &Mapper::MutationInput,
        execute: F,
    ) -> CacheResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Box<dyn std::error::Error + Send + Sync>>>,
    {
        self.coordinator.execute_write(tx, input, execute).await
    }

    pub fn begin(&self) -> TxHandle {
        self.coordinator.begin()
    }

    pub async fn commit(&self, tx: TxHandle) {
        self.coordinator.commit(tx).await
    }

    pub async fn rollback(&self, tx: TxHandle) {
        self.coordinator.rollback(tx).await
    }

    pub fn diagnostics(&self) -> Diagnostics<'_, Mapper, Backend, Engine> {
        Diagnostics {
            coordinator: &self.coordinator,
        }
    }
}

impl<Mapper, Backend, Engine, Client> Deref for Facade<Mapper, Backend, Engine, Client> {
    type Target = Client;

    fn deref(&self) -> &Client {
        &self.client
    }
}

/// Diagnostic operations exposed by a [`Facade`], grouped separately so they
/// read as a distinct surface from ordinary cache-aware reads/writes.
pub struct Diagnostics<'a, Mapper, Backend, Engine> {
    coordinator: &'a Coordinator<Mapper, Backend, Engine>,
}

impl<'a, Mapper, Backend, Engine> Diagnostics<'a, Mapper, Backend, Engine>
where
    Mapper: OrmMapper,
    Backend: Cache<CacheEntry<serde_json::Value>>,
    Engine: RawEngine,
{
    pub fn get_version(&self) -> CacheResult<VersionInfo> {
        self.coordinator.engine_version()
    }

    /// `{size, hitRate}`: the cache's current entry count (`0` if the
    /// backend doesn't report one) and the lifetime hit rate.
    pub async fn get_cache_stats(&self) -> CacheStats {
        self.coordinator.cache_stats().await
    }

    pub async fn reset(&self) -> CacheResult<()> {
        self.coordinator.reset().await
    }

    pub async fn destroy(&self) {
        self.coordinator.destroy().await
    }

    /// Point-in-time health of the engine and cache backend.
    pub async fn health(&self) -> ormcache_core::health::HealthCheck {
        self.coordinator.health().await
    }
}
