//! The cache coordinator: single-flighted, engine-driven read-through and
//! write-through caching over an arbitrary ORM.

use crate::diagnostics::{CacheStats, StatsInner};
use crate::insights::{InsightSink, NoopInsightSink};
use crate::mapper::OrmMapper;
use chrono::Utc;
use dashmap::DashMap;
use ormcache_cache::Cache;
use ormcache_core::{
    CacheEntry, CacheError, CacheResult, InsightEvent, SerializationError, ShapeId,
    SingleFlightTimeoutError, Statement,
};
use ormcache_engine::{EngineClient, RawEngine, VersionInfo};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SINGLE_FLIGHT_TIMEOUT: Duration = Duration::from_secs(30);

type Db<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// An in-flight, uncommitted transaction.
///
/// Evictions recorded during the transaction are buffered here rather than
/// applied immediately; `commit` flushes them, `rollback` (or simply
/// dropping the handle without either) discards them. Dropping without an
/// explicit commit is always safe: the buffer is owned solely by this
/// handle, so it simply goes away with it.
pub struct TxHandle {
    buffer: Arc<tokio::sync::Mutex<Vec<ShapeId>>>,
}

impl TxHandle {
    async fn record(&self, shape_id: ShapeId) {
        self.buffer.lock().await.push(shape_id);
    }
}

/// Coordinates reads and writes between a host ORM, a [`Cache`] backend, and
/// the Dependency Engine.
///
/// Generic over the [`OrmMapper`] that understands the host's query/mutation
/// types, the [`Cache`] backend storing results, and the [`RawEngine`]
/// backing the engine client.
pub struct Coordinator<Mapper, Backend, Engine> {
    mapper: Mapper,
    cache: Arc<Backend>,
    engine: EngineClient<Engine>,
    single_flight: DashMap<ShapeId, Arc<tokio::sync::Mutex<()>>>,
    stats: StatsInner,
    insights: Arc<dyn InsightSink>,
    single_flight_timeout: Duration,
    default_ttl: Option<Duration>,
}

impl<Mapper, Backend, Engine> Coordinator<Mapper, Backend, Engine>
where
    Mapper: OrmMapper,
    Backend: Cache<CacheEntry<serde_json::Value>>,
    Engine: RawEngine,
{
    pub fn new(mapper: Mapper, cache: Arc<Backend>, engine: EngineClient<Engine>) -> Self {
        Self {
            mapper,
            cache,
            engine,
            single_flight: DashMap::new(),
            stats: StatsInner::default(),
            insights: Arc::new(NoopInsightSink),
            single_flight_timeout: DEFAULT_SINGLE_FLIGHT_TIMEOUT,
            default_ttl: None,
        }
    }

    pub fn with_insight_sink(mut self, sink: Arc<dyn InsightSink>) -> Self {
        self.insights = sink;
        self
    }

    pub fn with_single_flight_timeout(mut self, timeout: Duration) -> Self {
        self.single_flight_timeout = timeout;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn engine_version(&self) -> CacheResult<VersionInfo> {
        self.engine.version()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// `{size, hitRate}` as exposed by the integration facade's diagnostics
    /// surface: `hitRate` is `cacheHits / totalRequests` (`0.0` with no
    /// requests yet), `size` is the backend's reported entry count or `0`
    /// if it doesn't report one.
    pub async fn cache_stats(&self) -> CacheStats {
        let mut stats = self.stats.snapshot();
        stats.size = self.cache.size().await.unwrap_or(0);
        stats
    }

    /// A point-in-time health check: unhealthy if the engine doesn't answer
    /// `version`, degraded if the cache backend reports no size (the remote
    /// adapter swallows its own connection errors, so this is the only
    /// signal this coordinator has that it might be unreachable), healthy
    /// otherwise.
    pub async fn health(&self) -> ormcache_core::health::HealthCheck {
        use ormcache_core::health::HealthCheck;

        if let Err(err) = self.engine.version() {
            return HealthCheck::unhealthy("engine", err.to_string());
        }
        match self.cache.size().await {
            Some(size) => HealthCheck::healthy("cache")
                .with_metadata("size", serde_json::json!(size)),
            None => HealthCheck::degraded("cache", "backend does not report a size"),
        }
    }

    /// Apply a schema to the engine. Must be called before any read/write.
    pub fn set_schema(&self, schema: &ormcache_core::AppSchema) -> CacheResult<()> {
        self.engine.set_schema(schema)
    }

    /// Execute a cache-aware read.
    ///
    /// `fetch` is only invoked on a cache miss, and at most once per shape
    /// across concurrently-racing callers (single-flight): callers that
    /// arrive while a fetch for the same shape is already in flight wait for
    /// it to finish and observe its result instead of issuing their own.
    pub async fn execute_read<T, F, Fut>(&self, query: &Mapper::Query, fetch: F) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Db<T>>,
    {
        self.execute_read_with_hint(query, fetch, None).await
    }

    /// As [`Self::execute_read`], but lets the caller narrow the shape hint
    /// `add_query` registers dependencies against instead of the full
    /// fetched result (e.g. a count query that only wants to depend on
    /// existence, not every field of every row).
    pub async fn execute_read_with_hint<T, F, Fut>(
        &self,
        query: &Mapper::Query,
        fetch: F,
        result_hint: Option<&serde_json::Value>,
    ) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Db<T>>,
    {
        let statement = self.mapper.build_statement(query);
        let shape_id = self.engine.compute_shape_id(&statement)?;

        if let Some(hit) = self.try_cache_hit::<T>(&shape_id).await {
            return Ok(hit);
        }

        let gate = self
            .single_flight
            .entry(shape_id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();

        // The same timeout bounds both a waiter queued behind someone else's
        // gate and the racer that ends up actually running `fetch`: neither
        // is allowed to hold the gate past the deadline, so a hung `fetch`
        // can't wedge every future caller for this shape behind it forever.
        let outcome = tokio::time::timeout(self.single_flight_timeout, async {
            let guard = gate.lock().await;
            let result = self
                .fetch_and_populate(&shape_id, &statement, fetch, result_hint)
                .await;
            drop(guard);
            result
        })
        .await;

        // Self-healing: only remove the map entry if it's still the one we
        // inserted or waited on. A concurrent `reset()` may have already
        // replaced it, and removing it here must not discard that.
        self.single_flight
            .remove_if(&shape_id, |_, current| Arc::ptr_eq(current, &gate));

        match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    shape_id = %shape_id,
                    timeout_ms = self.single_flight_timeout.as_millis() as u64,
                    "single-flight wait timed out"
                );
                Err(SingleFlightTimeoutError {
                    shape_id: shape_id.to_string(),
                    timeout_ms: self.single_flight_timeout.as_millis() as u64,
                }
                .into())
            }
        }
    }

    async fn try_cache_hit<T>(&self, shape_id: &ShapeId) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let entry = self.cache.get(shape_id).await?;
        match serde_json::from_value(entry.into_result()) {
            Ok(decoded) => {
                self.stats.record_hit();
                self.insights.emit(InsightEvent::Hit {
                    shape_id: shape_id.clone(),
                    timestamp: Utc::now(),
                });
                Some(decoded)
            }
            Err(_) => None,
        }
    }

    async fn fetch_and_populate<T, F, Fut>(
        &self,
        shape_id: &ShapeId,
        statement: &Statement,
        fetch: F,
        result_hint: Option<&serde_json::Value>,
    ) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Db<T>>,
    {
        // Another racer may have populated the cache while we waited for the gate.
        if let Some(hit) = self.try_cache_hit::<T>(shape_id).await {
            return Ok(hit);
        }

        let value = fetch().await.map_err(CacheError::Db)?;
        let encoded = serde_json::to_value(&value).map_err(|err| SerializationError::Encode {
            what: "read result",
            reason: err.to_string(),
        })?;
        // Register dependencies before the cache entry becomes visible: a
        // CacheEntry under `shape_id` must never appear before the engine
        // has observed it via `add_query`. Callers may narrow what the
        // engine sees via `result_hint`; default to the full fetched value.
        let hint = result_hint.unwrap_or(&encoded);
        let (_, dependencies_summary) = self.engine.add_query(statement, Some(hint))?;
        self.cache
            .set(shape_id.clone(), CacheEntry::new(encoded), self.default_ttl)
            .await;
        self.stats.record_miss();
        self.insights.emit(InsightEvent::Miss {
            shape_id: shape_id.clone(),
            timestamp: Utc::now(),
            dependencies_summary,
        });
        Ok(value)
    }

    /// Execute a write and apply whatever invalidation the engine reports.
    ///
    /// Within a transaction (`tx` is `Some`), invalidated shapes are buffered
    /// on the handle instead of evicted immediately; outside one, they're
    /// evicted as soon as the engine reports them.
    pub async fn execute_write<T, F, Fut>(
        &self,
        tx: Option<&TxHandle>,
        input: &Mapper::MutationInput,
        execute: F,
    ) -> CacheResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Db<T>>,
    {
        let mutation = self.mapper.build_mutation(input);
        // The engine must see pre-state: compute invalidation before the
        // write lands so dependency matching isn't confused by the write's
        // own effects. A failed `execute` still leaves the cache untouched
        // because nothing below this point runs.
        let invalidated = self.engine.invalidate(&mutation)?;
        let value = execute().await.map_err(CacheError::Db)?;
        for shape_id in invalidated {
            match tx {
                Some(tx) => tx.record(shape_id).await,
                None => self.evict(shape_id).await,
            }
        }
        Ok(value)
    }

    async fn evict(&self, shape_id: ShapeId) {
        self.cache.delete(&shape_id).await;
        self.stats.record_eviction();
        self.insights.emit(InsightEvent::Evict {
            shape_id,
            timestamp: Utc::now(),
        });
    }

    /// Begin a transaction: eviction buffering for this handle starts now.
    pub fn begin(&self) -> TxHandle {
        TxHandle {
            buffer: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        }
    }

    /// Apply every eviction buffered during the transaction.
    pub async fn commit(&self, tx: TxHandle) {
        let shape_ids = std::mem::take(&mut *tx.buffer.lock().await);
        for shape_id in shape_ids {
            self.evict(shape_id).await;
        }
    }

    /// Discard every eviction buffered during the transaction.
    pub async fn rollback(&self, tx: TxHandle) {
        let discarded = std::mem::take(&mut *tx.buffer.lock().await);
        tracing::debug!(discarded = discarded.len(), "transaction rolled back");
    }

    /// Clear the cache and reset the engine's tracked queries.
    pub async fn reset(&self) -> CacheResult<()> {
        self.cache.clear().await;
        self.single_flight.clear();
        self.engine.reset()?;
        tracing::debug!("coordinator reset");
        Ok(())
    }

    /// Release cache resources (background sweeps, connections). The
    /// coordinator must not be used afterward.
    pub async fn destroy(&self) {
        self.cache.destroy().await;
    }
}

#[cfg(all(test, feature = "test-util"))]
mod tests {
    use super::*;
    use ormcache_cache::LruTtlCache;
    use ormcache_core::{Change, FilterCondition, FilterNode, Mutation};
    use ormcache_engine::testing::InMemoryEngine;

    struct ToyQuery {
        model: String,
    }

    struct ToyMutationInput {
        model: String,
    }

    struct ToyMapper;

    impl OrmMapper for ToyMapper {
        type Query = ToyQuery;
        type MutationInput = ToyMutationInput;

        fn build_statement(&self, query: &ToyQuery) -> Statement {
            Statement::for_model(query.model.clone())
        }

        fn build_mutation(&self, input: &ToyMutationInput) -> Mutation {
            Mutation::single(Change::Update {
                model: input.model.clone(),
                ids: None,
                filter: Some(FilterNode::leaf(FilterCondition::eq(
                    "id",
                    serde_json::json!("irrelevant"),
                ))),
                values: serde_json::json!({}),
            })
        }
    }

    fn coordinator(
    ) -> Coordinator<ToyMapper, LruTtlCache<CacheEntry<serde_json::Value>>, InMemoryEngine> {
        let cache = LruTtlCache::with_defaults();
        let engine = EngineClient::new(InMemoryEngine::new());
        Coordinator::new(ToyMapper, cache, engine)
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let coordinator = coordinator();
        let query = ToyQuery {
            model: "User".to_string(),
        };

        let mut calls = 0;
        let first: String = coordinator
            .execute_read(&query, || async {
                calls += 1;
                Ok("alice".to_string())
            })
            .await
            .unwrap();
        assert_eq!(first, "alice");

        let second: String = coordinator
            .execute_read(&query, || async {
                calls += 1;
                Ok("should-not-be-called".to_string())
            })
            .await
            .unwrap();
        assert_eq!(second, "alice");
        assert_eq!(calls, 1);
        assert_eq!(coordinator.stats().hits, 1);
        assert_eq!(coordinator.stats().misses, 1);
    }

    #[tokio::test]
    async fn write_evicts_the_affected_shape() {
        let coordinator = coordinator();
        let query = ToyQuery {
            model: "User".to_string(),
        };

        let _: String = coordinator
            .execute_read(&query, || async { Ok("alice".to_string()) })
            .await
            .unwrap();

        let _: () = coordinator
            .execute_write(
                None,
                &ToyMutationInput {
                    model: "User".to_string(),
                },
                || async { Ok(()) },
            )
            .await
            .unwrap();

        let mut calls = 0;
        let _: String = coordinator
            .execute_read(&query, || async {
                calls += 1;
                Ok("alice-reloaded".to_string())
            })
            .await
            .unwrap();
        assert_eq!(calls, 1, "eviction should have forced a refetch");
        assert_eq!(coordinator.stats().evictions, 1);
    }

    #[tokio::test]
    async fn buffered_writes_apply_only_on_commit() {
        let coordinator = coordinator();
        let query = ToyQuery {
            model: "User".to_string(),
        };

        let _: String = coordinator
            .execute_read(&query, || async { Ok("alice".to_string()) })
            .await
            .unwrap();

        let tx = coordinator.begin();
        let _: () = coordinator
            .execute_write(
                Some(&tx),
                &ToyMutationInput {
                    model: "User".to_string(),
                },
                || async { Ok(()) },
            )
            .await
            .unwrap();

        // Still cached: the eviction is buffered, not yet applied.
        let mut calls = 0;
        let _: String = coordinator
            .execute_read(&query, || async {
                calls += 1;
                Ok("should-not-be-called".to_string())
            })
            .await
            .unwrap();
        assert_eq!(calls, 0);

        coordinator.commit(tx).await;

        let mut calls = 0;
        let _: String = coordinator
            .execute_read(&query, || async {
                calls += 1;
                Ok("alice-reloaded".to_string())
            })
            .await
            .unwrap();
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn rollback_discards_buffered_evictions() {
        let coordinator = coordinator();
        let query = ToyQuery {
            model: "User".to_string(),
        };

        let _: String = coordinator
            .execute_read(&query, || async { Ok("alice".to_string()) })
            .await
            .unwrap();

        let tx = coordinator.begin();
        let _: () = coordinator
            .execute_write(
                Some(&tx),
                &ToyMutationInput {
                    model: "User".to_string(),
                },
                || async { Ok(()) },
            )
            .await
            .unwrap();
        coordinator.rollback(tx).await;

        let mut calls = 0;
        let _: String = coordinator
            .execute_read(&query, || async {
                calls += 1;
                Ok("should-not-be-called".to_string())
            })
            .await
            .unwrap();
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn concurrent_reads_of_an_uncached_shape_fetch_exactly_once() {
        use std::sync::atomic::{AtomicU64, Ordering};

        let coordinator = Arc::new(coordinator());
        let query = Arc::new(ToyQuery {
            model: "User".to_string(),
        });
        let calls = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                let query = Arc::clone(&query);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    coordinator
                        .execute_read(&*query, || async {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok("alice".to_string())
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            let result: String = handle.await.unwrap().unwrap();
            assert_eq!(result, "alice");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
