//! A prefix-namespaced cache backend over a remote Redis-compatible store.
//!
//! Every operation treats backend failure as a liveness concern, not a
//! correctness one: a dropped connection or a Redis error is logged and
//! swallowed, and the call behaves as if the entry were absent. A coordinator
//! built on this adapter stays available even if the remote store is down;
//! it just stops benefiting from caching.

use crate::traits::Cache;
use async_trait::async_trait;
use ormcache_core::ShapeId;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::warn;

/// Default key prefix applied to every entry this backend writes.
pub const DEFAULT_PREFIX: &str = "ik:";

#[derive(Debug, Clone)]
pub struct RemoteCacheConfig {
    pub prefix: String,
}

impl Default for RemoteCacheConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

impl RemoteCacheConfig {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

/// A [`Cache`] backed by a remote KV store, namespaced by a configurable prefix.
pub struct RemoteCache<V> {
    manager: ConnectionManager,
    config: RemoteCacheConfig,
    _marker: PhantomData<fn() -> V>,
}

impl<V> RemoteCache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub async fn connect(
        client: &redis::Client,
        config: RemoteCacheConfig,
    ) -> redis::RedisResult<Self> {
        let manager = client.get_connection_manager().await?;
        Ok(Self {
            manager,
            config,
            _marker: PhantomData,
        })
    }

    fn namespaced(&self, key: &ShapeId) -> String {
        format!("{}{}", self.config.prefix, key.as_str())
    }
}

#[async_trait]
impl<V> Cache<V> for RemoteCache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &ShapeId) -> Option<V> {
        let mut conn = self.manager.clone();
        let namespaced = self.namespaced(key);
        let raw: Option<String> = match conn.get(&namespaced).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, key = %namespaced, "remote cache get failed");
                return None;
            }
        };
        let raw = raw?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(error = %err, key = %namespaced, "remote cache entry was not valid JSON");
                None
            }
        }
    }

    async fn set(&self, key: ShapeId, value: V, ttl: Option<Duration>) {
        let mut conn = self.manager.clone();
        let namespaced = self.namespaced(&key);
        let payload = match serde_json::to_string(&value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, key = %namespaced, "failed to encode value for remote cache");
                return;
            }
        };
        let result = match ttl {
            Some(ttl) => {
                // Redis expiry is whole seconds; round up so the entry never
                // expires sooner than the caller asked for.
                let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
                let secs = secs.max(1);
                conn.set_ex::<_, _, ()>(&namespaced, payload, secs).await
            }
            None => conn.set::<_, _, ()>(&namespaced, payload).await,
        };
        if let Err(err) = result {
            warn!(error = %err, key = %namespaced, "remote cache set failed");
        }
    }

    async fn delete(&self, key: &ShapeId) {
        let mut conn = self.manager.clone();
        let namespaced = self.namespaced(key);
        if let Err(err) = conn.del::<_, ()>(&namespaced).await {
            warn!(error = %err, key = %namespaced, "remote cache delete failed");
        }
    }

    async fn clear(&self) {
        let mut conn = self.manager.clone();
        let pattern = format!("{}*", self.config.prefix);
        let mut cursor: u64 = 0;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = match redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await
            {
                Ok(result) => result,
                Err(err) => {
                    warn!(error = %err, pattern = %pattern, "remote cache clear scan failed");
                    return;
                }
            };
            if !keys.is_empty() {
                if let Err(err) = conn.del::<_, ()>(&keys).await {
                    warn!(error = %err, pattern = %pattern, "remote cache clear delete failed");
                }
            }
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
    }
}
