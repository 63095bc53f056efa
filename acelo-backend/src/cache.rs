// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Query cache for collection reads
//!
//! Reads are cached per `(collection, user_id, filter params)`. Every
//! mutation made through [`CachedStore`] drops all cached reads of that
//! collection for that user. A read that overlaps such a mutation is not
//! cached.

use crate::error::Result;
use crate::store::{Collection, DataStore, Query};
use acelo_core::config::CacheConfig;
use async_trait::async_trait;
use moka::future::Cache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub collection: Collection,
    pub user_id: String,
    params: String,
}

impl CacheKey {
    fn new(kind: &str, query: &Query) -> Self {
        let mut filters: Vec<String> = query
            .filters
            .iter()
            .filter(|(column, _)| column != "user_id")
            .map(|(column, value)| format!("{}={}", column, value))
            .collect();
        filters.sort();

        let order = query
            .order
            .as_ref()
            .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
            .unwrap_or_default();
        let limit = query.limit.map(|l| l.to_string()).unwrap_or_default();

        Self {
            collection: query.collection,
            user_id: query.user_id().unwrap_or_default().to_string(),
            params: format!("{}|{}|{}|{}", kind, filters.join("&"), order, limit),
        }
    }
}

#[derive(Debug, Clone)]
enum Cached {
    Rows(Arc<Vec<Value>>),
    Count(u64),
}

/// Invalidation counters observed before a read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Generation {
    global: u64,
    scoped: u64,
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entry_count: u64,
}

pub struct QueryCache {
    cache: Cache<CacheKey, Cached>,
    /// Bumped by whole-collection and full invalidations
    global_generation: AtomicU64,
    /// Bumped by invalidations of one collection for one user
    generations: Mutex<HashMap<(Collection, String), u64>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl QueryCache {
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .support_invalidation_closures()
            .build();

        Self {
            cache,
            global_generation: AtomicU64::new(0),
            generations: Mutex::new(HashMap::new()),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    async fn get(&self, key: &CacheKey) -> Option<Cached> {
        match self.cache.get(key).await {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn generation(&self, key: &CacheKey) -> Generation {
        let global = self.global_generation.load(Ordering::Acquire);
        let scoped = self
            .generations
            .lock()
            .get(&(key.collection, key.user_id.clone()))
            .copied()
            .unwrap_or(0);
        Generation { global, scoped }
    }

    /// Cache `value` unless the key was invalidated since `seen` was taken
    async fn set(&self, key: CacheKey, value: Cached, seen: Generation) -> bool {
        if self.generation(&key) != seen {
            tracing::debug!(
                collection = %key.collection,
                "Skipped caching a read that raced a mutation"
            );
            return false;
        }
        self.cache.insert(key.clone(), value).await;

        // An invalidation between the check and the insert may not cover the
        // new entry.
        if self.generation(&key) != seen {
            self.cache.invalidate(&key).await;
            return false;
        }
        true
    }

    /// Drop every cached read of `collection` for `user_id`
    pub fn invalidate(&self, collection: Collection, user_id: &str) {
        *self
            .generations
            .lock()
            .entry((collection, user_id.to_string()))
            .or_insert(0) += 1;

        let user_id = user_id.to_string();
        tracing::debug!(
            collection = %collection,
            user_id = %user_id,
            "Invalidated cached queries"
        );
        self.invalidate_where(move |key| key.collection == collection && key.user_id == user_id);
    }

    /// Drop every cached read of `collection` for all users
    pub fn invalidate_collection(&self, collection: Collection) {
        self.global_generation.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(collection = %collection, "Invalidated cached queries for all users");
        self.invalidate_where(move |key| key.collection == collection);
    }

    pub fn clear(&self) {
        self.global_generation.fetch_add(1, Ordering::AcqRel);
        self.cache.invalidate_all();
    }

    fn invalidate_where<F>(&self, predicate: F)
    where
        F: Fn(&CacheKey) -> bool + Send + Sync + 'static,
    {
        if let Err(e) = self.cache.invalidate_entries_if(move |key, _| predicate(key)) {
            tracing::warn!(error = ?e, "Falling back to clearing the query cache");
            self.cache.invalidate_all();
        }
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            entry_count: self.cache.entry_count(),
        }
    }
}

/// [`DataStore`] wrapper that serves user-scoped reads from a [`QueryCache`]
pub struct CachedStore {
    inner: Arc<dyn DataStore>,
    cache: QueryCache,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn DataStore>, config: &CacheConfig) -> Self {
        Self {
            inner,
            cache: QueryCache::new(config),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }
}

#[async_trait]
impl DataStore for CachedStore {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        // Only user-scoped reads are cached.
        if query.user_id().is_none() {
            return self.inner.select(query).await;
        }

        let key = CacheKey::new("select", query);
        if let Some(Cached::Rows(rows)) = self.cache.get(&key).await {
            return Ok(rows.as_ref().clone());
        }

        let seen = self.cache.generation(&key);
        let rows = self.inner.select(query).await?;
        self.cache
            .set(key, Cached::Rows(Arc::new(rows.clone())), seen)
            .await;
        Ok(rows)
    }

    async fn insert(&self, collection: Collection, row: Value) -> Result<Value> {
        let user_id = row
            .get("user_id")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let inserted = self.inner.insert(collection, row).await?;
        self.invalidate(collection, user_id.as_deref()).await;
        Ok(inserted)
    }

    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>> {
        let updated = self.inner.update(query, patch).await?;
        self.invalidate(query.collection, query.user_id()).await;
        Ok(updated)
    }

    async fn delete(&self, query: &Query) -> Result<()> {
        self.inner.delete(query).await?;
        self.invalidate(query.collection, query.user_id()).await;
        Ok(())
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        if query.user_id().is_none() {
            return self.inner.count(query).await;
        }

        let key = CacheKey::new("count", query);
        if let Some(Cached::Count(total)) = self.cache.get(&key).await {
            return Ok(total);
        }

        let seen = self.cache.generation(&key);
        let total = self.inner.count(query).await?;
        self.cache.set(key, Cached::Count(total), seen).await;
        Ok(total)
    }

    async fn invalidate(&self, collection: Collection, user_id: Option<&str>) {
        match user_id {
            Some(user_id) => self.cache.invalidate(collection, user_id),
            None => self.cache.invalidate_collection(collection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDataStore;
    use serde_json::json;
    use tokio::sync::{oneshot, Notify};

    /// Holds the first `select` after reading until released
    struct GatedStore {
        inner: InMemoryDataStore,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
        entered: Notify,
    }

    #[async_trait]
    impl DataStore for GatedStore {
        async fn select(&self, query: &Query) -> Result<Vec<Value>> {
            let rows = self.inner.select(query).await?;
            let gate = self.gate.lock().take();
            if let Some(gate) = gate {
                self.entered.notify_one();
                let _ = gate.await;
            }
            Ok(rows)
        }

        async fn insert(&self, collection: Collection, row: Value) -> Result<Value> {
            self.inner.insert(collection, row).await
        }

        async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>> {
            self.inner.update(query, patch).await
        }

        async fn delete(&self, query: &Query) -> Result<()> {
            self.inner.delete(query).await
        }

        async fn count(&self, query: &Query) -> Result<u64> {
            self.inner.count(query).await
        }
    }

    fn store() -> CachedStore {
        CachedStore::new(Arc::new(InMemoryDataStore::new()), &CacheConfig::default())
    }

    #[test]
    fn test_key_ignores_filter_order() {
        let a = Query::new(Collection::Contexts)
            .eq("user_id", "u1")
            .eq("category", "market_research")
            .eq("id", "x");
        let b = Query::new(Collection::Contexts)
            .eq("id", "x")
            .eq("category", "market_research")
            .eq("user_id", "u1");
        assert_eq!(CacheKey::new("select", &a), CacheKey::new("select", &b));
        assert_ne!(CacheKey::new("select", &a), CacheKey::new("count", &a));
    }

    #[tokio::test]
    async fn test_reads_hit_cache_until_mutation() {
        let store = store();
        let query = Query::new(Collection::Contexts).eq("user_id", "u1");

        assert!(store.select(&query).await.unwrap().is_empty());
        assert!(store.select(&query).await.unwrap().is_empty());
        let stats = store.cache().stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));

        store
            .insert(Collection::Contexts, json!({"user_id": "u1", "title": "New"}))
            .await
            .unwrap();
        let rows = store.select(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(store.cache().stats().misses, 2);
    }

    #[tokio::test]
    async fn test_invalidation_is_scoped_to_user_and_collection() {
        let store = store();
        let u1 = Query::new(Collection::Contexts).eq("user_id", "u1");
        let u2 = Query::new(Collection::Contexts).eq("user_id", "u2");
        let prompts = Query::new(Collection::Prompts).eq("user_id", "u1");
        store.select(&u1).await.unwrap();
        store.select(&u2).await.unwrap();
        store.count(&prompts).await.unwrap();

        store
            .insert(Collection::Contexts, json!({"user_id": "u1"}))
            .await
            .unwrap();

        let before = store.cache().stats();
        store.select(&u2).await.unwrap();
        store.count(&prompts).await.unwrap();
        store.select(&u1).await.unwrap();
        let after = store.cache().stats();
        assert_eq!(after.hits - before.hits, 2);
        assert_eq!(after.misses - before.misses, 1);
    }

    #[tokio::test]
    async fn test_delete_invalidates() {
        let store = store();
        let row = store
            .insert(Collection::Coaches, json!({"user_id": "u1", "name": "Ada"}))
            .await
            .unwrap();
        let all = Query::new(Collection::Coaches).eq("user_id", "u1");
        assert_eq!(store.count(&all).await.unwrap(), 1);

        let by_id = Query::new(Collection::Coaches)
            .eq("id", row["id"].as_str().unwrap())
            .eq("user_id", "u1");
        store.delete(&by_id).await.unwrap();
        assert_eq!(store.count(&all).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_overlapping_insert_is_not_cached() {
        let (release, gate) = oneshot::channel();
        let gated = Arc::new(GatedStore {
            inner: InMemoryDataStore::new(),
            gate: Mutex::new(Some(gate)),
            entered: Notify::new(),
        });
        let store = Arc::new(CachedStore::new(gated.clone(), &CacheConfig::default()));
        let query = Query::new(Collection::Contexts).eq("user_id", "u1");

        let reader = {
            let store = Arc::clone(&store);
            let query = query.clone();
            tokio::spawn(async move { store.select(&query).await.unwrap() })
        };
        gated.entered.notified().await;

        store
            .insert(Collection::Contexts, json!({"user_id": "u1", "title": "New"}))
            .await
            .unwrap();
        release.send(()).unwrap();

        // The overlapping read saw the old rows but must not have cached them.
        assert!(reader.await.unwrap().is_empty());
        assert_eq!(store.select(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalidation_covers_every_filter_variant() {
        let store = store();
        let queries: Vec<Query> = (0..20)
            .map(|i| {
                Query::new(Collection::Contexts)
                    .eq("user_id", "u1")
                    .eq("category", format!("c{}", i))
            })
            .collect();
        for query in &queries {
            store.select(query).await.unwrap();
        }

        store.invalidate(Collection::Contexts, Some("u1")).await;

        let before = store.cache().stats();
        for query in &queries {
            store.select(query).await.unwrap();
        }
        let after = store.cache().stats();
        assert_eq!(after.misses - before.misses, 20);
        assert_eq!(after.hits, before.hits);
    }

    #[tokio::test]
    async fn test_collection_wide_invalidation() {
        let store = store();
        let u1 = Query::new(Collection::AutomationRuns).eq("user_id", "u1");
        let u2 = Query::new(Collection::AutomationRuns).eq("user_id", "u2");
        store.count(&u1).await.unwrap();
        store.count(&u2).await.unwrap();

        store.invalidate(Collection::AutomationRuns, None).await;

        let before = store.cache().stats();
        store.count(&u1).await.unwrap();
        store.count(&u2).await.unwrap();
        assert_eq!(store.cache().stats().misses - before.misses, 2);
    }
}
