//! Key-value cache contract and implementations
//!
//! The classifier and the seasonality engine treat their caches as
//! append-only knowledge: entries are created on first miss, shared
//! across requests, and never mutated in place. No TTL semantics are
//! assumed here; eviction, if any, belongs to the store.
//!
//! A stampede on identical keys is tolerated: get-or-compute-and-store
//! may compute twice under concurrency, which costs a little efficiency
//! and nothing in correctness.

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Cache store errors
///
/// Callers recover from these by computing directly; a broken cache never
/// fails classification or seasonal lookup.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache store error: {0}")]
    Store(String),
}

/// Logical cache tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTable {
    ConflictWeights,
    SeasonalInsights,
}

impl CacheTable {
    fn table_name(&self) -> &'static str {
        match self {
            CacheTable::ConflictWeights => "conflict_weight_cache",
            CacheTable::SeasonalInsights => "seasonal_insights_cache",
        }
    }
}

/// Key-value cache contract: `get` returns the stored value or a miss,
/// `put` inserts without overwriting semantics the caller depends on.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, table: CacheTable, key: &str) -> Result<Option<Value>, CacheError>;
    async fn put(&self, table: CacheTable, key: &str, value: Value) -> Result<(), CacheError>;
}

/// Digest-based cache key from normalized parts.
///
/// Parts are lowercased and trimmed before hashing so "Theater" and
/// " theater " key identically.
pub fn cache_key(parts: &[&str]) -> String {
    let normalized = parts
        .iter()
        .map(|p| p.trim().to_lowercase())
        .collect::<Vec<_>>()
        .join("|");

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SQLite-backed cache store over the engine database
pub struct SqliteCache {
    db: Pool<Sqlite>,
}

impl SqliteCache {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CacheStore for SqliteCache {
    async fn get(&self, table: CacheTable, key: &str) -> Result<Option<Value>, CacheError> {
        let sql = format!(
            "SELECT payload FROM {} WHERE cache_key = ?",
            table.table_name()
        );
        let row: Option<(String,)> = sqlx::query_as(&sql)
            .bind(key)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| CacheError::Store(e.to_string()))?;

        match row {
            Some((payload,)) => {
                let value = serde_json::from_str(&payload)
                    .map_err(|e| CacheError::Store(format!("Corrupt cache payload: {}", e)))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, table: CacheTable, key: &str, value: Value) -> Result<(), CacheError> {
        let sql = format!(
            "INSERT INTO {} (cache_key, payload) VALUES (?, ?)
             ON CONFLICT(cache_key) DO NOTHING",
            table.table_name()
        );
        let payload = serde_json::to_string(&value)
            .map_err(|e| CacheError::Store(e.to_string()))?;

        sqlx::query(&sql)
            .bind(key)
            .bind(payload)
            .execute(&self.db)
            .await
            .map_err(|e| CacheError::Store(e.to_string()))?;

        Ok(())
    }
}

/// In-memory cache store for tests and cache-less deployments
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<(CacheTable, String), Value>>,
    /// When set, every operation errors; exercises the direct-computation
    /// fallback paths
    fail: bool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that always errors
    pub fn failing() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            fail: true,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, table: CacheTable, key: &str) -> Result<Option<Value>, CacheError> {
        if self.fail {
            return Err(CacheError::Store("memory cache marked unavailable".into()));
        }
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&(table, key.to_string()))
            .cloned())
    }

    async fn put(&self, table: CacheTable, key: &str, value: Value) -> Result<(), CacheError> {
        if self.fail {
            return Err(CacheError::Store("memory cache marked unavailable".into()));
        }
        self.entries
            .lock()
            .unwrap()
            .entry((table, key.to_string()))
            .or_insert(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::SqlitePool;

    #[test]
    fn cache_key_normalizes_case_and_whitespace() {
        let a = cache_key(&["Entertainment", " Theater "]);
        let b = cache_key(&["entertainment", "theater"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn cache_key_is_order_sensitive() {
        assert_ne!(cache_key(&["a", "b"]), cache_key(&["b", "a"]));
    }

    #[tokio::test]
    async fn memory_cache_round_trip() {
        let cache = MemoryCache::new();
        let miss = cache.get(CacheTable::ConflictWeights, "k").await.unwrap();
        assert!(miss.is_none());

        cache
            .put(CacheTable::ConflictWeights, "k", json!({"weight": 8.0}))
            .await
            .unwrap();
        let hit = cache.get(CacheTable::ConflictWeights, "k").await.unwrap();
        assert_eq!(hit.unwrap()["weight"], 8.0);
    }

    #[tokio::test]
    async fn memory_cache_first_write_wins() {
        let cache = MemoryCache::new();
        cache
            .put(CacheTable::SeasonalInsights, "k", json!(1))
            .await
            .unwrap();
        cache
            .put(CacheTable::SeasonalInsights, "k", json!(2))
            .await
            .unwrap();
        let value = cache.get(CacheTable::SeasonalInsights, "k").await.unwrap();
        assert_eq!(value.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn failing_cache_errors_on_both_operations() {
        let cache = MemoryCache::failing();
        assert!(cache.get(CacheTable::ConflictWeights, "k").await.is_err());
        assert!(cache
            .put(CacheTable::ConflictWeights, "k", json!(1))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn sqlite_cache_round_trip() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        let cache = SqliteCache::new(pool);

        let key = cache_key(&["music", "entertainment"]);
        assert!(cache
            .get(CacheTable::ConflictWeights, &key)
            .await
            .unwrap()
            .is_none());

        cache
            .put(
                CacheTable::ConflictWeights,
                &key,
                json!({"weight": 4.0, "method": "rule"}),
            )
            .await
            .unwrap();

        let hit = cache
            .get(CacheTable::ConflictWeights, &key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit["weight"], 4.0);
    }

    #[tokio::test]
    async fn sqlite_cache_tables_are_isolated() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        let cache = SqliteCache::new(pool);

        cache
            .put(CacheTable::ConflictWeights, "shared-key", json!("weights"))
            .await
            .unwrap();
        let other = cache
            .get(CacheTable::SeasonalInsights, "shared-key")
            .await
            .unwrap();
        assert!(other.is_none());
    }
}
