//! Key-value cache with per-entry expiry.
//!
//! The orchestrator only sees [`CacheStore`]. Two backends exist: an
//! in-process map for single-instance deployments and tests, and Postgres
//! for sharing one cache between several instances.
//!
//! Reading an entry at or past its `expires_at` is a miss. There is no
//! locking across instances: concurrent misses may both fetch and both
//! write, and the last write wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;

use crate::db::{models::CacheRow, queries};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid TTL: {0:?}")]
    InvalidTtl(Duration),
}

/// A cached value with its absolute expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub key: String,
    pub value: T,
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn new(key: &str, value: T, ttl: Duration) -> Result<Self, CacheError> {
        Ok(Self {
            key: key.to_string(),
            value,
            expires_at: expiry_from_now(ttl)?,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl From<CacheRow> for CacheEntry<serde_json::Value> {
    fn from(row: CacheRow) -> Self {
        Self {
            key: row.key,
            value: row.value,
            expires_at: row.expires_at,
        }
    }
}

fn expiry_from_now(ttl: Duration) -> Result<DateTime<Utc>, CacheError> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .ok_or(CacheError::InvalidTtl(ttl))
}

/// Storage boundary used by the orchestrator.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fresh value for `key`, or `None` on miss or expiry.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError>;

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration)
        -> Result<(), CacheError>;

    /// Remove every entry whose key starts with `prefix`; returns the count.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError>;

    /// Remove entries that have already expired; returns the count.
    async fn purge_expired(&self) -> Result<u64, CacheError>;

    /// Whether the backend is reachable.
    async fn ping(&self) -> bool;

    /// Short backend name for diagnostics.
    fn backend_name(&self) -> &'static str;
}

/// Typed read. A value that no longer deserializes is treated as a miss.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn CacheStore,
    key: &str,
) -> Result<Option<T>, CacheError> {
    match store.get(key).await? {
        Some(value) => match serde_json::from_value(value) {
            Ok(typed) => Ok(Some(typed)),
            Err(e) => {
                tracing::warn!("Discarding undecodable cache entry '{}': {}", key, e);
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

/// Typed write.
pub async fn set_json<T: Serialize>(
    store: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), CacheError> {
    let value = serde_json::to_value(value)?;
    store.set(key, value, ttl).await
}

/// How often [`run_expiry_sweep`] runs in the server.
pub const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Background loop dropping expired entries every `every`.
///
/// Reads already treat expired entries as misses; this bounds how long
/// entries that are never read again stay in the store. The first sweep runs
/// immediately. Runs until the task is aborted.
pub async fn run_expiry_sweep(store: Arc<dyn CacheStore>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match store.purge_expired().await {
            Ok(0) => {}
            Ok(n) => tracing::debug!("Swept {} expired {} cache entries", n, store.backend_name()),
            Err(e) => tracing::warn!("Cache expiry sweep failed: {}", e),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Process-local cache. Expired entries are dropped lazily on read.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry<serde_json::Value>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    #[cfg(test)]
    pub async fn expires_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.read().await.get(key).map(|e| e.expires_at)
    }

    /// Backdate an entry so the next read sees it as expired.
    #[cfg(test)]
    pub async fn force_expire(&self, key: &str) {
        if let Some(entry) = self.entries.write().await.get_mut(key) {
            entry.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        let now = Utc::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired_at(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: drop it unless a concurrent writer already replaced it.
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.is_expired_at(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry::new(key, value, ttl)?;
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }

    async fn purge_expired(&self) -> Result<u64, CacheError> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        Ok((before - entries.len()) as u64)
    }

    async fn ping(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// ---------------------------------------------------------------------------
// Postgres backend
// ---------------------------------------------------------------------------

/// Cache stored in the `cache_entries` table, shared across instances.
#[derive(Debug, Clone)]
pub struct PgCache {
    pool: PgPool,
}

impl PgCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheStore for PgCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        let entry = queries::get_cache_entry(&self.pool, key)
            .await?
            .map(CacheEntry::from);
        // The query already filters on expiry; re-check against our clock.
        Ok(entry
            .filter(|e| !e.is_expired_at(Utc::now()))
            .map(|e| e.value))
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry::new(key, value, ttl)?;
        queries::upsert_cache_entry(&self.pool, &entry.key, &entry.value, entry.expires_at).await?;
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        Ok(queries::delete_cache_entries_by_prefix(&self.pool, prefix).await?)
    }

    async fn purge_expired(&self) -> Result<u64, CacheError> {
        Ok(queries::delete_expired_cache_entries(&self.pool).await?)
    }

    async fn ping(&self) -> bool {
        queries::ping(&self.pool).await.is_ok()
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
