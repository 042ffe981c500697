//! # State Shadows
//!
//! An actor's in-memory state is authoritative. Two shadows trail it:
//!
//! - the **warm cache** (tier 2): fast, expiring, consulted first on hydration;
//! - the **durable store** (tier 3): the copy that survives everything.
//!
//! Both are collaborators behind traits so a deployment can plug in its own
//! technology. [`MemoryCache`] and [`MemoryStore`] are in-process backends used
//! by tests and the sample node; they can be told to fail writes or reads to
//! exercise the persistence-failure paths.

use crate::error::StorageError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// The persisted form of one entity's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub system: String,
    pub entity_id: u64,
    /// JSON text of the entity state.
    pub state: String,
    /// Number of successful flushes of this entity.
    pub version: u64,
    pub updated_at_ms: u64,
}

impl EntityRecord {
    pub fn new(system: impl Into<String>, entity_id: u64, state: String, version: u64) -> Self {
        let updated_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            system: system.into(),
            entity_id,
            state,
            version,
            updated_at_ms,
        }
    }
}

/// Cache key of an entity's shadow.
pub fn cache_key(system: &str, entity_id: u64) -> String {
    format!("actor:{system}:{entity_id}")
}

/// Tier-2 shadow: key/value with per-key expiry.
#[async_trait]
pub trait WarmCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Tier-3 shadow: durable entity records.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn save(&self, record: EntityRecord) -> Result<(), StorageError>;
    async fn find_by_id(
        &self,
        system: &str,
        entity_id: u64,
    ) -> Result<Option<EntityRecord>, StorageError>;
    async fn exists(&self, system: &str, entity_id: u64) -> Result<bool, StorageError>;
}

/// The pair of shadows an actor system writes through to.
#[derive(Clone)]
pub struct Storage {
    pub cache: Arc<dyn WarmCache>,
    pub store: Arc<dyn DurableStore>,
}

impl Storage {
    pub fn new(cache: Arc<dyn WarmCache>, store: Arc<dyn DurableStore>) -> Self {
        Self { cache, store }
    }

    /// Fresh in-memory cache and store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()), Arc::new(MemoryStore::new()))
    }
}

// =============================================================================
// IN-MEMORY BACKENDS
// =============================================================================

/// In-process warm cache. Expiry follows the tokio clock, so paused-time tests
/// can age entries with `tokio::time::advance`.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    fail_writes: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `set` fail until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Reads an entry without going through the async trait.
    pub fn peek(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone())
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|(_, expires_at)| *expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WarmCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut entries = self.entries.lock();
        let expired = matches!(entries.get(key), Some((_, expires_at)) if *expires_at <= Instant::now());
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteRejected(key.to_string()));
        }
        self.entries
            .lock()
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// In-process durable store keyed by `(system, entity_id)`.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<(String, u64), EntityRecord>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    saves: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Seeds or inspects records directly, bypassing failure injection.
    pub fn insert(&self, record: EntityRecord) {
        self.records
            .lock()
            .insert((record.system.clone(), record.entity_id), record);
    }

    pub fn record(&self, system: &str, entity_id: u64) -> Option<EntityRecord> {
        self.records
            .lock()
            .get(&(system.to_string(), entity_id))
            .cloned()
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn save(&self, record: EntityRecord) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteRejected(cache_key(
                &record.system,
                record.entity_id,
            )));
        }
        self.insert(record);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_by_id(
        &self,
        system: &str,
        entity_id: u64,
    ) -> Result<Option<EntityRecord>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("store reads disabled".into()));
        }
        Ok(self.record(system, entity_id))
    }

    async fn exists(&self, system: &str, entity_id: u64) -> Result<bool, StorageError> {
        Ok(self.find_by_id(system, entity_id).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn cache_entries_expire_after_ttl() {
        let cache = MemoryCache::new();
        cache
            .set("actor:player:1", "{}".into(), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(cache.get("actor:player:1").await.unwrap().as_deref(), Some("{}"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get("actor:player:1").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn store_write_failures_are_reported_and_recoverable() {
        let store = MemoryStore::new();
        let record = EntityRecord::new("player", 1, "{}".into(), 1);

        store.set_fail_writes(true);
        assert!(store.save(record.clone()).await.is_err());
        assert!(!store.exists("player", 1).await.unwrap());

        store.set_fail_writes(false);
        store.save(record).await.unwrap();
        assert!(store.exists("player", 1).await.unwrap());
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn cache_keys_are_namespaced_by_system() {
        assert_eq!(cache_key("guild", 42), "actor:guild:42");
    }
}
