// ============================================================================
// MERIDIAN COMMERCE - KEY/VALUE STORE
// ============================================================================
// Module: shared/src/cache.rs
// Description: Redis-backed key/value store behind a narrow trait, with an
//              in-process implementation for hermetic tests
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::time::Instant;

use crate::error::Result;

/// The subset of the shared store the core relies on: atomic SET with TTL,
/// INCR with TTL on first touch, GETDEL, and TTL inspection.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    async fn del(&self, key: &str) -> Result<()>;

    /// Atomic read-and-delete; `None` when the key does not exist.
    async fn get_del(&self, key: &str) -> Result<Option<String>>;

    /// Atomic increment. The TTL is attached only when the increment created
    /// the key, so the window does not slide on every hit.
    async fn incr_with_ttl(&self, key: &str, ttl_secs: u64) -> Result<i64>;

    /// Remaining TTL in seconds; `None` when missing or persistent.
    async fn ttl(&self, key: &str) -> Result<Option<u64>>;
}

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL").arg(key).query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn get_del(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GETDEL").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn incr_with_ttl(&self, key: &str, ttl_secs: u64) -> Result<i64> {
        let mut conn = self.conn.clone();
        let count: i64 = redis::cmd("INCR").arg(key).query_async(&mut conn).await?;
        if count == 1 {
            redis::cmd("EXPIRE")
                .arg(key)
                .arg(ttl_secs)
                .query_async::<_, ()>(&mut conn)
                .await?;
        }
        Ok(count)
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        let mut conn = self.conn.clone();
        let ttl: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;
        if ttl < 0 {
            Ok(None)
        } else {
            Ok(Some(ttl as u64))
        }
    }
}

/// In-process store with the same TTL semantics, used by tests. Uses tokio
/// time so paused-clock tests can advance expiry deterministically.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_value(entry: &MemoryEntry) -> Option<String> {
        match entry.expires_at {
            Some(deadline) if Instant::now() >= deadline => None,
            _ => Some(entry.value.clone()),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().expect("store poisoned");
        match entries.get(key).and_then(Self::live_value) {
            Some(value) => Ok(Some(value)),
            None => {
                entries.remove(key);
                Ok(None)
            }
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut entries = self.entries.lock().expect("store poisoned");
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.entries.lock().expect("store poisoned").remove(key);
        Ok(())
    }

    async fn get_del(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().expect("store poisoned");
        Ok(entries.remove(key).as_ref().and_then(Self::live_value))
    }

    async fn incr_with_ttl(&self, key: &str, ttl_secs: u64) -> Result<i64> {
        let mut entries = self.entries.lock().expect("store poisoned");
        let current = entries
            .get(key)
            .and_then(Self::live_value)
            .and_then(|v| v.parse::<i64>().ok());

        match current {
            Some(count) => {
                let next = count + 1;
                if let Some(entry) = entries.get_mut(key) {
                    entry.value = next.to_string();
                }
                Ok(next)
            }
            None => {
                entries.insert(
                    key.to_string(),
                    MemoryEntry {
                        value: "1".to_string(),
                        expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
                    },
                );
                Ok(1)
            }
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        let entries = self.entries.lock().expect("store poisoned");
        let remaining = entries
            .get(key)
            .and_then(|e| e.expires_at)
            .map(|deadline| deadline.saturating_duration_since(Instant::now()).as_secs());
        Ok(remaining)
    }
}
