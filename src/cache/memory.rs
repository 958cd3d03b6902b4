//! # 内存存储实现
//!
//! 与 Redis 同契约的进程内实现，带 TTL 过期，供测试和单机评估使用。

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::cache::KvStore;
use crate::error::Result;

/// 存储项
#[derive(Debug, Clone)]
struct StoreEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StoreEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|t| Instant::now() + t),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() > at)
    }
}

/// 内存键值存储
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, StoreEntry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn cleanup_expired(&self) {
        let mut data = self.data.write().unwrap();
        data.retain(|_, entry| !entry.is_expired());
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.cleanup_expired();
        let data = self.data.read().unwrap();
        Ok(data
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let entry = StoreEntry::new(
            value.to_string(),
            Some(Duration::from_secs(ttl_seconds)),
        );
        let mut data = self.data.write().unwrap();
        data.insert(key.to_string(), entry);
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut data = self.data.write().unwrap();

        // 保留已有条目的 TTL，与 Redis INCRBY 语义一致
        match data.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                let current: i64 = entry.value.parse().unwrap_or(0);
                let next = current + delta;
                entry.value = next.to_string();
                Ok(next)
            }
            _ => {
                data.insert(key.to_string(), StoreEntry::new(delta.to_string(), None));
                Ok(delta)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut data = self.data.write().unwrap();
        Ok(data.remove(key).is_some())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete_round_trip() {
        let store = MemoryStore::new();
        store.set_ex("k", "v", 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert!(store.delete("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let store = MemoryStore::new();
        store.set_ex("k", "v", 0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn incr_by_preserves_ttl_and_counts() {
        let store = MemoryStore::new();
        store.set_ex("counter", "0", 60).await.unwrap();
        assert_eq!(store.incr_by("counter", 2).await.unwrap(), 2);
        assert_eq!(store.incr_by("counter", 3).await.unwrap(), 5);
        assert_eq!(store.get("counter").await.unwrap(), Some("5".to_string()));
    }

    #[tokio::test]
    async fn incr_by_starts_from_zero_for_missing_key() {
        let store = MemoryStore::new();
        assert_eq!(store.incr_by("fresh", 4).await.unwrap(), 4);
    }
}
