use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::Result;

use super::cache_keys::QueryKey;

const REDIS_KEY_PREFIX: &str = "qc";
const REDIS_SCAN_COUNT: usize = 200;

/// Key-value store for read results. `invalidate` drops the entry for `key`
/// and every entry whose key starts with it.
#[async_trait]
pub trait QueryCache: Send + Sync {
    async fn get(&self, key: &QueryKey) -> Result<Option<serde_json::Value>>;
    async fn put(&self, key: &QueryKey, value: serde_json::Value) -> Result<()>;
    async fn invalidate(&self, key: &QueryKey) -> Result<()>;

    fn backend(&self) -> &'static str;
}

struct CachedEntry {
    value: serde_json::Value,
    stored_at: Instant,
}

pub struct MemoryQueryCache {
    entries: RwLock<HashMap<QueryKey, CachedEntry>>,
    ttl: Duration,
}

impl MemoryQueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl QueryCache for MemoryQueryCache {
    async fn get(&self, key: &QueryKey) -> Result<Option<serde_json::Value>> {
        let guard = self.entries.read().await;
        Ok(guard
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() <= self.ttl)
            .map(|entry| entry.value.clone()))
    }

    async fn put(&self, key: &QueryKey, value: serde_json::Value) -> Result<()> {
        let mut guard = self.entries.write().await;
        guard.retain(|_, entry| entry.stored_at.elapsed() <= self.ttl);
        guard.insert(
            key.clone(),
            CachedEntry {
                value,
                stored_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn invalidate(&self, key: &QueryKey) -> Result<()> {
        let mut guard = self.entries.write().await;
        guard.retain(|cached_key, _| !cached_key.starts_with(key));
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

pub struct RedisQueryCache {
    redis: ConnectionManager,
    ttl_secs: u64,
}

impl RedisQueryCache {
    pub async fn connect(redis_url: &str, ttl_secs: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self { redis, ttl_secs })
    }

    fn redis_key(key: &QueryKey) -> String {
        format!("{}:{}", REDIS_KEY_PREFIX, key.to_cache_string())
    }

    async fn scan_matching(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.redis.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(REDIS_SCAN_COUNT)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }
}

fn escape_glob(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[async_trait]
impl QueryCache for RedisQueryCache {
    async fn get(&self, key: &QueryKey) -> Result<Option<serde_json::Value>> {
        let mut conn = self.redis.clone();
        let raw: Option<String> = conn.get(Self::redis_key(key)).await?;
        Ok(raw.and_then(|text| serde_json::from_str(&text).ok()))
    }

    async fn put(&self, key: &QueryKey, value: serde_json::Value) -> Result<()> {
        let mut conn = self.redis.clone();
        let _: () = conn
            .set_ex(Self::redis_key(key), value.to_string(), self.ttl_secs)
            .await?;
        Ok(())
    }

    async fn invalidate(&self, key: &QueryKey) -> Result<()> {
        let exact = Self::redis_key(key);
        let mut targets = self
            .scan_matching(&format!("{}:*", escape_glob(&exact)))
            .await?;
        targets.push(exact);

        let mut conn = self.redis.clone();
        let _: () = conn.del(targets).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(parts: &[&str]) -> QueryKey {
        QueryKey::new(parts.iter().copied())
    }

    #[tokio::test]
    async fn invalidate_drops_exact_and_descendant_keys() {
        let cache = MemoryQueryCache::new(Duration::from_secs(60));
        cache
            .put(&key(&["nameTrade", "testnet", "offers", "0xA", "1"]), serde_json::json!(1))
            .await
            .unwrap();
        cache
            .put(&key(&["nameTrade", "testnet", "offers"]), serde_json::json!(2))
            .await
            .unwrap();
        cache
            .put(&key(&["nameTrade", "testnet", "getListing", "0xA", "1"]), serde_json::json!(3))
            .await
            .unwrap();

        cache
            .invalidate(&key(&["nameTrade", "testnet", "offers"]))
            .await
            .unwrap();

        assert_eq!(cache.len().await, 1);
        assert!(cache
            .get(&key(&["nameTrade", "testnet", "getListing", "0xA", "1"]))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let cache = MemoryQueryCache::new(Duration::ZERO);
        let k = key(&["nameTrade", "testnet", "constants"]);
        cache.put(&k, serde_json::json!({"fee": 500})).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(cache.get(&k).await.unwrap().is_none());
    }

    #[test]
    fn glob_characters_are_escaped() {
        assert_eq!(escape_glob("qc:a*b?[c]"), "qc:a\\*b\\?\\[c\\]");
    }

    #[test]
    fn redis_key_is_namespaced() {
        let k = key(&["nameTrade", "mainnet", "owner"]);
        assert_eq!(RedisQueryCache::redis_key(&k), "qc:nameTrade:mainnet:owner");
    }
}
