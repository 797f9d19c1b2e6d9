//! 进程内翻译缓存
//!
//! 有界 LRU 存储，每个条目记录写入时间，读取时惰性检查过期（不做后台清扫）。
//! TTL 小于等于 0 表示永不过期，在构造时一次性确定。

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::time::Instant;

use super::{CacheCounters, CacheStats, CacheStore};

/// 缓存条目
#[derive(Debug, Clone)]
struct CacheEntry {
    translation: String,
    stored_at: Instant,
}

impl CacheEntry {
    /// 检查条目是否过期
    fn is_expired(&self, ttl: Option<Duration>, now: Instant) -> bool {
        match ttl {
            Some(ttl) => now.duration_since(self.stored_at) > ttl,
            None => false,
        }
    }
}

/// 进程内翻译缓存
pub struct MemoryCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Option<Duration>,
    counters: CacheCounters,
}

impl MemoryCache {
    /// 创建缓存，`ttl_secs <= 0` 表示永不过期
    pub fn new(capacity: usize, ttl_secs: i64) -> Self {
        let ttl = u64::try_from(ttl_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        Self::with_ttl(capacity, ttl)
    }

    /// 使用精确的过期时长创建缓存，`None` 表示永不过期
    pub fn with_ttl(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: ttl.filter(|ttl| !ttl.is_zero()),
            counters: CacheCounters::default(),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn entries(&self) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 同步读取，过期条目会被移除
    pub fn lookup(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries();

        let result = match entries.get(key) {
            Some(entry) if !entry.is_expired(self.ttl, now) => Some(entry.translation.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        };

        self.counters.record_lookup(result.is_some());
        result
    }

    /// 同步写入，覆盖旧值并重置写入时间
    pub fn store(&self, key: &str, value: &str) {
        let entry = CacheEntry {
            translation: value.to_string(),
            stored_at: Instant::now(),
        };
        self.entries().put(key.to_string(), entry);
        self.counters.record_write();
    }

    /// 获取缓存大小（包含尚未被读取触发清理的过期条目）
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清空缓存
    pub fn clear(&self) {
        self.entries().clear();
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.lookup(key)
    }

    async fn set(&self, key: &str, value: &str) {
        self.store(key, value)
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}
