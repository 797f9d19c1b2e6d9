//! 存储模块
//!
//! 提供翻译结果缓存。缓存键为 `fingerprint:target_lang`，同一原文在不同目标语言下
//! 是两个独立条目。
//!
//! 两种可互换的实现共享 [`CacheStore`] 能力接口：
//! - [`MemoryCache`]: 进程内有界缓存，读取时惰性过期
//! - [`RedisCache`]: 网络缓存，过期交由 Redis 自身处理
//!
//! 缓存只是优化手段：任何缓存故障都只会退化为"总是翻译"，绝不会向调用者抛出错误。

pub mod cache;
pub mod redis_cache;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::translation::config::{CacheKind, CacheSettings};
use crate::translation::error::TranslationResult;

pub use self::cache::MemoryCache;
pub use self::redis_cache::{RedisCache, RedisCacheConfig};

/// 缓存能力接口
///
/// `get`/`set` 不返回错误：实现内部负责记录并吞掉故障。
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 缓存实现名称，用于日志
    fn name(&self) -> &'static str;

    /// 读取缓存，缺失、过期或故障都返回 `None`
    async fn get(&self, key: &str) -> Option<String>;

    /// 写入缓存，无条件覆盖；故障时静默放弃
    async fn set(&self, key: &str, value: &str);

    /// 获取统计信息快照
    fn stats(&self) -> CacheStats;
}

/// 缓存统计信息
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub errors: u64,
}

impl CacheStats {
    /// 计算缓存命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// 线程安全的统计计数器
#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
}

impl CacheCounters {
    pub(crate) fn record_lookup(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("jit_cache_hits_total").increment(1);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("jit_cache_misses_total").increment(1);
        }
    }

    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// 禁用缓存时使用的空实现，总是未命中
#[derive(Debug, Default)]
pub struct NoopCache {
    counters: CacheCounters,
}

#[async_trait]
impl CacheStore for NoopCache {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn get(&self, _key: &str) -> Option<String> {
        self.counters.record_lookup(false);
        None
    }

    async fn set(&self, _key: &str, _value: &str) {}

    fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}

/// 根据配置构建缓存实现
///
/// 仅在配置本身无效（例如无法解析的 Redis 地址）时返回错误；
/// 连接不可达不会导致构建失败。
pub fn build_cache(settings: &CacheSettings) -> TranslationResult<Arc<dyn CacheStore>> {
    let store: Arc<dyn CacheStore> = match settings.kind {
        CacheKind::Memory => Arc::new(MemoryCache::new(settings.capacity, settings.ttl_secs)),
        CacheKind::Redis => Arc::new(RedisCache::new(RedisCacheConfig::from(settings))?),
        CacheKind::None => Arc::new(NoopCache::default()),
    };
    tracing::info!("使用缓存实现: {}", store.name());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_cache_always_misses() {
        let cache = NoopCache::default();
        cache.set("k:es", "v").await;
        assert_eq!(cache.get("k:es").await, None);
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().hit_rate(), 0.0);
    }

    #[test]
    fn test_build_memory_cache_from_settings() {
        let settings = CacheSettings::default();
        let cache = build_cache(&settings).expect("memory cache should build");
        assert_eq!(cache.name(), "memory");
    }

    #[test]
    fn test_build_redis_cache_rejects_invalid_url() {
        let settings = CacheSettings {
            kind: CacheKind::Redis,
            connection_string: Some("not a url".to_string()),
            ..CacheSettings::default()
        };
        assert!(build_cache(&settings).is_err());
    }
}
