//! Redis 缓存模块
//!
//! 网络缓存实现，过期时间交由 Redis 的 `SET ... EX` 处理，不在本地重复实现。
//! 使用多路复用连接，多个并发请求共享同一连接而不会被串行化。
//!
//! 连接失败、命令失败或响应超时都只记录日志：读取视为未命中，写入视为尽力而为。
//! 一次故障期间只输出一条警告，恢复后输出一条信息日志。

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};

use super::{CacheCounters, CacheStats, CacheStore};
use crate::translation::config::{constants, CacheSettings};
use crate::translation::error::{TranslationError, TranslationResult};

/// 连接失败后再次尝试连接之前的等待时间
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Redis 缓存配置
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    pub url: String,
    /// 默认过期时间（秒），0表示永久缓存
    pub default_ttl: u64,
    pub key_prefix: String,
    pub connect_timeout: Duration,
    /// 单条命令等待响应的上限，超时按故障处理
    pub command_timeout: Duration,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: constants::DEFAULT_REDIS_URL.to_string(),
            default_ttl: 0,
            key_prefix: constants::DEFAULT_REDIS_KEY_PREFIX.to_string(),
            connect_timeout: Duration::from_secs(2),
            command_timeout: Duration::from_secs(1),
        }
    }
}

impl From<&CacheSettings> for RedisCacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        let defaults = Self::default();
        Self {
            url: settings.connection_string.clone().unwrap_or(defaults.url),
            default_ttl: u64::try_from(settings.ttl_secs).unwrap_or(0),
            key_prefix: settings.key_prefix.clone().unwrap_or(defaults.key_prefix),
            connect_timeout: defaults.connect_timeout,
            command_timeout: defaults.command_timeout,
        }
    }
}

/// 连接状态
#[derive(Default)]
struct ConnectionState {
    conn: Option<MultiplexedConnection>,
    retry_after: Option<Instant>,
}

/// Redis 缓存客户端
pub struct RedisCache {
    client: Client,
    config: RedisCacheConfig,
    state: Mutex<ConnectionState>,
    unavailable: AtomicBool,
    counters: CacheCounters,
}

impl RedisCache {
    /// 创建新的 Redis 缓存实例
    ///
    /// 只校验连接地址，不会立即建立连接。
    pub fn new(config: RedisCacheConfig) -> TranslationResult<Self> {
        let client = Client::open(config.url.as_str()).map_err(|e| {
            TranslationError::ConfigError(format!("无效的 Redis 地址 '{}': {}", config.url, e))
        })?;

        Ok(Self {
            client,
            config,
            state: Mutex::new(ConnectionState::default()),
            unavailable: AtomicBool::new(false),
            counters: CacheCounters::default(),
        })
    }

    /// 使用默认配置创建 Redis 缓存实例
    pub fn with_default_config() -> TranslationResult<Self> {
        Self::new(RedisCacheConfig::default())
    }

    /// 测试 Redis 连接
    pub async fn ping(&self) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        let ping = redis::cmd("PING");
        let reply: Option<String> = self.execute(ping.query_async(&mut conn)).await;
        reply.is_some()
    }

    /// 执行命令，失败或超时都会丢弃连接并返回 `None`
    async fn execute<T>(&self, command: impl Future<Output = redis::RedisResult<T>>) -> Option<T> {
        match timeout(self.config.command_timeout, command).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                self.on_failure(&e.to_string()).await;
                None
            }
            Err(_) => {
                self.on_failure("命令响应超时").await;
                None
            }
        }
    }

    /// 生成带前缀的存储键
    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    /// 获取共享连接，必要时建立新连接
    async fn connection(&self) -> Option<MultiplexedConnection> {
        let mut state = self.state.lock().await;
        if let Some(conn) = state.conn.as_ref() {
            return Some(conn.clone());
        }

        if let Some(until) = state.retry_after {
            if Instant::now() < until {
                return None;
            }
        }

        let attempt = timeout(
            self.config.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await;

        match attempt {
            Ok(Ok(conn)) => {
                state.conn = Some(conn.clone());
                state.retry_after = None;
                if self.unavailable.swap(false, Ordering::SeqCst) {
                    tracing::info!("Redis 缓存已恢复: {}", self.config.url);
                }
                Some(conn)
            }
            Ok(Err(e)) => {
                state.retry_after = Some(Instant::now() + RECONNECT_BACKOFF);
                drop(state);
                self.report_unavailable(&e.to_string());
                None
            }
            Err(_) => {
                state.retry_after = Some(Instant::now() + RECONNECT_BACKOFF);
                drop(state);
                self.report_unavailable("连接超时");
                None
            }
        }
    }

    /// 命令失败后丢弃连接，下次调用时重连
    async fn on_failure(&self, reason: &str) {
        {
            let mut state = self.state.lock().await;
            state.conn = None;
            state.retry_after = Some(Instant::now() + RECONNECT_BACKOFF);
        }
        self.report_unavailable(reason);
    }

    fn report_unavailable(&self, reason: &str) {
        self.counters.record_error();
        if !self.unavailable.swap(true, Ordering::SeqCst) {
            tracing::warn!("Redis 缓存不可用，退化为直接翻译: {}", reason);
        } else {
            tracing::debug!("Redis 缓存仍不可用: {}", reason);
        }
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Option<String> {
        let Some(mut conn) = self.connection().await else {
            self.counters.record_lookup(false);
            return None;
        };

        let reply: Option<Option<String>> = self.execute(conn.get(self.storage_key(key))).await;
        let value = reply.flatten();
        self.counters.record_lookup(value.is_some());
        value
    }

    async fn set(&self, key: &str, value: &str) {
        let Some(mut conn) = self.connection().await else {
            return;
        };

        let storage_key = self.storage_key(key);
        let stored: Option<()> = if self.config.default_ttl == 0 {
            // 永久存储，不设置过期时间
            self.execute(conn.set(storage_key, value)).await
        } else {
            self.execute(conn.set_ex(storage_key, value, self.config.default_ttl))
                .await
        };

        if stored.is_some() {
            self.counters.record_write();
        }
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> RedisCacheConfig {
        RedisCacheConfig {
            // 端口 1 上不会有 Redis 服务
            url: "redis://127.0.0.1:1/".to_string(),
            connect_timeout: Duration::from_millis(500),
            ..RedisCacheConfig::default()
        }
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let config = RedisCacheConfig {
            url: "definitely not redis".to_string(),
            ..RedisCacheConfig::default()
        };
        let err = RedisCache::new(config).err().expect("should reject url");
        assert!(matches!(err, TranslationError::ConfigError(_)));
    }

    #[test]
    fn test_storage_key_uses_prefix() {
        let cache = RedisCache::new(RedisCacheConfig {
            key_prefix: "app:".to_string(),
            ..unreachable_config()
        })
        .unwrap();
        assert_eq!(cache.storage_key("abc:es"), "app:abc:es");
    }

    #[tokio::test]
    async fn test_unreachable_server_degrades_to_miss() {
        let cache = RedisCache::new(unreachable_config()).unwrap();

        // 写入不应报错，读取视为未命中
        cache.set("abc:es", "hola").await;
        assert_eq!(cache.get("abc:es").await, None);
        assert!(!cache.ping().await);

        let stats = cache.stats();
        assert!(stats.errors >= 1);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.writes, 0);
    }

    /// 假的 Redis 服务：`silent` 置位前对每条命令回复 `+OK`，之后只读不回
    async fn stalling_server(silent: std::sync::Arc<AtomicBool>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let silent = silent.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    loop {
                        let n = match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => n,
                        };
                        if silent.load(Ordering::SeqCst) {
                            continue;
                        }
                        let commands = buf[..n]
                            .split(|&b| b == b'\n')
                            .filter(|line| line.first() == Some(&b'*'))
                            .count();
                        for _ in 0..commands {
                            if socket.write_all(b"+OK\r\n").await.is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        });
        format!("redis://{}/", addr)
    }

    #[tokio::test]
    async fn test_stalled_server_degrades_to_miss() {
        let silent = std::sync::Arc::new(AtomicBool::new(false));
        let url = stalling_server(silent.clone()).await;
        let cache = RedisCache::new(RedisCacheConfig {
            url,
            command_timeout: Duration::from_millis(200),
            ..RedisCacheConfig::default()
        })
        .unwrap();

        assert!(cache.ping().await);

        // 连接仍然打开，但服务不再响应
        silent.store(true, Ordering::SeqCst);
        let lookup = timeout(Duration::from_secs(5), cache.get("abc:es")).await;
        assert_eq!(lookup.expect("get should give up on a silent server"), None);

        let write = timeout(Duration::from_secs(5), cache.set("abc:es", "hola")).await;
        assert!(write.is_ok(), "set should give up on a silent server");

        let stats = cache.stats();
        assert!(stats.errors >= 1);
        assert_eq!(stats.writes, 0);
        println!("✅ Stalled Redis server test passed");
    }

    #[test]
    fn test_settings_conversion() {
        let settings = CacheSettings {
            ttl_secs: -1,
            connection_string: Some("redis://cache.internal:6379".to_string()),
            ..CacheSettings::default()
        };
        let config = RedisCacheConfig::from(&settings);
        assert_eq!(config.default_ttl, 0);
        assert_eq!(config.url, "redis://cache.internal:6379");
        assert_eq!(config.key_prefix, constants::DEFAULT_REDIS_KEY_PREFIX);
    }
}
