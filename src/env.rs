//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问，所有变量以 `JIT_` 为前缀

use std::env;
use std::fmt;

use crate::translation::config::CacheKind;
use crate::translation::languages;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    /// 读取变量，未设置时返回默认值
    fn get() -> EnvResult<T> {
        match Self::lookup() {
            Some(result) => result,
            None => Self::DEFAULT.ok_or_else(|| EnvError {
                variable: Self::NAME.to_string(),
                message: "Required environment variable not set".to_string(),
            }),
        }
    }

    /// 只在变量确实设置时返回结果，用于覆盖配置文件中的值
    fn lookup() -> Option<EnvResult<T>> {
        match env::var(Self::NAME) {
            Ok(value) if !value.trim().is_empty() => Some(Self::parse(&value)),
            _ => None,
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "JIT_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            Self::lookup().unwrap_or_else(|| Ok("info".to_string()))
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                level @ ("trace" | "debug" | "info" | "warn" | "error") => Ok(level.to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid log level '{}'. Use: trace, debug, info, warn, error", value),
                }),
            }
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// 目标语言
    pub struct TargetLang;
    impl EnvVar<String> for TargetLang {
        const NAME: &'static str = "JIT_TARGET_LANG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Target language code, e.g. es, pt-BR";

        fn parse(value: &str) -> EnvResult<String> {
            parse_lang(value, Self::NAME)
        }
    }

    /// 源语言
    pub struct SourceLang;
    impl EnvVar<String> for SourceLang {
        const NAME: &'static str = "JIT_SOURCE_LANG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Source language code (default: en)";

        fn get() -> EnvResult<String> {
            Self::lookup().unwrap_or_else(|| Ok("en".to_string()))
        }

        fn parse(value: &str) -> EnvResult<String> {
            parse_lang(value, Self::NAME)
        }
    }

    /// 合并队列延迟（毫秒）
    pub struct CoalesceDelayMs;
    impl EnvVar<u64> for CoalesceDelayMs {
        const NAME: &'static str = "JIT_COALESCE_DELAY_MS";
        const DEFAULT: Option<u64> = Some(50);
        const DESCRIPTION: &'static str = "Debounce delay for single-text requests in milliseconds";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_u64(value, Self::NAME, 0, 10_000)
        }
    }

    /// 流式缓冲窗口（毫秒）
    pub struct StreamBufferMs;
    impl EnvVar<u64> for StreamBufferMs {
        const NAME: &'static str = "JIT_STREAM_BUFFER_MS";
        const DEFAULT: Option<u64> = Some(1000);
        const DESCRIPTION: &'static str = "Initial buffering window for streamed results in milliseconds";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_u64(value, Self::NAME, 0, 60_000)
        }
    }
}

/// 翻译后端相关环境变量
pub mod provider {
    use super::*;

    /// 后端类型
    pub struct Type;
    impl EnvVar<String> for Type {
        const NAME: &'static str = "JIT_PROVIDER";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Translation provider: openai, deeplx, mock";

        fn parse(value: &str) -> EnvResult<String> {
            // 未知标签在构建后端时回退到 mock，这里不做限制
            Ok(value.trim().to_lowercase())
        }
    }

    /// API 密钥
    pub struct ApiKey;
    impl EnvVar<String> for ApiKey {
        const NAME: &'static str = "JIT_API_KEY";
        const DEFAULT: Option<String> = None; // 无默认值
        const DESCRIPTION: &'static str = "Provider API key";

        fn parse(value: &str) -> EnvResult<String> {
            let key = value.trim();
            if key.len() < 8 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API key must be at least 8 characters".to_string(),
                });
            }
            Ok(key.to_string())
        }
    }

    /// 模型名称
    pub struct Model;
    impl EnvVar<String> for Model {
        const NAME: &'static str = "JIT_MODEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Model name for LLM providers";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    /// API 地址
    pub struct BaseUrl;
    impl EnvVar<String> for BaseUrl {
        const NAME: &'static str = "JIT_API_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Provider endpoint URL";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim();
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(url.trim_end_matches('/').to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API URL must start with http:// or https://".to_string(),
                })
            }
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 缓存类型
    pub struct Type;
    impl EnvVar<CacheKind> for Type {
        const NAME: &'static str = "JIT_CACHE";
        const DEFAULT: Option<CacheKind> = Some(CacheKind::Memory);
        const DESCRIPTION: &'static str = "Cache backend: memory, redis, none";

        fn parse(value: &str) -> EnvResult<CacheKind> {
            value.parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: format!("Invalid cache type '{}'. Use: memory, redis, none", value),
            })
        }
    }

    /// 缓存 TTL（秒），0 或负数表示永不过期
    pub struct Ttl;
    impl EnvVar<i64> for Ttl {
        const NAME: &'static str = "JIT_CACHE_TTL";
        const DEFAULT: Option<i64> = Some(3600 * 24 * 7);
        const DESCRIPTION: &'static str = "Cache TTL in seconds (0 = never expire)";

        fn parse(value: &str) -> EnvResult<i64> {
            value.trim().parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid number of seconds".to_string(),
            })
        }
    }

    /// 本地缓存容量
    pub struct Size;
    impl EnvVar<usize> for Size {
        const NAME: &'static str = "JIT_CACHE_SIZE";
        const DEFAULT: Option<usize> = Some(10_000);
        const DESCRIPTION: &'static str = "In-process cache capacity (number of entries)";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_u64(value, Self::NAME, 1, 10_000_000).map(|n| n as usize)
        }
    }

    /// Redis 连接地址
    pub struct RedisUrl;
    impl EnvVar<String> for RedisUrl {
        const NAME: &'static str = "JIT_REDIS_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Redis connection string";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim();
            if url.starts_with("redis://") || url.starts_with("rediss://") || url.starts_with("unix://") {
                Ok(url.to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Redis URL must start with redis://, rediss:// or unix://".to_string(),
                })
            }
        }
    }
}

/// 辅助函数
fn parse_lang(value: &str, var_name: &str) -> EnvResult<String> {
    let lang = value.trim();
    if languages::is_valid_code(lang) {
        Ok(lang.to_string())
    } else {
        Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Invalid language code '{}'", value),
        })
    }
}

fn parse_u64(value: &str, var_name: &str, min: u64, max: u64) -> EnvResult<u64> {
    let num: u64 = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

fn doc_line<T: fmt::Debug, V: EnvVar<T>>(docs: &mut String) {
    docs.push_str(&format!("- `{}`: {} (default: {:?})\n", V::NAME, V::DESCRIPTION, V::DEFAULT));
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    docs.push_str("## Core\n\n");
    doc_line::<String, core::LogLevel>(&mut docs);

    docs.push_str("\n## Translation\n\n");
    doc_line::<String, translation::TargetLang>(&mut docs);
    doc_line::<String, translation::SourceLang>(&mut docs);
    doc_line::<u64, translation::CoalesceDelayMs>(&mut docs);
    doc_line::<u64, translation::StreamBufferMs>(&mut docs);

    docs.push_str("\n## Provider\n\n");
    doc_line::<String, provider::Type>(&mut docs);
    doc_line::<String, provider::ApiKey>(&mut docs);
    doc_line::<String, provider::Model>(&mut docs);
    doc_line::<String, provider::BaseUrl>(&mut docs);

    docs.push_str("\n## Cache\n\n");
    doc_line::<CacheKind, cache::Type>(&mut docs);
    doc_line::<i64, cache::Ttl>(&mut docs);
    doc_line::<usize, cache::Size>(&mut docs);
    doc_line::<String, cache::RedisUrl>(&mut docs);

    docs
}
