//! 翻译配置管理模块
//!
//! 提供配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{CacheKind, CacheSettings, ConfigManager, ProviderSettings, TranslationConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 合并队列与流式缓冲
    pub const DEFAULT_COALESCE_DELAY_MS: u64 = 50;
    pub const DEFAULT_STREAM_BUFFER_MS: u64 = 1000;
    pub const STREAM_CHANNEL_CAPACITY: usize = 64;

    // 文本过滤相关
    pub const MIN_TEXT_LENGTH: usize = 2;

    // 默认后端设置
    pub const DEFAULT_PROVIDER: &str = "mock";
    pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
    pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
    pub const DEFAULT_DEEPLX_URL: &str = "http://localhost:1188/translate";
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    // 缓存设置
    pub const DEFAULT_CACHE_TTL_SECS: i64 = 3600 * 24 * 7; // 7天
    pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;
    pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";
    pub const DEFAULT_REDIS_KEY_PREFIX: &str = "jit:translation:";

    // 可翻译属性
    pub const TRANSLATABLE_ATTRS: &[&str] = &["title", "alt", "placeholder", "aria-label"];

    // 跳过的元素
    pub const SKIP_ELEMENTS: &[&str] = &[
        "script", "style", "code", "pre", "noscript", "svg", "math", "canvas", "template",
        "textarea", "kbd", "samp", "var",
    ];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "jit-translator.toml",
        ".jit-translator.toml",
        "translation-config.json",
        "~/.config/jit-translator/config.toml",
        "/etc/jit-translator/config.toml",
    ];
}
