//! 翻译模块
//!
//! 即时翻译 HTML 文档中的文本，通过内容寻址缓存和微批次合并尽量减少对外部翻译后端的调用：
//! - **core**: 翻译服务
//! - **pipeline**: 指纹、批量解析、请求合并、流式交付、文本收集
//! - **storage**: 内存缓存与 Redis 缓存
//! - **providers**: 翻译后端
//! - **config**: 配置管理
//! - **languages**: 语言元数据
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use jit_translator::translation::{TranslationConfig, TranslationService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = TranslationService::new(TranslationConfig::default_with_lang("ja"))?;
//! let translated = service.translate_text("Add to cart", None).await?;
//! # Ok(())
//! # }
//! ```

/// 配置管理模块
pub mod config;

/// 翻译服务
pub mod core;

/// 错误处理模块
pub mod error;

/// 语言元数据
pub mod languages;

/// 文本处理管道
pub mod pipeline;

/// 翻译后端
pub mod providers;

/// 缓存存储
pub mod storage;

pub use config::{CacheKind, CacheSettings, ConfigManager, ProviderSettings, TranslationConfig};
pub use core::{DocumentReport, TranslationService};
pub use error::{BatchFailure, TranslationError, TranslationResult};
pub use languages::{is_rtl, language_info, text_direction, LanguageInfo, TextDirection};
pub use pipeline::{
    BatchOutcome, BatchResolver, DeliveryPhase, Fingerprint, HtmlDocument, RequestCoalescer, StreamEvent,
    StreamedTranslation, StreamingDelivery, TextSegment, TextSource, TranslatableItem,
};
pub use providers::{
    build_backend, BackendRequest, ProviderKind, StreamChunk, TranslationBackend, TranslationOptions,
    TranslationStyle,
};
pub use storage::{build_cache, CacheStats, CacheStore, MemoryCache, NoopCache, RedisCache};
