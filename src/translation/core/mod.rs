//! 翻译系统核心模块
//!
//! ```text
//! TranslationService (service.rs)
//!     ├── BatchResolver (pipeline/batch.rs)
//!     │       ├── CacheStore (storage/)
//!     │       └── TranslationBackend (providers/)
//!     ├── RequestCoalescer (pipeline/coalescer.rs)
//!     └── StreamingDelivery (pipeline/streaming.rs)
//! ```

pub mod service;

/// 统一翻译服务 - 主要的对外接口
pub use service::TranslationService;

/// 文档翻译报告
pub use service::DocumentReport;
