//! # jit-translator
//!
//! HTML 文档的即时翻译库：内容寻址缓存、去重批量解析、微批次合并以及流式交付。
//!
//! ## 模块组织
//!
//! - `translation` - 翻译服务、管道、缓存和后端
//! - `parsers` - HTML 解析与序列化
//! - `env` - 环境变量

pub mod env;
pub mod parsers;
pub mod translation;

pub use translation::{TranslationConfig, TranslationError, TranslationResult, TranslationService};
