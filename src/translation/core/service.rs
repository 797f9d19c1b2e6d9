//! 翻译服务
//!
//! 一个服务实例持有一个缓存、一个后端，以及共享它们的批量解析器、请求合并器和
//! 流式交付器。三种调用方式：
//!
//! - [`TranslationService::translate_batch`]: 整批解析
//! - [`TranslationService::translate_text`]: 单条文本，经合并队列与同一窗口内的其他请求共用后端调用
//! - [`TranslationService::stream`]: 渐进式交付
//!
//! ```rust,no_run
//! use jit_translator::translation::{HtmlDocument, TextSource, TranslationConfig, TranslationService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = TranslationService::new(TranslationConfig::default_with_lang("fr"))?;
//! let mut doc = HtmlDocument::parse("<p>Hello</p>")?;
//! let report = service.translate_document(&mut doc, None).await?;
//! println!("{} 条来自缓存", report.cached);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use futures::stream::BoxStream;

use crate::translation::config::TranslationConfig;
use crate::translation::error::{BatchFailure, TranslationError, TranslationResult};
use crate::translation::languages;
use crate::translation::pipeline::{
    BatchOutcome, BatchResolver, RequestCoalescer, StreamEvent, StreamingDelivery, TextSource, TranslatableItem,
};
use crate::translation::providers::{build_backend, TranslationBackend};
use crate::translation::storage::{build_cache, CacheStats, CacheStore};

/// 文档翻译报告
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentReport {
    /// 收集到的片段数
    pub segments: usize,
    /// 来自缓存的不同文本数
    pub cached: usize,
    /// 由后端翻译的不同文本数
    pub translated: usize,
    /// 实际写回文档的片段数
    pub applied: usize,
}

/// 翻译服务
pub struct TranslationService {
    config: TranslationConfig,
    resolver: Arc<BatchResolver>,
    coalescer: RequestCoalescer,
    streaming: StreamingDelivery,
}

impl TranslationService {
    /// 按配置创建缓存和后端
    pub fn new(config: TranslationConfig) -> TranslationResult<Self> {
        config.validate()?;
        let cache = build_cache(&config.cache)?;
        let backend = build_backend(&config.provider)?;
        Ok(Self::with_components(config, cache, backend))
    }

    /// 使用外部提供的缓存和后端
    pub fn with_components(
        config: TranslationConfig,
        cache: Arc<dyn CacheStore>,
        backend: Arc<dyn TranslationBackend>,
    ) -> Self {
        let resolver = Arc::new(
            BatchResolver::new(cache, backend)
                .with_source_lang(config.source_lang.clone())
                .with_options(config.options()),
        );
        let coalescer =
            RequestCoalescer::with_delay(Arc::clone(&resolver), config.target_lang.clone(), config.coalesce_delay());
        let streaming = StreamingDelivery::with_buffer_window(Arc::clone(&resolver), config.stream_buffer());

        tracing::info!(
            "翻译服务就绪: {} -> {} (后端 {}, 缓存 {})",
            config.source_lang,
            config.target_lang,
            resolver.backend().name(),
            resolver.cache().name()
        );

        Self {
            config,
            resolver,
            coalescer,
            streaming,
        }
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn target_lang(&self) -> &str {
        &self.config.target_lang
    }

    pub fn resolver(&self) -> &Arc<BatchResolver> {
        &self.resolver
    }

    pub fn coalescer(&self) -> &RequestCoalescer {
        &self.coalescer
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.resolver.cache().stats()
    }

    /// 整批翻译
    pub async fn translate_batch(
        &self,
        items: &[TranslatableItem],
        target_lang: Option<&str>,
    ) -> Result<BatchOutcome, BatchFailure> {
        let lang = match self.resolve_lang(target_lang) {
            Ok(lang) => lang,
            Err(e) => return Err(BatchFailure::new(e, Default::default())),
        };
        self.resolver.resolve_batch(items, lang).await
    }

    /// 单条文本翻译，经过合并队列
    pub async fn translate_text(&self, text: &str, target_lang: Option<&str>) -> TranslationResult<String> {
        let lang = self.resolve_lang(target_lang)?;
        self.coalescer.enqueue(text, Some(lang)).await
    }

    /// 渐进式翻译，事件中的 `index` 对应 `texts` 中的位置
    pub fn stream(
        &self,
        texts: Vec<String>,
        target_lang: Option<&str>,
    ) -> TranslationResult<BoxStream<'static, TranslationResult<StreamEvent>>> {
        let lang = self.resolve_lang(target_lang)?;
        let items = texts.into_iter().map(TranslatableItem::new).collect();
        Ok(self.streaming.stream(items, lang))
    }

    /// 翻译整个文档：收集片段、整批解析、写回译文并标记语言
    ///
    /// 后端失败时文档保持不变并返回错误。
    pub async fn translate_document<S: TextSource>(
        &self,
        doc: &mut S,
        target_lang: Option<&str>,
    ) -> TranslationResult<DocumentReport> {
        let lang = self.resolve_lang(target_lang)?.to_string();
        let segments = doc.segments();
        let items: Vec<TranslatableItem> = segments
            .iter()
            .map(|segment| TranslatableItem::new(segment.raw_text.as_str()))
            .collect();

        let outcome = self.resolver.resolve_batch(&items, &lang).await?;
        let applied = doc.apply(&outcome.translations);
        doc.set_language(&lang);

        let report = DocumentReport {
            segments: segments.len(),
            cached: outcome.cached_count,
            translated: outcome.translated_count,
            applied,
        };
        tracing::info!(
            "文档翻译完成 ({}): {} 个片段，缓存 {}，翻译 {}",
            lang,
            report.segments,
            report.cached,
            report.translated
        );
        Ok(report)
    }

    fn resolve_lang<'a>(&'a self, target_lang: Option<&'a str>) -> TranslationResult<&'a str> {
        let lang = target_lang.unwrap_or(&self.config.target_lang);
        if languages::is_valid_code(lang) {
            Ok(lang)
        } else {
            Err(TranslationError::InvalidInput(format!("无效的目标语言: '{}'", lang)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::pipeline::HtmlDocument;
    use crate::translation::providers::MockBackend;
    use crate::translation::storage::MemoryCache;

    fn service() -> (TranslationService, Arc<MockBackend>) {
        let backend = Arc::new(MockBackend::new());
        let service = TranslationService::with_components(
            TranslationConfig::default_with_lang("de"),
            Arc::new(MemoryCache::new(100, 0)),
            backend.clone(),
        );
        (service, backend)
    }

    #[tokio::test]
    async fn test_translate_document_reports_counts() {
        let (service, backend) = service();
        let mut doc = HtmlDocument::parse("<ul><li>Save</li><li>Save</li><li>Cancel</li></ul>").unwrap();

        let report = service.translate_document(&mut doc, None).await.unwrap();
        assert_eq!(
            report,
            DocumentReport {
                segments: 3,
                cached: 0,
                translated: 2,
                applied: 3,
            }
        );
        assert!(doc.serialize().unwrap().contains("<li>[de] Save</li>"));

        let mut again = HtmlDocument::parse("<p>Cancel</p>").unwrap();
        let report = service.translate_document(&mut again, None).await.unwrap();
        assert_eq!(report.cached, 1);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_language_is_rejected() {
        let (service, backend) = service();
        let err = service.translate_text("Hello", Some("not a language")).await.unwrap_err();
        assert!(matches!(err, TranslationError::InvalidInput(_)));
        assert_eq!(backend.call_count(), 0);
    }
}
