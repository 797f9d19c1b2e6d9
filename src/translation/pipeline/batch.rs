//! 批量解析模块
//!
//! 先查缓存，再把去重后的未命中文本一次性交给后端翻译：
//!
//! 1. 按指纹去重后并发查询缓存
//! 2. 命中的直接进入结果，未命中的按首次出现顺序组成请求列表
//! 3. 没有未命中时不调用后端
//! 4. 后端结果按位置对应请求列表，长度不一致视为响应格式错误
//! 5. 译文并发写入缓存
//! 6. 后端失败时整组失败，不写缓存，已命中的结果随错误一起返回
//!
//! 同一段界面文本在一个页面里往往重复几十次，去重之后后端每个指纹最多收到一次。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;

use super::fingerprint::{Fingerprint, TranslatableItem};
use crate::translation::error::helpers::malformed;
use crate::translation::error::{BatchFailure, TranslationError};
use crate::translation::providers::{BackendRequest, TranslationBackend, TranslationOptions};
use crate::translation::storage::CacheStore;

/// 一次批量解析的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// 指纹 -> 译文，覆盖所有成功解析的条目（包括重复条目）
    pub translations: HashMap<Fingerprint, String>,
    /// 来自缓存的不同指纹数
    pub cached_count: usize,
    /// 由后端翻译的不同指纹数
    pub translated_count: usize,
}

impl BatchOutcome {
    /// 查找条目的译文
    pub fn translation_for(&self, item: &TranslatableItem) -> Option<&str> {
        self.translations.get(item.fingerprint()).map(String::as_str)
    }
}

/// 缓存查询的划分结果
#[derive(Debug, Default)]
pub(crate) struct CacheLookup {
    /// 命中的指纹及译文，按首次出现顺序
    pub hits: Vec<(Fingerprint, String)>,
    /// 去重后的未命中条目，按首次出现顺序
    pub misses: Vec<TranslatableItem>,
    /// 空白文本，无需翻译
    pub blanks: Vec<Fingerprint>,
}

/// 缓存优先的批量解析器
pub struct BatchResolver {
    cache: Arc<dyn CacheStore>,
    backend: Arc<dyn TranslationBackend>,
    source_lang: String,
    options: Arc<TranslationOptions>,
}

impl BatchResolver {
    pub fn new(cache: Arc<dyn CacheStore>, backend: Arc<dyn TranslationBackend>) -> Self {
        Self {
            cache,
            backend,
            source_lang: "en".to_string(),
            options: Arc::new(TranslationOptions::default()),
        }
    }

    pub fn with_source_lang(mut self, source_lang: impl Into<String>) -> Self {
        self.source_lang = source_lang.into();
        self
    }

    pub fn with_options(mut self, options: Arc<TranslationOptions>) -> Self {
        self.options = options;
        self
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    pub fn backend(&self) -> &Arc<dyn TranslationBackend> {
        &self.backend
    }

    /// 解析一批条目
    pub async fn resolve_batch(
        &self,
        items: &[TranslatableItem],
        target_lang: &str,
    ) -> Result<BatchOutcome, BatchFailure> {
        if items.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let lookup = self.lookup(items, target_lang).await;
        self.complete(lookup, target_lang).await
    }

    /// 在缓存查询结果的基础上完成解析：翻译未命中条目并写入缓存
    pub(crate) async fn complete(
        &self,
        lookup: CacheLookup,
        target_lang: &str,
    ) -> Result<BatchOutcome, BatchFailure> {
        let mut outcome = BatchOutcome {
            cached_count: lookup.hits.len(),
            ..BatchOutcome::default()
        };
        outcome.translations.extend(lookup.hits);
        outcome
            .translations
            .extend(lookup.blanks.into_iter().map(|fp| (fp, String::new())));

        if lookup.misses.is_empty() {
            tracing::debug!("批次全部命中缓存: {} 条 ({})", outcome.cached_count, target_lang);
            return Ok(outcome);
        }

        let request = self.request(&lookup.misses, target_lang);
        let translations = match self.call_backend(&request).await {
            Ok(translations) => translations,
            Err(error) => return Err(BatchFailure::new(error, outcome.translations)),
        };

        let writes = lookup
            .misses
            .iter()
            .zip(translations.iter())
            .map(|(item, translation)| self.store(item.fingerprint(), target_lang, translation));
        join_all(writes).await;

        outcome.translated_count = lookup.misses.len();
        outcome.translations.extend(
            lookup
                .misses
                .into_iter()
                .map(|item| item.fingerprint().clone())
                .zip(translations),
        );

        tracing::debug!(
            "批次完成 ({}): 缓存 {} 条，翻译 {} 条",
            target_lang,
            outcome.cached_count,
            outcome.translated_count
        );
        Ok(outcome)
    }

    /// 按指纹去重并发查询缓存
    pub(crate) async fn lookup(&self, items: &[TranslatableItem], target_lang: &str) -> CacheLookup {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        let mut result = CacheLookup::default();

        for item in items {
            if !seen.insert(item.fingerprint().clone()) {
                continue;
            }
            if item.text().trim().is_empty() {
                result.blanks.push(item.fingerprint().clone());
            } else {
                unique.push(item);
            }
        }

        let lookups = unique.iter().map(|item| {
            let key = item.fingerprint().cache_key(target_lang);
            async move { self.cache.get(&key).await }
        });
        let cached = join_all(lookups).await;

        for (item, hit) in unique.into_iter().zip(cached) {
            match hit {
                Some(translation) => result.hits.push((item.fingerprint().clone(), translation)),
                None => result.misses.push(item.clone()),
            }
        }
        result
    }

    pub(crate) fn request(&self, misses: &[TranslatableItem], target_lang: &str) -> BackendRequest {
        BackendRequest {
            texts: misses.iter().map(|item| item.text().trim().to_string()).collect(),
            source_lang: self.source_lang.clone(),
            target_lang: target_lang.to_string(),
            options: Arc::clone(&self.options),
        }
    }

    pub(crate) async fn store(&self, fingerprint: &Fingerprint, target_lang: &str, translation: &str) {
        self.cache
            .set(&fingerprint.cache_key(target_lang), translation)
            .await;
    }

    /// 调用后端并校验结果长度
    async fn call_backend(&self, request: &BackendRequest) -> Result<Vec<String>, TranslationError> {
        metrics::counter!("jit_backend_requests_total").increment(1);
        tracing::debug!(
            "调用后端 {}: {} 条 ({} -> {})",
            self.backend.name(),
            request.texts.len(),
            request.source_lang,
            request.target_lang
        );

        let result = self.backend.translate(request).await.and_then(|translations| {
            if translations.len() == request.texts.len() {
                Ok(translations)
            } else {
                Err(malformed(format!(
                    "期望 {} 条译文，实际返回 {} 条",
                    request.texts.len(),
                    translations.len()
                )))
            }
        });

        if let Err(e) = &result {
            metrics::counter!("jit_backend_failures_total").increment(1);
            tracing::error!("后端 {} 翻译失败: {}", self.backend.name(), e);
        }
        result
    }
}
