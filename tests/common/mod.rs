// 集成测试公共模块
//
// 提供测试用的翻译后端和构建辅助函数

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use jit_translator::translation::providers::{BackendRequest, MockBackend, StreamChunk, TranslationBackend};
use jit_translator::translation::storage::MemoryCache;
use jit_translator::translation::{BatchResolver, TranslatableItem, TranslationError, TranslationResult};

/// 把字符串列表转换为待翻译条目
pub fn items(texts: &[&str]) -> Vec<TranslatableItem> {
    texts.iter().copied().map(TranslatableItem::new).collect()
}

/// 内存缓存 + 指定后端的解析器
pub fn resolver_with(backend: Arc<dyn TranslationBackend>) -> (Arc<BatchResolver>, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::new(1000, 0));
    let resolver = Arc::new(BatchResolver::new(cache.clone(), backend));
    (resolver, cache)
}

/// 对指定目标语言失败的后端，其余语言按 mock 规则翻译
#[derive(Debug, Default)]
pub struct FailingBackend {
    fail_langs: HashSet<String>,
    fail_all: bool,
    calls: AtomicUsize,
}

impl FailingBackend {
    /// 所有调用都失败
    pub fn always() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    /// 只对这些语言失败
    pub fn for_langs(langs: &[&str]) -> Self {
        Self {
            fail_langs: langs.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    async fn translate(&self, request: &BackendRequest) -> TranslationResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all || self.fail_langs.contains(&request.target_lang) {
            return Err(TranslationError::ApiError {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        Ok(request.texts.iter().map(|t| MockBackend::render(t, request)).collect())
    }
}

/// 返回结果比请求少一条的后端
#[derive(Debug, Default)]
pub struct ShortBackend;

#[async_trait]
impl TranslationBackend for ShortBackend {
    fn name(&self) -> &str {
        "short"
    }

    async fn translate(&self, request: &BackendRequest) -> TranslationResult<Vec<String>> {
        let mut out: Vec<String> = request.texts.iter().map(|t| MockBackend::render(t, request)).collect();
        out.pop();
        Ok(out)
    }
}

/// 每次调用耗时固定的后端，用于观察正在进行中的刷新
#[derive(Debug)]
pub struct SlowBackend {
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowBackend {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationBackend for SlowBackend {
    fn name(&self) -> &str {
        "slow"
    }

    async fn translate(&self, request: &BackendRequest) -> TranslationResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(request.texts.iter().map(|t| MockBackend::render(t, request)).collect())
    }
}

/// 流式输出若干条后中断或提前结束的后端
#[derive(Debug)]
pub struct BrokenStreamBackend {
    /// 中断前成功输出的条数
    pub succeed: usize,
    pub chunk_delay: Duration,
    /// 为 false 时不报错，直接结束流
    pub ends_with_error: bool,
}

#[async_trait]
impl TranslationBackend for BrokenStreamBackend {
    fn name(&self) -> &str {
        "broken-stream"
    }

    async fn translate(&self, _request: &BackendRequest) -> TranslationResult<Vec<String>> {
        Err(TranslationError::InternalError("batch path not expected".to_string()))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn translate_stream(
        &self,
        request: &BackendRequest,
    ) -> TranslationResult<BoxStream<'static, TranslationResult<StreamChunk>>> {
        let delay = self.chunk_delay;
        let mut events: Vec<TranslationResult<StreamChunk>> = request
            .texts
            .iter()
            .take(self.succeed)
            .enumerate()
            .map(|(index, text)| {
                Ok(StreamChunk {
                    index,
                    translation: MockBackend::render(text, request),
                })
            })
            .collect();
        if self.ends_with_error {
            events.push(Err(TranslationError::NetworkError("connection reset".to_string())));
        }

        Ok(stream::iter(events)
            .then(move |event| async move {
                tokio::time::sleep(delay).await;
                event
            })
            .boxed())
    }
}
