//! 离线 mock 后端
//!
//! 译文格式为 `[目标语言] 原文`，并应用术语表替换。记录每次调用，供测试断言。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use super::{BackendRequest, StreamChunk, TranslationBackend};
use crate::translation::error::TranslationResult;

/// 确定性的离线后端
#[derive(Debug, Default)]
pub struct MockBackend {
    streaming: bool,
    chunk_delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<BackendRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启用流式输出，每条结果之间间隔 `chunk_delay`
    pub fn streaming(chunk_delay: Duration) -> Self {
        Self {
            streaming: true,
            chunk_delay,
            ..Self::default()
        }
    }

    /// 生成单条译文
    pub fn render(text: &str, request: &BackendRequest) -> String {
        let mut translated = text.trim().to_string();
        for (source, target) in &request.options.glossary {
            translated = translated.replace(source.as_str(), target.as_str());
        }
        format!("[{}] {}", request.target_lang, translated)
    }

    /// 后端被调用的总次数（批量与流式合计）
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 已收到的全部请求
    pub fn requests(&self) -> Vec<BackendRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, request: &BackendRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn translate(&self, request: &BackendRequest) -> TranslationResult<Vec<String>> {
        self.record(request);
        Ok(request
            .texts
            .iter()
            .map(|text| Self::render(text, request))
            .collect())
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn translate_stream(
        &self,
        request: &BackendRequest,
    ) -> TranslationResult<BoxStream<'static, TranslationResult<StreamChunk>>> {
        self.record(request);
        let delay = self.chunk_delay;
        let chunks: Vec<StreamChunk> = request
            .texts
            .iter()
            .enumerate()
            .map(|(index, text)| StreamChunk {
                index,
                translation: Self::render(text, request),
            })
            .collect();

        Ok(stream::iter(chunks)
            .then(move |chunk| async move {
                tokio::time::sleep(delay).await;
                Ok(chunk)
            })
            .boxed())
    }
}
