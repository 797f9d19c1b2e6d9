//! 流式交付模块
//!
//! 缓存命中的结果立即逐条交付；未命中的文本交给后端的流式接口。初始缓冲窗口内到达的
//! 结果先缓存在内存中，窗口结束时合并为一个批次事件交付，此后每个结果到达即交付。
//! 每个结果到达时立即写入缓存，中途中断也能保留已完成的部分。
//!
//! 后端流在交付全部条目之前结束时，以 `MalformedResponse` 错误结束本次交付。
//!
//! 后端不支持流式输出时退化为一次批量解析，整个结果作为一个批次事件交付。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

use super::batch::{BatchResolver, CacheLookup};
use super::fingerprint::{Fingerprint, TranslatableItem};
use crate::translation::config::constants;
use crate::translation::error::helpers::malformed;
use crate::translation::error::TranslationResult;

/// 交付阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPhase {
    /// 缓冲窗口内，结果暂存
    Buffering,
    /// 窗口结束后，结果到达即交付
    Immediate,
}

/// 单条交付结果，`index` 为条目在提交列表中的位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedTranslation {
    pub index: usize,
    pub translation: String,
    pub cached: bool,
}

/// 流式事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Item(StreamedTranslation),
    Batch(Vec<StreamedTranslation>),
}

impl StreamEvent {
    /// 展开为单条结果
    pub fn into_translations(self) -> Vec<StreamedTranslation> {
        match self {
            StreamEvent::Item(item) => vec![item],
            StreamEvent::Batch(items) => items,
        }
    }
}

type EventSender = mpsc::Sender<TranslationResult<StreamEvent>>;

/// 渐进式交付
#[derive(Clone)]
pub struct StreamingDelivery {
    resolver: Arc<BatchResolver>,
    buffer_window: Duration,
    channel_capacity: usize,
}

impl StreamingDelivery {
    pub fn new(resolver: Arc<BatchResolver>) -> Self {
        Self::with_buffer_window(
            resolver,
            Duration::from_millis(constants::DEFAULT_STREAM_BUFFER_MS),
        )
    }

    pub fn with_buffer_window(resolver: Arc<BatchResolver>, buffer_window: Duration) -> Self {
        Self {
            resolver,
            buffer_window,
            channel_capacity: constants::STREAM_CHANNEL_CAPACITY,
        }
    }

    pub fn buffer_window(&self) -> Duration {
        self.buffer_window
    }

    /// 开始流式翻译
    ///
    /// 生产者在独立任务中运行，必须在 tokio 运行时内调用。丢弃返回的流会让生产者停止
    /// 写缓存并释放后端连接。
    pub fn stream(
        &self,
        items: Vec<TranslatableItem>,
        target_lang: &str,
    ) -> BoxStream<'static, TranslationResult<StreamEvent>> {
        let (tx, rx) = mpsc::channel(self.channel_capacity.max(1));
        let producer = Producer {
            resolver: Arc::clone(&self.resolver),
            target_lang: target_lang.to_string(),
            buffer_window: self.buffer_window,
            tx,
        };
        tokio::spawn(producer.run(items));

        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|event| (event, rx)) }).boxed()
    }
}

struct Producer {
    resolver: Arc<BatchResolver>,
    target_lang: String,
    buffer_window: Duration,
    tx: EventSender,
}

impl Producer {
    async fn run(self, items: Vec<TranslatableItem>) {
        if items.is_empty() {
            return;
        }

        let mut positions: HashMap<Fingerprint, Vec<usize>> = HashMap::new();
        for (index, item) in items.iter().enumerate() {
            positions.entry(item.fingerprint().clone()).or_default().push(index);
        }

        let lookup = self.resolver.lookup(&items, &self.target_lang).await;

        if self.resolver.backend().supports_streaming() {
            self.run_streaming(lookup, &positions).await;
        } else {
            self.run_fallback(lookup, &positions).await;
        }
    }

    async fn send(&self, event: TranslationResult<StreamEvent>) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// 后端不支持流式输出：一次批量解析，结果作为单个批次交付
    async fn run_fallback(&self, lookup: CacheLookup, positions: &HashMap<Fingerprint, Vec<usize>>) {
        let cached: HashSet<Fingerprint> = lookup.hits.iter().map(|(fp, _)| fp.clone()).collect();

        if self.tx.is_closed() {
            return;
        }
        // 消费者断开时放弃解析，后端调用之后的缓存写入也随之取消
        let resolved = tokio::select! {
            resolved = self.resolver.complete(lookup, &self.target_lang) => resolved,
            _ = self.tx.closed() => {
                tracing::debug!("流式消费者已断开，放弃批量解析");
                return;
            }
        };
        let (translations, error) = match resolved {
            Ok(outcome) => (outcome.translations, None),
            Err(failure) => (failure.cached, Some(failure.error)),
        };

        let mut batch: Vec<StreamedTranslation> = translations
            .into_iter()
            .flat_map(|(fp, translation)| {
                let is_cached = cached.contains(&fp);
                positions
                    .get(&fp)
                    .into_iter()
                    .flatten()
                    .map(move |&index| StreamedTranslation {
                        index,
                        translation: translation.clone(),
                        cached: is_cached,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        batch.sort_by_key(|t| t.index);

        if !batch.is_empty() && !self.send(Ok(StreamEvent::Batch(batch))).await {
            return;
        }
        if let Some(error) = error {
            self.send(Err(error)).await;
        }
    }

    async fn run_streaming(&self, lookup: CacheLookup, positions: &HashMap<Fingerprint, Vec<usize>>) {
        // 命中的结果在任何后端调用之前交付
        let hits = lookup.hits.into_iter().map(|fp_t| (fp_t, true));
        let blanks = lookup.blanks.into_iter().map(|fp| ((fp, String::new()), false));
        for ((fp, translation), cached) in hits.chain(blanks) {
            for &index in positions.get(&fp).into_iter().flatten() {
                let item = StreamedTranslation {
                    index,
                    translation: translation.clone(),
                    cached,
                };
                if !self.send(Ok(StreamEvent::Item(item))).await {
                    return;
                }
            }
        }

        let misses = lookup.misses;
        if misses.is_empty() || self.tx.is_closed() {
            return;
        }

        let request = self.resolver.request(&misses, &self.target_lang);
        let backend = self.resolver.backend();
        metrics::counter!("jit_backend_requests_total").increment(1);
        tracing::debug!("打开流式翻译 {}: {} 条 ({})", backend.name(), misses.len(), self.target_lang);

        let mut chunks = match backend.translate_stream(&request).await {
            Ok(chunks) => chunks,
            Err(e) => {
                metrics::counter!("jit_backend_failures_total").increment(1);
                tracing::error!("后端 {} 流式翻译失败: {}", backend.name(), e);
                self.send(Err(e)).await;
                return;
            }
        };

        let mut phase = DeliveryPhase::Buffering;
        let mut buffered: Vec<StreamedTranslation> = Vec::new();
        let mut delivered: HashSet<usize> = HashSet::new();
        let window = tokio::time::sleep(self.buffer_window);
        tokio::pin!(window);

        loop {
            tokio::select! {
                _ = &mut window, if phase == DeliveryPhase::Buffering => {
                    phase = DeliveryPhase::Immediate;
                    tracing::debug!("缓冲窗口结束，交付 {} 条缓冲结果", buffered.len());
                    if !buffered.is_empty()
                        && !self.send(Ok(StreamEvent::Batch(std::mem::take(&mut buffered)))).await
                    {
                        return;
                    }
                }
                next = chunks.next() => match next {
                    Some(Ok(chunk)) => {
                        let Some(item) = misses.get(chunk.index) else {
                            tracing::warn!("流式结果索引越界: {} (共 {} 条)", chunk.index, misses.len());
                            continue;
                        };
                        if !delivered.insert(chunk.index) {
                            tracing::warn!("忽略重复的流式结果: {}", chunk.index);
                            continue;
                        }
                        if self.tx.is_closed() {
                            return;
                        }
                        self.resolver
                            .store(item.fingerprint(), &self.target_lang, &chunk.translation)
                            .await;

                        let results = positions
                            .get(item.fingerprint())
                            .into_iter()
                            .flatten()
                            .map(|&index| StreamedTranslation {
                                index,
                                translation: chunk.translation.clone(),
                                cached: false,
                            });
                        match phase {
                            DeliveryPhase::Buffering => buffered.extend(results),
                            DeliveryPhase::Immediate => {
                                for result in results {
                                    if !self.send(Ok(StreamEvent::Item(result))).await {
                                        return;
                                    }
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        metrics::counter!("jit_backend_failures_total").increment(1);
                        tracing::error!("流式翻译中断: {}", e);
                        if !buffered.is_empty()
                            && !self.send(Ok(StreamEvent::Batch(std::mem::take(&mut buffered)))).await
                        {
                            return;
                        }
                        self.send(Err(e)).await;
                        return;
                    }
                    None => {
                        // 后端在窗口结束前完成时不再等待窗口
                        if !buffered.is_empty()
                            && !self.send(Ok(StreamEvent::Batch(std::mem::take(&mut buffered)))).await
                        {
                            return;
                        }
                        if delivered.len() < misses.len() {
                            let missing = misses.len() - delivered.len();
                            metrics::counter!("jit_backend_failures_total").increment(1);
                            tracing::warn!("流式翻译结束，{} 条未返回结果", missing);
                            self.send(Err(malformed(format!(
                                "流式结果不完整: 期望 {} 条，收到 {} 条",
                                misses.len(),
                                delivered.len()
                            ))))
                            .await;
                        }
                        return;
                    }
                },
                _ = self.tx.closed() => {
                    tracing::debug!("流式消费者已断开，停止翻译");
                    return;
                }
            }
        }
    }
}
