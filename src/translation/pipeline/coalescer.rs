//! 请求合并模块
//!
//! 单条文本的翻译请求先进入队列，第一个请求启动固定延迟的计时器，计时器触发时整个
//! 队列被原子地换出并按目标语言分组，每组调用一次批量解析。
//!
//! - 计时器不会因后续请求而重置，等待时间有上界
//! - 换出队列后新的请求立即开始下一轮，不会等待正在进行的刷新
//! - 各语言分组并发执行，一组失败不影响其他分组

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::oneshot;

use super::batch::BatchResolver;
use super::fingerprint::{Fingerprint, TranslatableItem};
use crate::translation::config::constants;
use crate::translation::error::helpers::log_error;
use crate::translation::error::{TranslationError, TranslationResult};

/// 排队中的请求，完成句柄只能使用一次
struct QueuedItem {
    item: TranslatableItem,
    target_lang: Option<String>,
    completion: oneshot::Sender<TranslationResult<String>>,
}

#[derive(Default)]
struct CoalescerState {
    queue: Vec<QueuedItem>,
    timer_armed: bool,
}

struct Inner {
    resolver: Arc<BatchResolver>,
    default_lang: String,
    delay: Duration,
    state: Mutex<CoalescerState>,
    flushes: AtomicU64,
}

/// 去抖动的微批次队列
#[derive(Clone)]
pub struct RequestCoalescer {
    inner: Arc<Inner>,
}

impl RequestCoalescer {
    pub fn new(resolver: Arc<BatchResolver>, default_lang: impl Into<String>) -> Self {
        Self::with_delay(
            resolver,
            default_lang,
            Duration::from_millis(constants::DEFAULT_COALESCE_DELAY_MS),
        )
    }

    pub fn with_delay(resolver: Arc<BatchResolver>, default_lang: impl Into<String>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                resolver,
                default_lang: default_lang.into(),
                delay,
                state: Mutex::new(CoalescerState::default()),
                flushes: AtomicU64::new(0),
            }),
        }
    }

    /// 提交一条文本，等待所在批次完成后返回译文
    ///
    /// `target_lang` 为空时使用默认目标语言。空白文本不进入队列，原样返回。
    pub async fn enqueue(&self, text: impl Into<String>, target_lang: Option<&str>) -> TranslationResult<String> {
        let text = text.into();
        if text.trim().is_empty() {
            return Ok(text);
        }

        let (completion, receiver) = oneshot::channel();
        let queued = QueuedItem {
            item: TranslatableItem::new(text),
            target_lang: target_lang.map(str::to_string),
            completion,
        };

        if self.inner.push(queued) {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                tokio::time::sleep(inner.delay).await;
                let batch = inner.take();
                inner.flush(batch).await;
            });
        }

        receiver
            .await
            .unwrap_or_else(|_| Err(TranslationError::Cancelled("合并队列在完成前被丢弃".to_string())))
    }

    /// 当前排队的请求数
    pub fn pending(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// 已完成的刷新次数
    pub fn flush_count(&self) -> u64 {
        self.inner.flushes.load(Ordering::SeqCst)
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CoalescerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 入队，返回是否需要启动计时器
    fn push(&self, queued: QueuedItem) -> bool {
        let mut state = self.lock();
        state.queue.push(queued);
        if state.timer_armed {
            false
        } else {
            state.timer_armed = true;
            true
        }
    }

    /// 计时器触发：换出队列并清除计时器标记
    fn take(&self) -> Vec<QueuedItem> {
        let mut state = self.lock();
        state.timer_armed = false;
        std::mem::take(&mut state.queue)
    }

    async fn flush(&self, batch: Vec<QueuedItem>) {
        if batch.is_empty() {
            return;
        }
        self.flushes.fetch_add(1, Ordering::SeqCst);

        let mut groups: BTreeMap<String, Vec<QueuedItem>> = BTreeMap::new();
        for queued in batch {
            let lang = queued
                .target_lang
                .clone()
                .unwrap_or_else(|| self.default_lang.clone());
            groups.entry(lang).or_default().push(queued);
        }

        tracing::debug!("刷新合并队列: {} 个语言分组", groups.len());
        join_all(
            groups
                .into_iter()
                .map(|(lang, queued)| self.flush_group(lang, queued)),
        )
        .await;
    }

    async fn flush_group(&self, lang: String, queued: Vec<QueuedItem>) {
        let mut seen = HashSet::new();
        let unique: Vec<TranslatableItem> = queued
            .iter()
            .filter(|q| seen.insert(q.item.fingerprint().clone()))
            .map(|q| q.item.clone())
            .collect();

        match self.resolver.resolve_batch(&unique, &lang).await {
            Ok(outcome) => settle(queued, &outcome.translations),
            Err(failure) => {
                tracing::debug!("语言分组 {} 翻译失败", lang);
                log_error(&failure.error);
                for q in queued {
                    let result = match failure.cached.get(q.item.fingerprint()) {
                        Some(translation) => Ok(translation.clone()),
                        None => Err(failure.error.clone()),
                    };
                    let _ = q.completion.send(result);
                }
            }
        }
    }
}

/// 按指纹分发译文，结果中缺失的指纹退回原文
fn settle(queued: Vec<QueuedItem>, translations: &HashMap<Fingerprint, String>) {
    for q in queued {
        let translation = translations
            .get(q.item.fingerprint())
            .cloned()
            .unwrap_or_else(|| q.item.text().to_string());
        let _ = q.completion.send(Ok(translation));
    }
}
