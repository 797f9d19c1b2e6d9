//! 流式交付集成测试

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use jit_translator::translation::providers::MockBackend;
use jit_translator::translation::storage::CacheStore;
use jit_translator::translation::{
    Fingerprint, StreamEvent, StreamedTranslation, StreamingDelivery, TranslationError, TranslationResult,
};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{items, resolver_with, BrokenStreamBackend, SlowBackend};

fn item(index: usize, translation: &str, cached: bool) -> StreamedTranslation {
    StreamedTranslation {
        index,
        translation: translation.to_string(),
        cached,
    }
}

async fn collect_events(
    stream: futures::stream::BoxStream<'static, TranslationResult<StreamEvent>>,
) -> Vec<TranslationResult<StreamEvent>> {
    stream.collect().await
}

/// 窗口内到达的结果合并为一个批次，之后逐条交付
#[tokio::test(start_paused = true)]
async fn test_buffer_window_then_immediate() {
    let backend = Arc::new(MockBackend::streaming(Duration::from_millis(400)));
    let (resolver, cache) = resolver_with(backend.clone());
    let delivery = StreamingDelivery::with_buffer_window(resolver, Duration::from_secs(1));

    let events: Vec<StreamEvent> = collect_events(delivery.stream(items(&["A1", "B2", "C3", "D4"]), "fr"))
        .await
        .into_iter()
        .map(|e| e.expect("stream should not fail"))
        .collect();

    assert_eq!(
        events,
        vec![
            StreamEvent::Batch(vec![item(0, "[fr] A1", false), item(1, "[fr] B2", false)]),
            StreamEvent::Item(item(2, "[fr] C3", false)),
            StreamEvent::Item(item(3, "[fr] D4", false)),
        ]
    );
    assert_eq!(backend.call_count(), 1);
    assert_eq!(cache.len(), 4);

    println!("✅ Buffer window test passed");
}

/// 全部命中缓存时不打开后端流
#[tokio::test(start_paused = true)]
async fn test_all_cached_skips_backend() {
    let backend = Arc::new(MockBackend::streaming(Duration::from_millis(10)));
    let (resolver, cache) = resolver_with(backend.clone());
    cache.set(&Fingerprint::of("Yes").cache_key("el"), "Ναι").await;
    cache.set(&Fingerprint::of("No").cache_key("el"), "Όχι").await;
    let delivery = StreamingDelivery::new(resolver);

    let events: Vec<StreamEvent> = collect_events(delivery.stream(items(&["Yes", "No", "Yes"]), "el"))
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let mut delivered: Vec<StreamedTranslation> =
        events.into_iter().flat_map(StreamEvent::into_translations).collect();
    delivered.sort_by_key(|t| t.index);
    assert_eq!(
        delivered,
        vec![item(0, "Ναι", true), item(1, "Όχι", true), item(2, "Ναι", true)]
    );
    assert_eq!(backend.call_count(), 0);
}

/// 每个结果到达即写入缓存，中断后已完成的部分仍保留
#[tokio::test(start_paused = true)]
async fn test_interrupted_stream_keeps_partial_results() {
    let backend = Arc::new(BrokenStreamBackend {
        succeed: 2,
        chunk_delay: Duration::from_millis(100),
        ends_with_error: true,
    });
    let (resolver, cache) = resolver_with(backend);
    let delivery = StreamingDelivery::with_buffer_window(resolver, Duration::from_millis(150));

    let events = collect_events(delivery.stream(items(&["One", "Two", "Three"]), "cs")).await;

    assert_eq!(events.len(), 3);
    assert_eq!(events[0], Ok(StreamEvent::Batch(vec![item(0, "[cs] One", false)])));
    assert_eq!(events[1], Ok(StreamEvent::Item(item(1, "[cs] Two", false))));
    assert!(matches!(events[2], Err(TranslationError::NetworkError(_))));

    assert_eq!(cache.len(), 2);
    assert!(cache.lookup(&Fingerprint::of("Three").cache_key("cs")).is_none());
}

/// 不支持流式的后端退化为单个批次
#[tokio::test(start_paused = true)]
async fn test_non_streaming_backend_yields_single_batch() {
    let backend = Arc::new(MockBackend::new());
    let (resolver, cache) = resolver_with(backend.clone());
    cache.set(&Fingerprint::of("Cached").cache_key("tr"), "Önbellek").await;
    let delivery = StreamingDelivery::new(resolver);

    let events = collect_events(delivery.stream(items(&["Fresh", "Cached"]), "tr")).await;

    assert_eq!(
        events,
        vec![Ok(StreamEvent::Batch(vec![
            item(0, "[tr] Fresh", false),
            item(1, "Önbellek", true),
        ]))]
    );
    assert_eq!(backend.call_count(), 1);
}

/// 消费者提前丢弃流后生产者停止
#[tokio::test(start_paused = true)]
async fn test_dropped_consumer_stops_producer() {
    let backend = Arc::new(MockBackend::streaming(Duration::from_millis(100)));
    let (resolver, cache) = resolver_with(backend.clone());
    let delivery = StreamingDelivery::with_buffer_window(resolver, Duration::ZERO);
    let texts: Vec<String> = (0..20).map(|i| format!("Line {}", i)).collect();
    let batch = items(&texts.iter().map(String::as_str).collect::<Vec<_>>());

    let mut stream = delivery.stream(batch, "hu");
    let first = stream.next().await.expect("first event").expect("first result");
    assert_eq!(first, StreamEvent::Item(item(0, "[hu] Line 0", false)));
    drop(stream);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(cache.len() < 20, "producer kept translating after the consumer left");
}

/// 后端流提前结束，缺少的条目以错误告知消费者
#[tokio::test(start_paused = true)]
async fn test_truncated_stream_surfaces_error() {
    let backend = Arc::new(BrokenStreamBackend {
        succeed: 1,
        chunk_delay: Duration::from_millis(10),
        ends_with_error: false,
    });
    let (resolver, cache) = resolver_with(backend);
    let delivery = StreamingDelivery::with_buffer_window(resolver, Duration::from_secs(1));

    let events = collect_events(delivery.stream(items(&["Red", "Green", "Blue"]), "sv")).await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], Ok(StreamEvent::Batch(vec![item(0, "[sv] Red", false)])));
    assert!(matches!(events[1], Err(TranslationError::MalformedResponse(_))));
    assert_eq!(cache.len(), 1);

    println!("✅ Truncated stream test passed");
}

/// 不支持流式的后端：消费者在解析开始前离开，不调用后端
#[tokio::test(start_paused = true)]
async fn test_dropped_consumer_skips_batch_fallback() {
    let backend = Arc::new(MockBackend::new());
    let (resolver, cache) = resolver_with(backend.clone());
    let delivery = StreamingDelivery::new(resolver);

    drop(delivery.stream(items(&["Alpha", "Beta"]), "de"));
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(backend.call_count(), 0);
    assert!(cache.is_empty());
}

/// 不支持流式的后端：消费者在后端调用期间离开，结果不写入缓存
#[tokio::test(start_paused = true)]
async fn test_dropped_consumer_cancels_pending_batch() {
    let backend = Arc::new(SlowBackend::new(Duration::from_millis(500)));
    let (resolver, cache) = resolver_with(backend.clone());
    let delivery = StreamingDelivery::new(resolver);

    let stream = delivery.stream(items(&["Alpha", "Beta"]), "de");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.call_count(), 1);

    drop(stream);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(cache.is_empty());
}
