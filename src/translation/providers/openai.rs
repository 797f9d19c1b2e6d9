//! OpenAI 兼容后端
//!
//! 批量模式要求模型返回与输入等长的 JSON 字符串数组；流式模式要求模型每行输出一个
//! `{"index": n, "translation": "..."}` 对象，通过 SSE 增量返回。

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;

use super::{BackendRequest, StreamChunk, TranslationBackend};
use crate::translation::config::{constants, ProviderSettings};
use crate::translation::error::helpers::malformed;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::languages;

/// 可重试错误的最大重试次数
const MAX_RETRIES: u32 = 2;

/// OpenAI chat/completions 客户端
pub struct OpenAiBackend {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAiBackend {
    pub fn from_settings(settings: &ProviderSettings) -> TranslationResult<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(settings.timeout())
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("创建HTTP客户端失败: {}", e)))?;

        if settings.api_key.is_none() {
            tracing::warn!("OpenAI 后端未配置 API 密钥，仅适用于无需认证的兼容服务");
        }

        Ok(Self {
            http,
            api_key: settings.api_key.clone(),
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| constants::DEFAULT_OPENAI_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| constants::DEFAULT_OPENAI_MODEL.to_string()),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body(&self, request: &BackendRequest, stream: bool) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": build_system_prompt(request, stream)},
                {"role": "user", "content": build_user_prompt(request)},
            ],
            "temperature": 0.1,
            "stream": stream,
        })
    }

    /// 发送请求，对可重试错误做指数退避
    async fn send_with_retry(&self, body: &serde_json::Value) -> TranslationResult<reqwest::Response> {
        let mut attempt: u32 = 0;
        loop {
            let result = self.send_once(body).await;
            match result {
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    let wait = Duration::from_millis(500 * (1 << attempt));
                    tracing::warn!(attempt, wait_ms = wait.as_millis() as u64, "后端请求失败，准备重试: {}", e);
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn send_once(&self, body: &serde_json::Value) -> TranslationResult<reqwest::Response> {
        let mut builder = self.http.post(self.endpoint()).json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status.as_u16() == 429 {
            return Err(TranslationError::RateLimitExceeded);
        }

        let body_text = response.text().await.unwrap_or_default();
        Err(TranslationError::ApiError {
            status: status.as_u16(),
            message: body_text.chars().take(200).collect(),
        })
    }
}

#[async_trait]
impl TranslationBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn translate(&self, request: &BackendRequest) -> TranslationResult<Vec<String>> {
        let body = self.request_body(request, false);
        let response = self.send_with_retry(&body).await?;
        let completion: Completion = response.json().await?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TranslationError::MalformedResponse("响应中没有内容".to_string()))?;

        parse_translation_array(&content, request.texts.len())
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn translate_stream(
        &self,
        request: &BackendRequest,
    ) -> TranslationResult<BoxStream<'static, TranslationResult<StreamChunk>>> {
        let body = self.request_body(request, true);
        let response = self.send_with_retry(&body).await?;
        Ok(sse_chunks(response.bytes_stream().boxed()).boxed())
    }
}

fn build_system_prompt(request: &BackendRequest, stream: bool) -> String {
    let target = languages::language_info(&request.target_lang)
        .map(|info| info.name)
        .unwrap_or(request.target_lang.as_str());

    let mut prompt = format!(
        "You are a translation engine. Translate every input string from {} into {}.\n\
         Keep leading/trailing punctuation, placeholders and inline markup unchanged.\n",
        request.source_lang, target
    );

    let options = &request.options;
    if let Some(style) = options.style {
        prompt.push_str(&format!("Use a {} tone.\n", style));
    }
    if let Some(context) = &options.context {
        prompt.push_str(&format!("Context: {}\n", context));
    }
    if !options.excluded_terms.is_empty() {
        prompt.push_str(&format!(
            "Never translate these terms: {}\n",
            options.excluded_terms.join(", ")
        ));
    }
    if !options.glossary.is_empty() {
        prompt.push_str("Always use these translations:\n");
        for (source, target) in &options.glossary {
            prompt.push_str(&format!("- {} => {}\n", source, target));
        }
    }

    if stream {
        prompt.push_str(
            "Output one JSON object per line, in any order, exactly of the form \
             {\"index\": <input position>, \"translation\": \"...\"}. Output nothing else.",
        );
    } else {
        prompt.push_str(
            "Return only a JSON array of strings with exactly as many elements as the input, \
             in the same order.",
        );
    }
    prompt
}

fn build_user_prompt(request: &BackendRequest) -> String {
    serde_json::to_string(&request.texts).unwrap_or_default()
}

/// 去掉模型常见的 Markdown 代码块包裹
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().trim_end_matches("```").trim()
}

/// 解析 JSON 数组响应并校验长度
fn parse_translation_array(content: &str, expected: usize) -> TranslationResult<Vec<String>> {
    let translations: Vec<String> = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| malformed(format!("不是字符串数组: {}", e)))?;

    if translations.len() != expected {
        return Err(malformed(format!(
            "期望 {} 条译文，实际返回 {} 条",
            expected,
            translations.len()
        )));
    }
    Ok(translations)
}

#[derive(Debug, Deserialize)]
struct Completion {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SseChunk {
    choices: Vec<SseChoice>,
}

#[derive(Debug, Deserialize)]
struct SseChoice {
    delta: SseDelta,
}

#[derive(Debug, Deserialize)]
struct SseDelta {
    content: Option<String>,
}

/// SSE 解码器
///
/// 字节可能在任意位置被切断（包括 UTF-8 字符中间），所以先按字节缓冲完整的 SSE 行，
/// 再把 delta 内容拼接后按行解析结果对象。
#[derive(Debug, Default)]
struct SseDecoder {
    raw: Vec<u8>,
    content: String,
}

impl SseDecoder {
    fn feed(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        self.raw.extend_from_slice(bytes);
        while let Some(pos) = self.raw.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.raw.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            self.handle_sse_line(line.trim());
        }
        self.take_complete_lines()
    }

    fn finish(&mut self) -> Vec<StreamChunk> {
        if !self.raw.is_empty() {
            let line = String::from_utf8_lossy(&std::mem::take(&mut self.raw)).into_owned();
            self.handle_sse_line(line.trim());
        }
        let mut chunks = self.take_complete_lines();
        let rest = std::mem::take(&mut self.content);
        chunks.extend(parse_result_line(&rest));
        chunks
    }

    fn handle_sse_line(&mut self, line: &str) {
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return;
        }
        match serde_json::from_str::<SseChunk>(data) {
            Ok(parsed) => {
                if let Some(content) = parsed.choices.into_iter().next().and_then(|c| c.delta.content) {
                    self.content.push_str(&content);
                }
            }
            Err(e) => tracing::debug!("忽略无法解析的SSE事件: {}", e),
        }
    }

    fn take_complete_lines(&mut self) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();
        while let Some(pos) = self.content.find('\n') {
            let line: String = self.content.drain(..=pos).collect();
            chunks.extend(parse_result_line(&line));
        }
        chunks
    }
}

fn parse_result_line(line: &str) -> Option<StreamChunk> {
    let line = line.trim().trim_end_matches(',');
    if line.is_empty() || line.starts_with("```") {
        return None;
    }
    match serde_json::from_str::<StreamChunk>(line) {
        Ok(chunk) => Some(chunk),
        Err(_) => {
            tracing::debug!("跳过无法解析的流式结果行: {}", line);
            None
        }
    }
}

struct SseState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: std::collections::VecDeque<StreamChunk>,
    done: bool,
}

/// 把字节流转换为结果流
fn sse_chunks<S, B>(bytes: S) -> impl Stream<Item = TranslationResult<StreamChunk>> + Send + 'static
where
    S: Stream<Item = reqwest::Result<B>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        bytes,
        decoder: SseDecoder::default(),
        pending: Default::default(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(chunk) = state.pending.pop_front() {
                return Some((Ok(chunk), state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    let chunks = state.decoder.feed(bytes.as_ref());
                    state.pending.extend(chunks);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(TranslationError::from(e)), state));
                }
                None => {
                    let chunks = state.decoder.finish();
                    state.pending.extend(chunks);
                    state.done = true;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::translation::providers::{TranslationOptions, TranslationStyle};

    fn sse_event(content: &str) -> String {
        format!(
            "data: {}\n\n",
            json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    #[test]
    fn test_parse_array_checks_length() {
        assert_eq!(
            parse_translation_array("[\"Hola\", \"Mundo\"]", 2).unwrap(),
            vec!["Hola", "Mundo"]
        );
        let err = parse_translation_array("[\"Hola\"]", 2).unwrap_err();
        assert!(matches!(err, TranslationError::MalformedResponse(_)));
        let err = parse_translation_array("{\"text\": \"Hola\"}", 1).unwrap_err();
        assert!(matches!(err, TranslationError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_array_strips_code_fence() {
        let content = "```json\n[\"Bonjour\"]\n```";
        assert_eq!(parse_translation_array(content, 1).unwrap(), vec!["Bonjour"]);
    }

    #[test]
    fn test_decoder_handles_split_events() {
        let mut decoder = SseDecoder::default();
        let payload = format!(
            "{}{}{}data: [DONE]\n\n",
            sse_event("{\"index\": 1, \"transla"),
            sse_event("tion\": \"Mundo\"}\n{\"index\": 0,"),
            sse_event(" \"translation\": \"Hola ñ\"}"),
        );
        let bytes = payload.as_bytes();
        // 在 'ñ' 的两个字节之间切断
        let cut = payload.find('ñ').unwrap() + 1;

        let mut chunks = decoder.feed(&bytes[..cut]);
        chunks.extend(decoder.feed(&bytes[cut..]));
        chunks.extend(decoder.finish());

        assert_eq!(
            chunks,
            vec![
                StreamChunk { index: 1, translation: "Mundo".to_string() },
                StreamChunk { index: 0, translation: "Hola ñ".to_string() },
            ]
        );
    }

    #[tokio::test]
    async fn test_sse_stream_yields_chunks() {
        let body = sse_event("{\"index\": 0, \"translation\": \"Hallo\"}\n");
        let bytes = stream::iter(vec![Ok::<_, reqwest::Error>(body.into_bytes())]);
        let chunks: Vec<_> = sse_chunks(bytes).collect().await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap().translation, "Hallo");
    }

    #[test]
    fn test_system_prompt_includes_options() {
        let mut options = TranslationOptions {
            excluded_terms: vec!["Acme".to_string()],
            context: Some("Checkout page".to_string()),
            style: Some(TranslationStyle::Formal),
            ..TranslationOptions::default()
        };
        options.glossary.insert("cart".to_string(), "carrito".to_string());
        let request = BackendRequest {
            texts: vec!["Add to cart".to_string()],
            source_lang: "en".to_string(),
            target_lang: "es".to_string(),
            options: Arc::new(options),
        };

        let prompt = build_system_prompt(&request, false);
        assert!(prompt.contains("into Spanish"));
        assert!(prompt.contains("formal"));
        assert!(prompt.contains("Checkout page"));
        assert!(prompt.contains("Acme"));
        assert!(prompt.contains("cart => carrito"));
        assert!(prompt.contains("JSON array"));
        assert!(build_system_prompt(&request, true).contains("\"index\""));
    }

    #[test]
    fn test_settings_defaults() {
        let backend = OpenAiBackend::from_settings(&ProviderSettings {
            provider_type: "openai".to_string(),
            base_url: Some("http://localhost:8080/v1/".to_string()),
            ..ProviderSettings::default()
        })
        .unwrap();
        assert_eq!(backend.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(backend.model, constants::DEFAULT_OPENAI_MODEL);
        assert!(backend.supports_streaming());
    }
}
