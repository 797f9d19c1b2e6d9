//! DeepLX 后端
//!
//! DeepLX 每次只接受一条扁平字符串，没有结构化上下文字段，也不支持流式输出。
//! 上下文以标记前缀的方式内联在原文前面，返回后用正则去掉。

use std::sync::OnceLock;

use async_trait::async_trait;
use futures::future::try_join_all;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{BackendRequest, TranslationBackend};
use crate::translation::config::{constants, ProviderSettings};
use crate::translation::error::{TranslationError, TranslationResult};

/// DeepLX 客户端
pub struct DeepLxBackend {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeepLxRequest<'a> {
    text: &'a str,
    source_lang: String,
    target_lang: String,
}

#[derive(Debug, Deserialize)]
struct DeepLxResponse {
    code: u16,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl DeepLxBackend {
    pub fn from_settings(settings: &ProviderSettings) -> TranslationResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self {
            http,
            api_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| constants::DEFAULT_DEEPLX_URL.to_string()),
            api_key: settings.api_key.clone(),
        })
    }

    async fn translate_one(&self, text: &str, request: &BackendRequest) -> TranslationResult<String> {
        let payload = match &request.options.context {
            Some(context) => inline_context(context, text),
            None => text.to_string(),
        };

        let body = DeepLxRequest {
            text: &payload,
            source_lang: request.source_lang.to_uppercase(),
            target_lang: request.target_lang.to_uppercase(),
        };

        let mut builder = self.http.post(&self.api_url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if status.as_u16() == 429 {
            return Err(TranslationError::RateLimitExceeded);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TranslationError::ApiError {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let parsed: DeepLxResponse = response.json().await?;
        if parsed.code != 200 {
            return Err(TranslationError::ApiError {
                status: parsed.code,
                message: parsed.message.unwrap_or_default(),
            });
        }

        let translated = parsed
            .data
            .ok_or_else(|| TranslationError::MalformedResponse("响应缺少 data 字段".to_string()))?;

        Ok(match request.options.context {
            Some(_) => strip_context(&translated),
            None => translated,
        })
    }
}

#[async_trait]
impl TranslationBackend for DeepLxBackend {
    fn name(&self) -> &str {
        "deeplx"
    }

    async fn translate(&self, request: &BackendRequest) -> TranslationResult<Vec<String>> {
        if !request.options.glossary.is_empty() || !request.options.excluded_terms.is_empty() {
            tracing::debug!("DeepLX 不支持术语表和排除术语，已忽略");
        }

        try_join_all(request.texts.iter().map(|text| self.translate_one(text, request))).await
    }
}

/// 上下文标记，例如 `[[ctx: Checkout page]]`
fn inline_context(context: &str, text: &str) -> String {
    format!("[[ctx: {}]] {}", context.replace(']', ")"), text)
}

/// 匹配翻译后的上下文标记：译者可能改写关键字、空格或把方括号换成全角
fn context_marker() -> Option<&'static Regex> {
    static MARKER: OnceLock<Option<Regex>> = OnceLock::new();
    MARKER
        .get_or_init(|| Regex::new(r"(?s)^\s*[\[［【]{1,2}[^\]］】]*[\]］】]{1,2}\s*").ok())
        .as_ref()
}

fn strip_context(translated: &str) -> String {
    match context_marker() {
        Some(marker) => marker.replace(translated, "").into_owned(),
        None => translated.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_roundtrip() {
        let inlined = inline_context("Checkout page", "Pay now");
        assert_eq!(inlined, "[[ctx: Checkout page]] Pay now");
        assert_eq!(strip_context(&inlined), "Pay now");
    }

    #[test]
    fn test_strip_tolerates_translated_marker() {
        assert_eq!(strip_context("[[contexto: Página de pago]] Pagar ahora"), "Pagar ahora");
        assert_eq!(strip_context("【【上下文：结账页面】】 立即付款"), "立即付款");
        assert_eq!(strip_context("  [[ ctx : x ]]\nHola"), "Hola");
    }

    #[test]
    fn test_strip_leaves_plain_text_alone() {
        assert_eq!(strip_context("Pagar ahora [1]"), "Pagar ahora [1]");
    }

    #[test]
    fn test_brackets_in_context_are_neutralized() {
        let inlined = inline_context("a]] b", "x");
        assert_eq!(strip_context(&inlined), "x");
    }

    #[test]
    fn test_settings_defaults() {
        let backend = DeepLxBackend::from_settings(&ProviderSettings {
            provider_type: "deeplx".to_string(),
            ..ProviderSettings::default()
        })
        .unwrap();
        assert_eq!(backend.api_url, constants::DEFAULT_DEEPLX_URL);
        assert!(!backend.supports_streaming());
    }
}
