//! 翻译后端模块
//!
//! 定义翻译后端的统一能力接口 [`TranslationBackend`]，以及根据类型标签选择具体实现的
//! 封闭变体 [`ProviderKind`]：
//!
//! - `openai`: OpenAI 兼容的 chat/completions 接口，支持流式输出
//! - `deeplx`: 只接受扁平字符串的 DeepLX 接口，不支持流式
//! - `mock`: 离线确定性实现，用于测试和演示
//!
//! 未知的类型标签回退到 `mock`，只记录警告而不报错。
//!
//! 后端约定：`translate` 返回的列表必须与输入等长且保持顺序，调用方按位置对应结果。

pub mod deeplx;
pub mod mock;
pub mod openai;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::translation::config::ProviderSettings;
use crate::translation::error::{TranslationError, TranslationResult};

pub use self::deeplx::DeepLxBackend;
pub use self::mock::MockBackend;
pub use self::openai::OpenAiBackend;

/// 译文风格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationStyle {
    Formal,
    Casual,
    Technical,
    Marketing,
    Neutral,
}

impl TranslationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationStyle::Formal => "formal",
            TranslationStyle::Casual => "casual",
            TranslationStyle::Technical => "technical",
            TranslationStyle::Marketing => "marketing",
            TranslationStyle::Neutral => "neutral",
        }
    }
}

impl FromStr for TranslationStyle {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "formal" => Ok(TranslationStyle::Formal),
            "casual" => Ok(TranslationStyle::Casual),
            "technical" => Ok(TranslationStyle::Technical),
            "marketing" => Ok(TranslationStyle::Marketing),
            "neutral" => Ok(TranslationStyle::Neutral),
            other => Err(TranslationError::ConfigError(format!("未知的译文风格: {}", other))),
        }
    }
}

impl fmt::Display for TranslationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 随每次后端调用传递的附加选项
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationOptions {
    /// 不得翻译的术语（品牌名、产品名等）
    pub excluded_terms: Vec<String>,
    /// 结构化的上下文说明
    pub context: Option<String>,
    /// 术语表：原文 -> 指定译文
    pub glossary: BTreeMap<String, String>,
    pub style: Option<TranslationStyle>,
}

/// 一次后端调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRequest {
    pub texts: Vec<String>,
    pub source_lang: String,
    pub target_lang: String,
    pub options: Arc<TranslationOptions>,
}

/// 流式翻译的单个结果，`index` 指向提交列表中的位置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamChunk {
    pub index: usize,
    pub translation: String,
}

/// 翻译后端能力接口
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// 后端名称，用于日志
    fn name(&self) -> &str;

    /// 批量翻译，返回与输入等长、同序的列表
    async fn translate(&self, request: &BackendRequest) -> TranslationResult<Vec<String>>;

    /// 是否支持增量输出
    fn supports_streaming(&self) -> bool {
        false
    }

    /// 流式翻译，按到达顺序产出结果
    async fn translate_stream(
        &self,
        request: &BackendRequest,
    ) -> TranslationResult<BoxStream<'static, TranslationResult<StreamChunk>>> {
        let _ = request;
        Err(TranslationError::StreamingUnsupported(self.name().to_string()))
    }
}

/// 后端类型（构造时根据类型标签选择）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    DeepLx,
    Mock,
}

impl ProviderKind {
    /// 解析类型标签，未知标签回退到 `Mock`
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" | "chatgpt" => ProviderKind::OpenAi,
            "deeplx" | "deepl" => ProviderKind::DeepLx,
            "mock" | "" => ProviderKind::Mock,
            other => {
                tracing::warn!("未知的翻译后端类型 '{}'，使用 mock 后端", other);
                ProviderKind::Mock
            }
        }
    }
}

/// 根据配置构建翻译后端
pub fn build_backend(settings: &ProviderSettings) -> TranslationResult<Arc<dyn TranslationBackend>> {
    let backend: Arc<dyn TranslationBackend> = match ProviderKind::from_tag(&settings.provider_type) {
        ProviderKind::OpenAi => Arc::new(OpenAiBackend::from_settings(settings)?),
        ProviderKind::DeepLx => Arc::new(DeepLxBackend::from_settings(settings)?),
        ProviderKind::Mock => Arc::new(MockBackend::new()),
    };
    tracing::info!("使用翻译后端: {}", backend.name());
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_tag_resolution() {
        assert_eq!(ProviderKind::from_tag("OpenAI"), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::from_tag("deeplx"), ProviderKind::DeepLx);
        assert_eq!(ProviderKind::from_tag("mock"), ProviderKind::Mock);
        assert_eq!(ProviderKind::from_tag("my-custom-llm"), ProviderKind::Mock);
    }

    #[test]
    fn test_unknown_provider_builds_mock() {
        let settings = ProviderSettings {
            provider_type: "in-house-proxy".to_string(),
            ..ProviderSettings::default()
        };
        let backend = build_backend(&settings).expect("unknown tag must not fail");
        assert_eq!(backend.name(), "mock");
    }

    #[test]
    fn test_style_parsing() {
        assert_eq!("Formal".parse::<TranslationStyle>().unwrap(), TranslationStyle::Formal);
        assert!("sarcastic".parse::<TranslationStyle>().is_err());
    }
}
