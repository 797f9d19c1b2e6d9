//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制。
//!
//! 错误传播策略：
//! - 后端调用失败总是传播给调用者，由调用者决定是否回退到原文
//! - 缓存失败总是被吞掉（仅记录日志），缓存只是优化手段

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::translation::pipeline::fingerprint::Fingerprint;

/// 翻译错误类型
///
/// 实现了 `Clone`，因为一次分组失败需要同时通知该组内所有排队请求。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 网络错误
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 后端API返回了非成功状态码
    #[error("API错误 ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// 速率限制错误
    #[error("请求速率过快，已达到限制")]
    RateLimitExceeded,

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 后端响应不符合约定（长度不一致、不是数组等）
    #[error("后端响应格式错误: {0}")]
    MalformedResponse(String),

    /// 后端不支持流式翻译
    #[error("后端 {0} 不支持流式翻译")]
    StreamingUnsupported(String),

    /// 缓存错误
    #[error("缓存错误: {0}")]
    CacheError(String),

    /// 请求在完成前被取消
    #[error("翻译请求已取消: {0}")]
    Cancelled(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    TimeoutError(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    ParseError(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::NetworkError(_) => true,
            TranslationError::TimeoutError(_) => true,
            TranslationError::ApiError { status, .. } => *status >= 500,
            TranslationError::CacheError(_) => true,
            TranslationError::RateLimitExceeded => false, // 需要等待
            TranslationError::ConfigError(_) => false,
            TranslationError::InvalidInput(_) => false,
            TranslationError::MalformedResponse(_) => false,
            TranslationError::StreamingUnsupported(_) => false,
            TranslationError::Cancelled(_) => false,
            TranslationError::ParseError(_) => false,
            TranslationError::SerializationError(_) => false,
            TranslationError::InternalError(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::NetworkError(_) => ErrorSeverity::Warning,
            TranslationError::ApiError { .. } => ErrorSeverity::Error,
            TranslationError::RateLimitExceeded => ErrorSeverity::Warning,
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::MalformedResponse(_) => ErrorSeverity::Error,
            TranslationError::StreamingUnsupported(_) => ErrorSeverity::Info,
            TranslationError::CacheError(_) => ErrorSeverity::Warning,
            TranslationError::Cancelled(_) => ErrorSeverity::Info,
            TranslationError::TimeoutError(_) => ErrorSeverity::Warning,
            TranslationError::ParseError(_) => ErrorSeverity::Error,
            TranslationError::SerializationError(_) => ErrorSeverity::Error,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::NetworkError(_) => ErrorCategory::Network,
            TranslationError::ApiError { .. } => ErrorCategory::Backend,
            TranslationError::RateLimitExceeded => ErrorCategory::RateLimit,
            TranslationError::InvalidInput(_) => ErrorCategory::Input,
            TranslationError::MalformedResponse(_) => ErrorCategory::Backend,
            TranslationError::StreamingUnsupported(_) => ErrorCategory::Backend,
            TranslationError::CacheError(_) => ErrorCategory::Cache,
            TranslationError::Cancelled(_) => ErrorCategory::Internal,
            TranslationError::TimeoutError(_) => ErrorCategory::Timeout,
            TranslationError::ParseError(_) => ErrorCategory::Parsing,
            TranslationError::SerializationError(_) => ErrorCategory::Serialization,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        let suffix = format!(" (上下文: {})", context);

        match &mut self {
            TranslationError::ConfigError(msg)
            | TranslationError::NetworkError(msg)
            | TranslationError::InvalidInput(msg)
            | TranslationError::MalformedResponse(msg)
            | TranslationError::StreamingUnsupported(msg)
            | TranslationError::CacheError(msg)
            | TranslationError::Cancelled(msg)
            | TranslationError::TimeoutError(msg)
            | TranslationError::ParseError(msg)
            | TranslationError::SerializationError(msg)
            | TranslationError::InternalError(msg) => msg.push_str(&suffix),
            TranslationError::ApiError { message, .. } => message.push_str(&suffix),
            TranslationError::RateLimitExceeded => {}
        }

        self
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Backend,
    RateLimit,
    Input,
    Cache,
    Timeout,
    Parsing,
    Serialization,
    Internal,
}

/// 标准错误转换
impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::NetworkError(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ParseError(format!("TOML解析错误: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(format!("异步操作超时: {}", error))
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::TimeoutError(error.to_string())
        } else if error.is_decode() {
            TranslationError::MalformedResponse(error.to_string())
        } else if let Some(status) = error.status() {
            TranslationError::ApiError {
                status: status.as_u16(),
                message: error.to_string(),
            }
        } else {
            TranslationError::NetworkError(error.to_string())
        }
    }
}

impl From<redis::RedisError> for TranslationError {
    fn from(error: redis::RedisError) -> Self {
        TranslationError::CacheError(format!("Redis错误: {}", error))
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 批次解析失败
///
/// 后端调用失败时整个未命中组一起失败，但在失败之前已经从缓存中解析出的
/// 命中结果仍然有效，随错误一起返回给调用者。
#[derive(Error, Debug, Clone)]
#[error("{error}")]
pub struct BatchFailure {
    /// 导致失败的后端错误
    pub error: TranslationError,
    /// 失败前已从缓存命中的翻译
    pub cached: HashMap<Fingerprint, String>,
}

impl BatchFailure {
    pub fn new(error: TranslationError, cached: HashMap<Fingerprint, String>) -> Self {
        Self { error, cached }
    }

    /// 丢弃缓存命中部分，只保留错误本身
    pub fn into_error(self) -> TranslationError {
        self.error
    }
}

impl From<BatchFailure> for TranslationError {
    fn from(failure: BatchFailure) -> Self {
        failure.error
    }
}

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误
    pub fn log_error(error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::ConfigError(msg.to_string())
    }

    /// 创建响应格式错误
    pub fn malformed<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::MalformedResponse(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = TranslationError::NetworkError("connection reset".to_string());
        assert!(err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.severity(), ErrorSeverity::Warning);

        let err = TranslationError::MalformedResponse("expected 3 items, got 2".to_string());
        assert!(!err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::Backend);

        let server = TranslationError::ApiError { status: 503, message: "busy".to_string() };
        let client = TranslationError::ApiError { status: 401, message: "bad key".to_string() };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
    }

    #[test]
    fn test_with_context() {
        let err = TranslationError::ConfigError("缺少API密钥".to_string()).with_context("openai");
        assert_eq!(err.to_string(), "配置错误: 缺少API密钥 (上下文: openai)");

        let err = TranslationError::RateLimitExceeded.with_context("ignored");
        assert_eq!(err, TranslationError::RateLimitExceeded);
    }

    #[test]
    fn test_batch_failure_displays_inner_error() {
        let failure = BatchFailure::new(
            TranslationError::TimeoutError("30s".to_string()),
            HashMap::new(),
        );
        assert_eq!(failure.to_string(), "操作超时: 30s");
        let err: TranslationError = failure.into();
        assert!(matches!(err, TranslationError::TimeoutError(_)));
    }
}
