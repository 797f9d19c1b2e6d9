//! 配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值。
//! 优先级：环境变量 > 配置文件 > 默认值。

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::helpers::config_error;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::languages;
use crate::translation::providers::{TranslationOptions, TranslationStyle};

/// 缓存类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    #[default]
    Memory,
    Redis,
    None,
}

impl FromStr for CacheKind {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(CacheKind::Memory),
            "redis" => Ok(CacheKind::Redis),
            "none" | "off" | "disabled" => Ok(CacheKind::None),
            other => Err(TranslationError::ConfigError(format!("未知的缓存类型: {}", other))),
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheKind::Memory => "memory",
            CacheKind::Redis => "redis",
            CacheKind::None => "none",
        };
        f.write_str(name)
    }
}

/// 缓存配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    #[serde(rename = "type")]
    pub kind: CacheKind,
    /// 过期时间（秒），0 或负数表示永不过期
    pub ttl_secs: i64,
    /// 进程内缓存的最大条目数
    pub capacity: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            kind: CacheKind::Memory,
            ttl_secs: constants::DEFAULT_CACHE_TTL_SECS,
            capacity: constants::DEFAULT_CACHE_CAPACITY,
            connection_string: None,
            key_prefix: None,
        }
    }
}

/// 翻译后端配置
#[derive(Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderSettings {
    #[serde(rename = "type")]
    pub provider_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider_type: constants::DEFAULT_PROVIDER.to_string(),
            api_key: None,
            model: None,
            base_url: None,
            timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl ProviderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

// 不输出 API 密钥
impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("provider_type", &self.provider_type)
            .field("api_key", &self.api_key.as_ref().map(|_| "[configured]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// 翻译配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    // 基础配置
    pub target_lang: String,
    pub source_lang: String,

    // 后端选项
    pub excluded_terms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<TranslationStyle>,

    // 时序配置
    pub coalesce_delay_ms: u64,
    pub stream_buffer_ms: u64,

    pub provider: ProviderSettings,
    pub cache: CacheSettings,
    pub glossary: BTreeMap<String, String>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            target_lang: "es".to_string(),
            source_lang: "en".to_string(),
            excluded_terms: Vec::new(),
            translation_context: None,
            style: None,
            coalesce_delay_ms: constants::DEFAULT_COALESCE_DELAY_MS,
            stream_buffer_ms: constants::DEFAULT_STREAM_BUFFER_MS,
            provider: ProviderSettings::default(),
            cache: CacheSettings::default(),
            glossary: BTreeMap::new(),
        }
    }
}

impl TranslationConfig {
    /// 创建带指定语言的默认配置
    pub fn default_with_lang(target_lang: &str) -> Self {
        Self {
            target_lang: target_lang.to_string(),
            ..Self::default()
        }
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if !languages::is_valid_code(&self.target_lang) {
            return Err(TranslationError::ConfigError(format!(
                "无效的目标语言: '{}'",
                self.target_lang
            )));
        }

        if !languages::is_valid_code(&self.source_lang) {
            return Err(TranslationError::ConfigError(format!(
                "无效的源语言: '{}'",
                self.source_lang
            )));
        }

        if self.cache.kind == CacheKind::Memory && self.cache.capacity == 0 {
            return Err(TranslationError::ConfigError("内存缓存容量不能为0".to_string()));
        }

        if self.excluded_terms.iter().any(|term| term.trim().is_empty()) {
            return Err(TranslationError::ConfigError("排除术语不能为空字符串".to_string()));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    ///
    /// 只有设置了的变量才会覆盖；值无效时记录警告并保留原值。
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{cache, provider, translation, EnvResult, EnvVar};

        fn apply<T>(name: &str, value: Option<EnvResult<T>>, target: &mut T) {
            match value {
                Some(Ok(value)) => {
                    *target = value;
                    tracing::debug!("环境变量覆盖配置: {}", name);
                }
                Some(Err(e)) => tracing::warn!("忽略无效的环境变量: {}", e),
                None => {}
            }
        }

        apply(translation::TargetLang::NAME, translation::TargetLang::lookup(), &mut self.target_lang);
        apply(translation::SourceLang::NAME, translation::SourceLang::lookup(), &mut self.source_lang);
        apply(
            translation::CoalesceDelayMs::NAME,
            translation::CoalesceDelayMs::lookup(),
            &mut self.coalesce_delay_ms,
        );
        apply(
            translation::StreamBufferMs::NAME,
            translation::StreamBufferMs::lookup(),
            &mut self.stream_buffer_ms,
        );

        apply(provider::Type::NAME, provider::Type::lookup(), &mut self.provider.provider_type);
        let mut api_key = self.provider.api_key.take();
        apply(provider::ApiKey::NAME, provider::ApiKey::lookup().map(|r| r.map(Some)), &mut api_key);
        self.provider.api_key = api_key;
        let mut model = self.provider.model.take();
        apply(provider::Model::NAME, provider::Model::lookup().map(|r| r.map(Some)), &mut model);
        self.provider.model = model;
        let mut base_url = self.provider.base_url.take();
        apply(provider::BaseUrl::NAME, provider::BaseUrl::lookup().map(|r| r.map(Some)), &mut base_url);
        if let Some(url) = &base_url {
            tracing::info!("环境变量覆盖 API URL: {}", url);
        }
        self.provider.base_url = base_url;

        apply(cache::Type::NAME, cache::Type::lookup(), &mut self.cache.kind);
        apply(cache::Ttl::NAME, cache::Ttl::lookup(), &mut self.cache.ttl_secs);
        apply(cache::Size::NAME, cache::Size::lookup(), &mut self.cache.capacity);
        let mut redis_url = self.cache.connection_string.take();
        apply(cache::RedisUrl::NAME, cache::RedisUrl::lookup().map(|r| r.map(Some)), &mut redis_url);
        self.cache.connection_string = redis_url;
    }

    /// 传给后端的附加选项
    pub fn options(&self) -> Arc<TranslationOptions> {
        Arc::new(TranslationOptions {
            excluded_terms: self.excluded_terms.clone(),
            context: self.translation_context.clone(),
            glossary: self.glossary.clone(),
            style: self.style,
        })
    }

    pub fn coalesce_delay(&self) -> Duration {
        Duration::from_millis(self.coalesce_delay_ms)
    }

    pub fn stream_buffer(&self) -> Duration {
        Duration::from_millis(self.stream_buffer_ms)
    }
}

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    config: TranslationConfig,
    source: Option<String>,
}

impl ConfigManager {
    /// 加载 .env 和默认位置的配置文件，应用环境变量覆盖并验证
    pub fn new() -> TranslationResult<Self> {
        Self::load_dotenv();

        let mut source = None;
        let mut config = TranslationConfig::default();
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                config = Self::load_from_file(&expanded_path)?;
                source = Some(expanded_path.into_owned());
                break;
            }
        }
        if source.is_none() {
            tracing::info!("未找到配置文件，使用默认配置");
        }

        Self::finish(config, source)
    }

    /// 从指定路径加载配置
    pub fn from_path(path: &str) -> TranslationResult<Self> {
        Self::load_dotenv();

        let expanded_path = shellexpand::tilde(path);
        tracing::info!("加载配置文件: {}", expanded_path);
        let config = Self::load_from_file(&expanded_path)?;
        Self::finish(config, Some(expanded_path.into_owned()))
    }

    fn finish(mut config: TranslationConfig, source: Option<String>) -> TranslationResult<Self> {
        config.apply_env_overrides();
        config.validate()?;
        Ok(Self { config, source })
    }

    /// 获取配置
    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut TranslationConfig {
        &mut self.config
    }

    pub fn into_config(self) -> TranslationConfig {
        self.config
    }

    /// 配置来源文件，使用默认配置时为 `None`
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// 从指定文件加载配置，`.toml` 按 TOML 解析，其余按 JSON 解析
    pub fn load_from_file(path: &str) -> TranslationResult<TranslationConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| config_error(format!("读取配置文件失败: {}", e)))?;

        if path.ends_with(".toml") {
            toml::from_str(&content)
                .map_err(|e| config_error(format!("解析TOML配置失败: {}", e)))
        } else {
            serde_json::from_str(&content)
                .map_err(|e| config_error(format!("解析JSON配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> TranslationResult<()> {
        let mut config = TranslationConfig::default();
        config.excluded_terms = vec!["Acme".to_string()];
        config.glossary.insert("cart".to_string(), "carrito".to_string());
        config.provider.model = Some(constants::DEFAULT_OPENAI_MODEL.to_string());

        let content = toml::to_string_pretty(&config)
            .map_err(|e| config_error(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| config_error(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
