//! 内容指纹模块
//!
//! 对规范化（去除首尾空白）后的文本计算 BLAKE3 摘要，作为缓存和去重的键。
//! 摘要不带任何进程级盐值，重启或重新部署后 Redis 中的持久化缓存仍然有效。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 文本指纹（64位十六进制 BLAKE3 摘要）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// 计算文本指纹
    ///
    /// 首尾空白不影响结果，内部空白会影响结果。
    pub fn of(text: &str) -> Self {
        let digest = blake3::hash(text.trim().as_bytes());
        Self(digest.to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 生成缓存键: `fingerprint:target_lang`
    pub fn cache_key(&self, target_lang: &str) -> String {
        format!("{}:{}", self.0, target_lang)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 待翻译条目，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatableItem {
    text: String,
    fingerprint: Fingerprint,
}

impl TranslatableItem {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let fingerprint = Fingerprint::of(&text);
        Self { text, fingerprint }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

impl From<&str> for TranslatableItem {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for TranslatableItem {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}
