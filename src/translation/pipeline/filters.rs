//! 文本过滤器模块
//!
//! 判断从文档中收集到的文本是否值得翻译：网址、邮箱、纯数字和类似代码的片段直接跳过。

use std::sync::OnceLock;

use regex::Regex;

use crate::translation::config::constants;

/// 文本过滤器
#[derive(Default)]
pub struct TextFilter {
    url_regex: OnceLock<Option<Regex>>,
    email_regex: OnceLock<Option<Regex>>,
}

impl TextFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 判断文本是否需要翻译
    pub fn should_translate(&self, text: &str) -> bool {
        let trimmed = text.trim();

        if trimmed.chars().count() < constants::MIN_TEXT_LENGTH {
            // 单个表意字符本身就是词
            return trimmed.chars().any(is_ideographic);
        }

        if !trimmed.chars().any(char::is_alphabetic) {
            return false;
        }

        !(self.is_url(trimmed) || self.is_email(trimmed) || self.is_code_like(trimmed))
    }

    fn is_url(&self, text: &str) -> bool {
        if text.contains(char::is_whitespace) {
            return false;
        }
        if text.starts_with("http://") || text.starts_with("https://") || text.starts_with("www.") {
            return true;
        }

        self.url_regex
            .get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://\S+$").ok())
            .as_ref()
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    }

    fn is_email(&self, text: &str) -> bool {
        if text.len() > 100 || !text.contains('@') {
            return false;
        }

        self.email_regex
            .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok())
            .as_ref()
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    }

    /// 特殊符号占比过高的文本视为代码
    fn is_code_like(&self, text: &str) -> bool {
        let total = text.chars().count();
        let special = text
            .chars()
            .filter(|&c| matches!(c, '{' | '}' | '[' | ']' | ';' | '=' | '<' | '>' | '\\' | '$'))
            .count();

        special * 3 > total
            || (text.contains('{') && text.contains('}'))
            || text.contains("=>")
            || text.contains("();")
    }
}

fn is_ideographic(c: char) -> bool {
    matches!(c as u32, 0x3040..=0x30FF | 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xAC00..=0xD7AF)
}
