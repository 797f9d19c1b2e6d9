//! 语言元数据
//!
//! 静态语言表（显示名称、地区变体、质量等级）以及从右到左书写系统的判断。

use serde::Serialize;

/// 翻译质量等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    /// 训练数据充足，译文质量稳定
    High,
    Medium,
    /// 低资源语言，译文可能需要人工校对
    Low,
}

/// 文本方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    Ltr,
    Rtl,
}

impl TextDirection {
    /// HTML `dir` 属性值
    pub fn as_str(&self) -> &'static str {
        match self {
            TextDirection::Ltr => "ltr",
            TextDirection::Rtl => "rtl",
        }
    }
}

/// 单个语言的元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LanguageInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub native_name: &'static str,
    /// 地区变体，例如 `pt-BR` 中的 `BR`
    pub region: Option<&'static str>,
    pub tier: QualityTier,
}

const fn lang(
    code: &'static str,
    name: &'static str,
    native_name: &'static str,
    region: Option<&'static str>,
    tier: QualityTier,
) -> LanguageInfo {
    LanguageInfo {
        code,
        name,
        native_name,
        region,
        tier,
    }
}

use QualityTier::{High, Low, Medium};

/// 支持的语言表
pub static LANGUAGES: &[LanguageInfo] = &[
    lang("en", "English", "English", None, High),
    lang("en-US", "English (United States)", "English (US)", Some("US"), High),
    lang("en-GB", "English (United Kingdom)", "English (UK)", Some("GB"), High),
    lang("es", "Spanish", "Español", None, High),
    lang("es-MX", "Spanish (Mexico)", "Español (México)", Some("MX"), High),
    lang("fr", "French", "Français", None, High),
    lang("fr-CA", "French (Canada)", "Français (Canada)", Some("CA"), High),
    lang("de", "German", "Deutsch", None, High),
    lang("it", "Italian", "Italiano", None, High),
    lang("pt", "Portuguese", "Português", None, High),
    lang("pt-BR", "Portuguese (Brazil)", "Português (Brasil)", Some("BR"), High),
    lang("nl", "Dutch", "Nederlands", None, High),
    lang("ja", "Japanese", "日本語", None, High),
    lang("ko", "Korean", "한국어", None, High),
    lang("zh", "Chinese", "中文", None, High),
    lang("zh-CN", "Chinese (Simplified)", "简体中文", Some("CN"), High),
    lang("zh-TW", "Chinese (Traditional)", "繁體中文", Some("TW"), High),
    lang("ru", "Russian", "Русский", None, High),
    lang("pl", "Polish", "Polski", None, Medium),
    lang("sv", "Swedish", "Svenska", None, Medium),
    lang("da", "Danish", "Dansk", None, Medium),
    lang("no", "Norwegian", "Norsk", None, Medium),
    lang("fi", "Finnish", "Suomi", None, Medium),
    lang("cs", "Czech", "Čeština", None, Medium),
    lang("el", "Greek", "Ελληνικά", None, Medium),
    lang("tr", "Turkish", "Türkçe", None, Medium),
    lang("uk", "Ukrainian", "Українська", None, Medium),
    lang("ro", "Romanian", "Română", None, Medium),
    lang("hu", "Hungarian", "Magyar", None, Medium),
    lang("id", "Indonesian", "Bahasa Indonesia", None, Medium),
    lang("ms", "Malay", "Bahasa Melayu", None, Medium),
    lang("vi", "Vietnamese", "Tiếng Việt", None, Medium),
    lang("th", "Thai", "ไทย", None, Medium),
    lang("hi", "Hindi", "हिन्दी", None, Medium),
    lang("bn", "Bengali", "বাংলা", None, Low),
    lang("ta", "Tamil", "தமிழ்", None, Low),
    lang("sw", "Swahili", "Kiswahili", None, Low),
    lang("ar", "Arabic", "العربية", None, Medium),
    lang("he", "Hebrew", "עברית", None, Medium),
    lang("fa", "Persian", "فارسی", None, Medium),
    lang("ur", "Urdu", "اردو", None, Low),
    lang("ps", "Pashto", "پښتو", None, Low),
    lang("sd", "Sindhi", "سنڌي", None, Low),
    lang("ug", "Uyghur", "ئۇيغۇرچە", None, Low),
];

/// 从右到左书写的语言（主语言子标签）
const RTL_LANGUAGES: &[&str] = &["ar", "he", "fa", "ur", "ps", "sd", "ug"];

/// 取主语言子标签并转为小写，`pt_BR` 与 `pt-BR` 等价
fn primary_subtag(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// 判断语言是否从右到左书写
///
/// 大小写不敏感，忽略地区后缀；未知代码视为从左到右。
pub fn is_rtl(code: &str) -> bool {
    let primary = primary_subtag(code);
    RTL_LANGUAGES.contains(&primary.as_str())
}

/// 获取语言的文本方向
pub fn text_direction(code: &str) -> TextDirection {
    if is_rtl(code) {
        TextDirection::Rtl
    } else {
        TextDirection::Ltr
    }
}

/// 查找语言元数据
///
/// 先精确匹配（大小写不敏感），再回退到主语言子标签。
pub fn language_info(code: &str) -> Option<&'static LanguageInfo> {
    let normalized = code.trim().replace('_', "-");
    LANGUAGES
        .iter()
        .find(|info| info.code.eq_ignore_ascii_case(&normalized))
        .or_else(|| {
            let primary = primary_subtag(code);
            LANGUAGES.iter().find(|info| info.code == primary)
        })
}

/// 校验语言代码格式：2-3 个字母，可选地区后缀
pub fn is_valid_code(code: &str) -> bool {
    let mut parts = code.trim().split(['-', '_']);
    let primary_ok = parts
        .next()
        .map(|p| (2..=3).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphabetic()))
        .unwrap_or(false);
    primary_ok && parts.all(|p| (2..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()))
}
