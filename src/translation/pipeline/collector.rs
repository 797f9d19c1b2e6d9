//! 文本收集模块
//!
//! 从 HTML 文档中收集可翻译文本（文本节点和少数属性），翻译完成后按指纹写回。
//!
//! 以下子树不会被收集：
//! - `script`、`style`、`code`、`pre` 等非自然语言元素（见 [`constants::SKIP_ELEMENTS`]）
//! - 带 `translate="no"` 属性或 `notranslate` 类的元素

use std::collections::HashMap;

use html5ever::tendril::StrTendril;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use super::filters::TextFilter;
use super::fingerprint::Fingerprint;
use crate::parsers::html::{get_child_node_by_name, get_node_attr, get_node_name, html_to_dom, serialize_document, set_node_attr};
use crate::translation::config::constants;
use crate::translation::error::TranslationResult;
use crate::translation::languages;

/// 收集到的文本片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    /// 在文档内稳定的标识，例如 `t3`、`a0:alt`
    pub stable_id: String,
    /// 原始文本，包含首尾空白
    pub raw_text: String,
}

/// 文本来源：产出待翻译片段，接收译文并输出最终文档
pub trait TextSource {
    fn segments(&self) -> Vec<TextSegment>;

    /// 按指纹写回译文，返回被替换的片段数
    fn apply(&mut self, translations: &HashMap<Fingerprint, String>) -> usize;

    /// 标记文档语言，默认不做任何事
    fn set_language(&mut self, _lang: &str) {}

    fn serialize(&self) -> TranslationResult<String>;
}

#[derive(Debug, Clone)]
enum SlotKind {
    Text,
    Attribute(&'static str),
}

struct TextSlot {
    node: Handle,
    kind: SlotKind,
    stable_id: String,
    raw_text: String,
}

/// 基于 html5ever 的 HTML 文档
pub struct HtmlDocument {
    dom: RcDom,
    slots: Vec<TextSlot>,
    encoding: String,
}

impl HtmlDocument {
    /// 解析 UTF-8 HTML
    pub fn parse(html: &str) -> TranslationResult<Self> {
        Self::from_bytes(html.as_bytes(), "utf-8")
    }

    /// 按指定编码解析 HTML 字节
    pub fn from_bytes(data: &[u8], encoding: &str) -> TranslationResult<Self> {
        let dom = html_to_dom(data, encoding)?;
        let filter = TextFilter::new();
        let mut slots = Vec::new();
        let document = dom.document.clone();
        collect(&document, &filter, &mut slots);
        tracing::debug!("收集到 {} 个可翻译片段", slots.len());

        Ok(Self {
            dom,
            slots,
            encoding: encoding.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 按原始编码输出
    pub fn to_bytes(&self) -> TranslationResult<Vec<u8>> {
        serialize_document(&self.dom, &self.encoding)
    }
}

impl TextSource for HtmlDocument {
    fn segments(&self) -> Vec<TextSegment> {
        self.slots
            .iter()
            .map(|slot| TextSegment {
                stable_id: slot.stable_id.clone(),
                raw_text: slot.raw_text.clone(),
            })
            .collect()
    }

    fn apply(&mut self, translations: &HashMap<Fingerprint, String>) -> usize {
        let mut applied = 0;
        for slot in &self.slots {
            let Some(translation) = translations.get(&Fingerprint::of(&slot.raw_text)) else {
                continue;
            };
            let value = preserve_whitespace(&slot.raw_text, translation);
            match &slot.kind {
                SlotKind::Text => {
                    if let NodeData::Text { contents } = &slot.node.data {
                        *contents.borrow_mut() = StrTendril::from(value);
                        applied += 1;
                    }
                }
                SlotKind::Attribute(name) => {
                    set_node_attr(&slot.node, name, Some(value));
                    applied += 1;
                }
            }
        }
        applied
    }

    fn set_language(&mut self, lang: &str) {
        if let Some(html) = get_child_node_by_name(&self.dom.document, "html") {
            set_node_attr(&html, "lang", Some(lang.to_string()));
            set_node_attr(&html, "dir", Some(languages::text_direction(lang).as_str().to_string()));
        }
    }

    fn serialize(&self) -> TranslationResult<String> {
        let bytes = serialize_document(&self.dom, "")?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// 把原文的首尾空白套到译文上
fn preserve_whitespace(original: &str, translation: &str) -> String {
    let leading = &original[..original.len() - original.trim_start().len()];
    let trailing = &original[original.trim_end().len()..];
    format!("{}{}{}", leading, translation.trim(), trailing)
}

fn is_excluded(node: &Handle, name: &str) -> bool {
    if constants::SKIP_ELEMENTS.contains(&name) {
        return true;
    }
    if get_node_attr(node, "translate")
        .map(|v| v.trim().eq_ignore_ascii_case("no"))
        .unwrap_or(false)
    {
        return true;
    }
    get_node_attr(node, "class")
        .map(|class| class.split_whitespace().any(|c| c == "notranslate"))
        .unwrap_or(false)
}

fn collect(node: &Handle, filter: &TextFilter, slots: &mut Vec<TextSlot>) {
    match &node.data {
        NodeData::Element { .. } => {
            let name = get_node_name(node).unwrap_or_default();
            if is_excluded(node, name) {
                return;
            }
            for &attr in constants::TRANSLATABLE_ATTRS {
                if let Some(value) = get_node_attr(node, attr) {
                    if filter.should_translate(&value) {
                        slots.push(TextSlot {
                            node: node.clone(),
                            kind: SlotKind::Attribute(attr),
                            stable_id: format!("a{}:{}", slots.len(), attr),
                            raw_text: value,
                        });
                    }
                }
            }
        }
        NodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            if filter.should_translate(&text) {
                slots.push(TextSlot {
                    node: node.clone(),
                    kind: SlotKind::Text,
                    stable_id: format!("t{}", slots.len()),
                    raw_text: text,
                });
            }
            return;
        }
        _ => {}
    }

    for child in node.children.borrow().iter() {
        collect(child, filter, slots);
    }
}
