//! HTML解析和处理模块
//!
//! - `dom`: DOM 解析和基础操作
//! - `serializer`: 序列化功能

pub mod dom;
pub mod serializer;

pub use dom::{
    find_nodes, get_charset, get_child_node_by_name, get_node_attr, get_node_name, html_to_dom,
    set_node_attr,
};
pub use serializer::serialize_document;
