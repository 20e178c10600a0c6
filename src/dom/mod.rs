//! 内容树访问模块
//!
//! 宿主文档被视为外部共享资源，这里只提供窄口径的读取、分类辅助和局部改写操作：
//!
//! - `node`: 节点名称、属性、类名、文本和祖先遍历
//! - `mutate`: 节点创建、插入、移除
//! - `serializer`: 内外层 HTML 序列化与片段解析

pub mod mutate;
pub mod node;
pub mod serializer;

pub use mutate::{
    append_child, create_element, create_text, insert_after, remove_node, replace_children,
    set_text,
};
pub use node::{
    add_class, ancestors, descendants, element_children, get_node_attr, get_node_name,
    get_parent_node, has_class, is_content_editable, is_element, is_same_node, remove_class,
    set_node_attr, text_content, text_runs, Ancestors,
};
pub use serializer::{
    html_to_dom, inner_html, outer_html, parse_html_fragment, serialize_document, set_inner_html,
    take_children,
};
