//! 标签集合与结构性判定

use markup5ever_rcdom::{Handle, NodeData};

use crate::dom::{
    ancestors, descendants, element_children, get_node_attr, get_node_name, get_parent_node,
    has_class, is_same_node, text_content,
};

/// 作为自身翻译的块级标签
pub const DIRECT_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "li", "dd", "blockquote", "figcaption",
];

/// 整棵子树都不参与翻译的标签
pub const SKIP_TAGS: &[&str] = &[
    "html", "head", "body", "script", "style", "noscript", "iframe", "input", "textarea",
    "select", "code", "pre",
];

/// 内联标签，永远并入最近的非内联祖先
pub const INLINE_TAGS: &[&str] = &[
    "a", "b", "strong", "span", "em", "i", "u", "small", "sub", "sup", "font", "mark", "cite",
    "q", "abbr", "time", "ruby", "bdi", "bdo", "img", "br", "wbr", "svg",
];

/// 标记“不要翻译”的类名
pub const NO_TRANSLATE_CLASSES: &[&str] = &["sr-only", "notranslate"];

pub const BILINGUAL_CLASS: &str = "fluent-read-bilingual";
pub const BILINGUAL_CONTENT_CLASS: &str = "fluent-read-bilingual-content";
pub const LOADING_CLASS: &str = "fluent-read-loading";
pub const RETRY_CLASS: &str = "fluent-read-retry-wrapper";

/// 会话自己插入的节点所带的类名
pub const ARTIFACT_CLASSES: &[&str] = &[BILINGUAL_CONTENT_CLASS, LOADING_CLASS, RETRY_CLASS];

pub fn is_direct_tag(tag: &str) -> bool {
    DIRECT_TAGS.contains(&tag)
}

pub fn is_skip_tag(tag: &str) -> bool {
    SKIP_TAGS.contains(&tag)
}

pub fn is_inline_tag(tag: &str) -> bool {
    INLINE_TAGS.contains(&tag)
}

/// 会话插入的译文、加载或失败提示节点
pub fn is_artifact(node: &Handle) -> bool {
    ARTIFACT_CLASSES.iter().any(|class| has_class(node, class))
}

/// 结构性拒绝：命中时整棵子树都不再遍历
pub fn is_structurally_rejected(node: &Handle) -> bool {
    let Some(tag) = get_node_name(node) else {
        return false;
    };

    is_skip_tag(tag)
        || NO_TRANSLATE_CLASSES.iter().any(|class| has_class(node, class))
        || get_node_attr(node, "translate").as_deref() == Some("no")
        || is_artifact(node)
}

/// 所有元素子节点都是内联标签
pub fn children_all_inline(node: &Handle) -> bool {
    element_children(node)
        .iter()
        .all(|child| get_node_name(child).map(is_inline_tag).unwrap_or(true))
}

fn has_button_role(node: &Handle) -> bool {
    get_node_attr(node, "role").as_deref() == Some("button")
}

/// 链接、按钮、`role=button`，或直接包在链接/按钮里的 `span`
pub fn is_button(node: &Handle) -> bool {
    let Some(tag) = get_node_name(node) else {
        return false;
    };

    if tag == "button" || tag == "a" || has_button_role(node) {
        return true;
    }

    if tag == "span" {
        if let Some(parent) = get_parent_node(node) {
            return matches!(get_node_name(&parent), Some("button") | Some("a"));
        }
    }

    false
}

/// 块内唯一的非空白内容是一个带可见文本的交互元素时返回该元素
pub fn single_button_child(node: &Handle) -> Option<Handle> {
    let has_loose_text = node.children.borrow().iter().any(|child| match &child.data {
        NodeData::Text { contents } => !contents.borrow().trim().is_empty(),
        _ => false,
    });
    if has_loose_text {
        return None;
    }

    let candidates: Vec<Handle> = element_children(node)
        .into_iter()
        .filter(|child| get_node_name(child) != Some("svg"))
        .collect();
    let [only] = candidates.as_slice() else {
        return None;
    };

    let interactive = matches!(get_node_name(only), Some("a") | Some("button")) || has_button_role(only);
    if interactive && !text_content(only).trim().is_empty() {
        return Some(only.clone());
    }

    None
}

/// 节点内相对顶层的块级段落（不被其他块级元素包裹），且文本非空
pub fn block_children_with_text(node: &Handle) -> Vec<Handle> {
    descendants(node)
        .into_iter()
        .filter(|candidate| get_node_name(candidate).map(is_direct_tag).unwrap_or(false))
        .filter(|candidate| {
            ancestors(candidate)
                .take_while(|ancestor| !is_same_node(ancestor, node))
                .all(|ancestor| !get_node_name(&ancestor).map(is_direct_tag).unwrap_or(false))
        })
        .filter(|candidate| !text_content(candidate).trim().is_empty())
        .collect()
}
