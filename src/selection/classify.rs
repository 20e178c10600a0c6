//! 节点分类：决定一个节点是否翻译、以何种方式翻译
//!
//! 分类从不报错，任何不确定的情况都归为“不翻译”。
//! 向上查找使用迭代而非递归，深层嵌套的文档不会撑爆栈。

use std::rc::Rc;

use markup5ever_rcdom::{Handle, NodeData};

use super::compat::{OverrideVerdict, SiteOverride};
use super::numeric::is_mainly_numeric;
use super::region::{has_explicit_main_content, is_outside_content};
use super::rules::{
    children_all_inline, is_button, is_direct_tag, is_inline_tag, is_structurally_rejected,
    single_button_child,
};
use crate::config::constants;
use crate::dom::{
    ancestors, get_node_name, get_parent_node, is_content_editable, outer_html, text_content,
    text_runs,
};

/// 分类结果
#[derive(Clone)]
pub enum TranslationTarget {
    /// 标题、段落、列表项等，按自身翻译
    DirectBlock(Handle),
    /// 链接、按钮，只替换可见文本
    ButtonLabel(Handle),
    /// 由内联节点向上合并得到的祖先
    MergedInlineParent(Handle),
    /// 只含内联子元素的通用容器
    FirstLineOnly(Handle),
}

impl TranslationTarget {
    pub fn node(&self) -> &Handle {
        match self {
            TranslationTarget::DirectBlock(node)
            | TranslationTarget::ButtonLabel(node)
            | TranslationTarget::MergedInlineParent(node)
            | TranslationTarget::FirstLineOnly(node) => node,
        }
    }

    pub fn is_label(&self) -> bool {
        matches!(self, TranslationTarget::ButtonLabel(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TranslationTarget::DirectBlock(_) => "direct-block",
            TranslationTarget::ButtonLabel(_) => "button-label",
            TranslationTarget::MergedInlineParent(_) => "merged-inline-parent",
            TranslationTarget::FirstLineOnly(_) => "first-line-only",
        }
    }

    /// 由内联节点上溯得到时，标签目标保持不变，其余改记为合并父节点
    fn merged(self) -> Self {
        match self {
            TranslationTarget::ButtonLabel(node) => TranslationTarget::ButtonLabel(node),
            other => TranslationTarget::MergedInlineParent(other.node().clone()),
        }
    }
}

impl std::fmt::Debug for TranslationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}(<{}>)",
            self.kind(),
            get_node_name(self.node()).unwrap_or("#text")
        )
    }
}

enum Step {
    Claim(TranslationTarget),
    Reject,
    Ascend,
}

/// 一次文档扫描使用的分类器
///
/// 文档级信息（是否存在主内容区域、站点钩子）在构造时确定
#[derive(Clone)]
pub struct Selector {
    has_main: bool,
    site: Option<Rc<dyn SiteOverride>>,
}

impl Selector {
    pub fn new(document: &Handle, site: Option<Rc<dyn SiteOverride>>) -> Self {
        Self {
            has_main: has_explicit_main_content(document),
            site,
        }
    }

    pub fn has_main(&self) -> bool {
        self.has_main
    }

    pub fn site(&self) -> Option<&Rc<dyn SiteOverride>> {
        self.site.as_ref()
    }

    /// 对任意节点（元素或文本）分类
    pub fn classify(&self, node: &Handle) -> Option<TranslationTarget> {
        if has_rejected_ancestor(node) {
            return None;
        }

        let mut current = node.clone();
        let mut ascended = false;

        loop {
            match self.step(&current) {
                Step::Claim(target) => {
                    return Some(if ascended { target.merged() } else { target });
                }
                Step::Reject => return None,
                Step::Ascend => {
                    current = get_parent_node(&current)?;
                    ascended = true;
                }
            }
        }
    }

    fn step(&self, node: &Handle) -> Step {
        let tag = match &node.data {
            NodeData::Element { name, .. } => name.local.to_string(),
            NodeData::Text { .. } => return Step::Ascend,
            _ => return Step::Reject,
        };

        // 1. 结构性拒绝
        if is_structurally_rejected(node) || is_content_editable(node) {
            return Step::Reject;
        }

        // 2. 区域判定
        if is_outside_content(node, self.has_main) {
            return Step::Reject;
        }

        // 3. 内容质量
        if fails_quality(node) {
            return Step::Reject;
        }

        // 4. 站点钩子优先于通用规则
        if let Some(site) = &self.site {
            match site.select(node) {
                Some(OverrideVerdict::Skip) => return Step::Reject,
                Some(OverrideVerdict::Substitute(other)) => {
                    return Step::Claim(TranslationTarget::DirectBlock(other));
                }
                None => {}
            }
        }

        // 5. 块级元素；只包一个按钮时转交按钮处理，块本身不认领
        if is_direct_tag(&tag) {
            return match single_button_child(node) {
                Some(button) => Step::Claim(TranslationTarget::ButtonLabel(button)),
                None => Step::Claim(TranslationTarget::DirectBlock(node.clone())),
            };
        }

        // 6. 按钮与标签
        if is_button(node) {
            return Step::Claim(TranslationTarget::ButtonLabel(node.clone()));
        }

        // 7. 内联元素并入父节点
        if is_inline_tag(&tag) {
            return Step::Ascend;
        }

        // 8. 只含内联子元素的叶子容器
        if let Some(button) = single_button_child(node) {
            return Step::Claim(TranslationTarget::ButtonLabel(button));
        }
        let has_text = text_content(node).trim().chars().count() >= constants::MIN_TEXT_LENGTH;
        if has_text && children_all_inline(node) {
            return Step::Claim(TranslationTarget::FirstLineOnly(node.clone()));
        }

        Step::Reject
    }
}

/// 祖先链（不含 html/body）上存在被结构性拒绝的节点
fn has_rejected_ancestor(node: &Handle) -> bool {
    ancestors(node)
        .take_while(|ancestor| !matches!(get_node_name(ancestor), Some("body") | Some("html")))
        .any(|ancestor| is_structurally_rejected(&ancestor))
}

/// 文本过短、过长、标记过大或主要为数字/标识时拒绝
fn fails_quality(node: &Handle) -> bool {
    let text = text_content(node);
    let trimmed = text.trim();
    let text_len = trimmed.chars().count();

    if text_len > constants::MAX_TEXT_LENGTH || text_len < constants::MIN_TEXT_LENGTH {
        return true;
    }

    if outer_html(node).chars().count() > constants::MAX_MARKUP_LENGTH {
        return true;
    }

    is_mainly_numeric(trimmed, &text_runs(node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{descendants, get_node_attr, html_to_dom};
    use markup5ever_rcdom::RcDom;

    fn by_id(dom: &RcDom, id: &str) -> Handle {
        descendants(&dom.document)
            .into_iter()
            .find(|n| get_node_attr(n, "id").as_deref() == Some(id))
            .expect("element with id should exist")
    }

    fn selector(dom: &RcDom) -> Selector {
        Selector::new(&dom.document, None)
    }

    fn kind_and_id(target: Option<TranslationTarget>) -> Option<(&'static str, String)> {
        target.map(|t| {
            (
                t.kind(),
                get_node_attr(t.node(), "id").unwrap_or_else(|| {
                    get_node_name(t.node()).unwrap_or_default().to_string()
                }),
            )
        })
    }

    #[test]
    fn test_direct_block_is_claimed() {
        let dom = html_to_dom(b"<p id=\"p\">Hello there, world</p>", "utf-8");
        let s = selector(&dom);
        assert_eq!(
            kind_and_id(s.classify(&by_id(&dom, "p"))),
            Some(("direct-block", "p".to_string()))
        );
    }

    #[test]
    fn test_inline_merges_into_parent() {
        let dom = html_to_dom(
            b"<p id=\"p\">Some <em id=\"em\">emphasised <b id=\"b\">bold</b></em> words</p>",
            "utf-8",
        );
        let s = selector(&dom);
        assert_eq!(
            kind_and_id(s.classify(&by_id(&dom, "b"))),
            Some(("merged-inline-parent", "p".to_string()))
        );
        let text = by_id(&dom, "b").children.borrow()[0].clone();
        assert_eq!(
            kind_and_id(s.classify(&text)),
            Some(("merged-inline-parent", "p".to_string()))
        );
    }

    #[test]
    fn test_lone_link_routes_to_label() {
        let dom = html_to_dom(
            b"<div id=\"box\">\n  <a id=\"go\" href=\"/next\">Continue</a>\n</div><p id=\"p\"> <a id=\"more\">Read more</a> </p>",
            "utf-8",
        );
        let s = selector(&dom);

        assert_eq!(
            kind_and_id(s.classify(&by_id(&dom, "box"))),
            Some(("button-label", "go".to_string()))
        );
        assert_eq!(
            kind_and_id(s.classify(&by_id(&dom, "go"))),
            Some(("button-label", "go".to_string()))
        );
        assert_eq!(
            kind_and_id(s.classify(&by_id(&dom, "p"))),
            Some(("button-label", "more".to_string()))
        );
    }

    #[test]
    fn test_numeric_and_handles_are_rejected() {
        let dom = html_to_dom(
            b"<p id=\"n\">1,234,567</p><p id=\"d\">2024-01-31</p><p id=\"h\">@ferris</p><p id=\"multi\"><span>12</span> <span>45%</span> <span>13:45:30</span> <span>1.0.0</span> <span>$9.99</span> <span>2,000</span></p>",
            "utf-8",
        );
        let s = selector(&dom);

        for id in ["n", "d", "h", "multi"] {
            assert!(s.classify(&by_id(&dom, id)).is_none(), "{} should be rejected", id);
        }
    }

    #[test]
    fn test_structural_and_quality_rejects() {
        let dom = html_to_dom(
            b"<pre><p id=\"in-pre\">code-ish paragraph</p></pre><p id=\"short\">x</p><div contenteditable=\"true\"><p id=\"edit\">editable text</p></div><p id=\"skip\" class=\"notranslate\">keep me</p>",
            "utf-8",
        );
        let s = selector(&dom);

        for id in ["in-pre", "short", "edit", "skip"] {
            assert!(s.classify(&by_id(&dom, id)).is_none(), "{} should be rejected", id);
        }
    }

    #[test]
    fn test_container_rules() {
        let dom = html_to_dom(
            b"<div id=\"leaf\">Plain <b>text</b> here</div><div id=\"wrapper\"><p>Para</p><span>x</span></div>",
            "utf-8",
        );
        let s = selector(&dom);

        assert_eq!(
            kind_and_id(s.classify(&by_id(&dom, "leaf"))),
            Some(("first-line-only", "leaf".to_string()))
        );
        assert!(s.classify(&by_id(&dom, "wrapper")).is_none());
    }

    #[test]
    fn test_site_override_takes_precedence() {
        struct Redirect;
        impl SiteOverride for Redirect {
            fn select(&self, node: &Handle) -> Option<OverrideVerdict> {
                match get_node_attr(node, "id").as_deref() {
                    Some("veto") => Some(OverrideVerdict::Skip),
                    Some("title") => get_parent_node(node).map(OverrideVerdict::Substitute),
                    _ => None,
                }
            }
        }

        let dom = html_to_dom(
            b"<section id=\"card\"><h2 id=\"title\">A headline here</h2></section><p id=\"veto\">Vetoed paragraph</p>",
            "utf-8",
        );
        let s = Selector::new(&dom.document, Some(Rc::new(Redirect)));

        assert_eq!(
            kind_and_id(s.classify(&by_id(&dom, "title"))),
            Some(("direct-block", "card".to_string()))
        );
        assert!(s.classify(&by_id(&dom, "veto")).is_none());
    }
}
