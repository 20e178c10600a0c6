use std::cell::RefCell;
use std::rc::Rc;

use html5ever::interface::{Attribute, QualName};
use html5ever::tendril::{format_tendril, StrTendril};
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData};

use super::node::get_parent_node;

/// 创建一个 HTML 命名空间下的游离元素
pub fn create_element(tag: &str, attrs: &[(&str, &str)]) -> Handle {
    let attrs = attrs
        .iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(*name)),
            value: format_tendril!("{}", value),
        })
        .collect();

    Node::new(NodeData::Element {
        name: QualName::new(None, ns!(html), LocalName::from(tag)),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

pub fn create_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

/// 从父节点摘下；游离节点直接忽略
pub fn remove_node(node: &Handle) {
    if let Some(parent) = get_parent_node(node) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
    node.parent.set(None);
}

pub fn append_child(parent: &Handle, child: Handle) {
    remove_node(&child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// 插入到参考节点之后；参考节点游离时返回 false
pub fn insert_after(reference: &Handle, new_node: Handle) -> bool {
    let Some(parent) = get_parent_node(reference) else {
        return false;
    };

    remove_node(&new_node);
    let mut children = parent.children.borrow_mut();
    let index = children
        .iter()
        .position(|child| Rc::ptr_eq(child, reference))
        .map(|i| i + 1)
        .unwrap_or(children.len());
    new_node.parent.set(Some(Rc::downgrade(&parent)));
    children.insert(index, new_node);
    true
}

/// 用新列表整体替换子节点
pub fn replace_children(node: &Handle, new_children: Vec<Handle>) {
    let old: Vec<Handle> = node.children.borrow_mut().drain(..).collect();
    for child in old {
        child.parent.set(None);
    }
    for child in new_children {
        child.parent.set(Some(Rc::downgrade(node)));
        node.children.borrow_mut().push(child);
    }
}

/// 等价于设置 `textContent`
pub fn set_text(node: &Handle, text: &str) {
    replace_children(node, vec![create_text(text)]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{descendants, get_node_name, html_to_dom, inner_html};

    fn body(dom: &markup5ever_rcdom::RcDom) -> Handle {
        descendants(&dom.document)
            .into_iter()
            .find(|n| get_node_name(n) == Some("body"))
            .expect("body should exist")
    }

    #[test]
    fn test_insert_after_and_remove() {
        let dom = html_to_dom(b"<p>a</p><p>c</p>", "utf-8");
        let body = body(&dom);
        let first = body.children.borrow()[0].clone();

        let span = create_element("span", &[("class", "extra")]);
        append_child(&span, create_text("b"));
        assert!(insert_after(&first, span.clone()));
        assert_eq!(
            inner_html(&body),
            "<p>a</p><span class=\"extra\">b</span><p>c</p>"
        );

        remove_node(&span);
        assert_eq!(inner_html(&body), "<p>a</p><p>c</p>");
        assert!(get_parent_node(&span).is_none());
    }

    #[test]
    fn test_insert_after_detached_reference() {
        let loose = create_element("p", &[]);
        assert!(!insert_after(&loose, create_text("x")));
    }

    #[test]
    fn test_set_text_escapes_markup() {
        let p = create_element("p", &[]);
        set_text(&p, "<b>not bold</b>");
        assert_eq!(inner_html(&p), "&lt;b&gt;not bold&lt;/b&gt;");
    }
}
