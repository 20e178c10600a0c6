use std::rc::Rc;

use html5ever::interface::{Attribute, QualName};
use html5ever::tendril::format_tendril;
use html5ever::{ns, namespace_url, LocalName};
use markup5ever_rcdom::{Handle, NodeData};

/// 判断两个句柄是否指向同一节点
pub fn is_same_node(a: &Handle, b: &Handle) -> bool {
    Rc::ptr_eq(a, b)
}

/// 是否为元素节点
pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// 设置节点属性，`None` 表示移除
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let mut i = 0;
        let mut found_existing_attr: bool = false;

        while i < attrs_mut.len() {
            if &attrs_mut[i].name.local == attr_name {
                found_existing_attr = true;

                if let Some(attr_value) = attr_value.clone() {
                    attrs_mut[i].value.clear();
                    attrs_mut[i].value.push_slice(attr_value.as_str());
                } else {
                    // Remove attr completely if attr_value is not defined
                    attrs_mut.remove(i);
                    continue;
                }
            }

            i += 1;
        }

        if !found_existing_attr {
            if let Some(attr_value) = attr_value {
                attrs_mut.push(Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                    value: format_tendril!("{}", attr_value),
                });
            }
        }
    };
}

/// 获取父节点
///
/// `parent` 字段是 `Cell<Option<Weak>>`，读取时必须放回原值
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    child.parent.set(weak);
    parent
}

/// 自下而上的祖先迭代器（不含自身）
pub struct Ancestors {
    next: Option<Handle>,
}

impl Iterator for Ancestors {
    type Item = Handle;

    fn next(&mut self) -> Option<Handle> {
        let current = self.next.take()?;
        self.next = get_parent_node(&current);
        Some(current)
    }
}

pub fn ancestors(node: &Handle) -> Ancestors {
    Ancestors {
        next: get_parent_node(node),
    }
}

/// 元素子节点
pub fn element_children(node: &Handle) -> Vec<Handle> {
    node.children
        .borrow()
        .iter()
        .filter(|child| is_element(child))
        .cloned()
        .collect()
}

/// 按文档顺序列出所有后代元素（不含自身）
pub fn descendants(node: &Handle) -> Vec<Handle> {
    let mut found = Vec::new();
    let mut stack: Vec<Handle> = node.children.borrow().iter().rev().cloned().collect();

    while let Some(current) = stack.pop() {
        if is_element(&current) {
            found.push(current.clone());
        }
        for child in current.children.borrow().iter().rev() {
            stack.push(child.clone());
        }
    }

    found
}

/// 等价于 DOM 的 `textContent`
pub fn text_content(node: &Handle) -> String {
    let mut text = String::new();
    let mut stack = vec![node.clone()];

    while let Some(current) = stack.pop() {
        match &current.data {
            NodeData::Text { contents } => text.push_str(&contents.borrow()),
            NodeData::Element { .. } | NodeData::Document => {
                for child in current.children.borrow().iter().rev() {
                    stack.push(child.clone());
                }
            }
            _ => {}
        }
    }

    text
}

/// 节点内每个非空文本节点（已去除首尾空白）
pub fn text_runs(node: &Handle) -> Vec<String> {
    let mut runs = Vec::new();
    let mut stack = vec![node.clone()];

    while let Some(current) = stack.pop() {
        if let NodeData::Text { contents } = &current.data {
            let trimmed = contents.borrow().trim().to_string();
            if !trimmed.is_empty() {
                runs.push(trimmed);
            }
            continue;
        }
        for child in current.children.borrow().iter().rev() {
            stack.push(child.clone());
        }
    }

    runs
}

fn class_list(node: &Handle) -> Vec<String> {
    get_node_attr(node, "class")
        .map(|value| value.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn has_class(node: &Handle, class_name: &str) -> bool {
    class_list(node).iter().any(|c| c == class_name)
}

pub fn add_class(node: &Handle, class_name: &str) {
    let mut classes = class_list(node);
    if classes.iter().any(|c| c == class_name) {
        return;
    }
    classes.push(class_name.to_string());
    set_node_attr(node, "class", Some(classes.join(" ")));
}

/// 移除类名；类列表清空时连同 `class` 属性一起移除
pub fn remove_class(node: &Handle, class_name: &str) {
    let classes = class_list(node);
    if !classes.iter().any(|c| c == class_name) {
        return;
    }
    let remaining: Vec<String> = classes.into_iter().filter(|c| c != class_name).collect();
    if remaining.is_empty() {
        set_node_attr(node, "class", None);
    } else {
        set_node_attr(node, "class", Some(remaining.join(" ")));
    }
}

/// 节点自身或祖先声明了可编辑
pub fn is_content_editable(node: &Handle) -> bool {
    let mut current = Some(node.clone());

    while let Some(candidate) = current {
        if let Some(value) = get_node_attr(&candidate, "contenteditable") {
            match value.to_ascii_lowercase().as_str() {
                "" | "true" | "plaintext-only" => return true,
                "false" => return false,
                _ => {}
            }
        }
        current = get_parent_node(&candidate);
    }

    false
}
