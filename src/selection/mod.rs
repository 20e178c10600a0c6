//! 选择引擎
//!
//! 在任意、持续变化的内容树中找出真正承载可读文本的节点：
//!
//! - `rules`: 标签集合与结构性判定
//! - `numeric`: 数字、日期、版本号、用户标识等非语言文本
//! - `region`: 主内容区域与页面框架识别
//! - `classify`: 单节点分类
//! - `compat`: 按站点注册的覆盖钩子

pub mod classify;
pub mod compat;
pub mod numeric;
pub mod region;
pub mod rules;

use markup5ever_rcdom::Handle;

use crate::dom::{get_node_name, is_element, is_same_node, text_content};

pub use classify::{Selector, TranslationTarget};
pub use compat::{main_domain, OverrideVerdict, SiteOverride, SiteOverrides};
pub use rules::block_children_with_text;

/// 一个翻译单元：分类结果加上派生的源文本
#[derive(Clone, Debug)]
pub struct TranslationUnit {
    pub target: TranslationTarget,
    /// 节点内相对顶层的段落；少于两个时为空
    pub blocks: Vec<Handle>,
    /// 去除首尾空白的纯文本
    pub source_text: String,
}

impl TranslationUnit {
    pub fn new(target: TranslationTarget) -> Self {
        let blocks = if target.is_label() {
            Vec::new()
        } else {
            let found = block_children_with_text(target.node());
            if found.len() >= 2 {
                found
            } else {
                Vec::new()
            }
        };
        let source_text = text_content(target.node()).trim().to_string();

        Self {
            target,
            blocks,
            source_text,
        }
    }

    pub fn node(&self) -> &Handle {
        self.target.node()
    }

    pub fn is_multi_block(&self) -> bool {
        self.blocks.len() >= 2
    }
}

/// 扫描子树，返回所有翻译目标（按节点去重，保持文档顺序）
///
/// 被结构性拒绝的节点连同子树一起跳过；已认领节点的子树不再下探，
/// 段落内的链接随段落一起翻译。根节点本身也参与分类
pub fn grab_all_nodes(root: &Handle, selector: &Selector) -> Vec<TranslationTarget> {
    let mut found: Vec<TranslationTarget> = Vec::new();
    let mut stack = vec![root.clone()];

    while let Some(node) = stack.pop() {
        if is_element(&node) {
            let is_document_root = matches!(get_node_name(&node), Some("html") | Some("body"));
            if !is_document_root && rules::is_structurally_rejected(&node) {
                continue;
            }
            if let Some(target) = selector.classify(&node) {
                push_unique(&mut found, target);
                continue;
            }
        }

        for child in node.children.borrow().iter().rev() {
            if is_element(child) {
                stack.push(child.clone());
            }
        }
    }

    found
}

fn push_unique(found: &mut Vec<TranslationTarget>, target: TranslationTarget) {
    if !found
        .iter()
        .any(|existing| is_same_node(existing.node(), target.node()))
    {
        found.push(target);
    }
}

/// 段落粒度规范化：含两个及以上顶层段落的节点拆成各段落单独翻译
pub fn normalize_targets(targets: Vec<TranslationTarget>) -> Vec<TranslationUnit> {
    let mut expanded: Vec<TranslationTarget> = Vec::new();

    for target in targets {
        if target.is_label() {
            push_unique(&mut expanded, target);
            continue;
        }

        let blocks = block_children_with_text(target.node());
        if blocks.len() >= 2 {
            for block in blocks {
                push_unique(&mut expanded, TranslationTarget::DirectBlock(block));
            }
        } else {
            push_unique(&mut expanded, target);
        }
    }

    expanded.into_iter().map(TranslationUnit::new).collect()
}
