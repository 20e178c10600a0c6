//! 两路输入：可见性事件与变更记录

use std::cell::{Cell, RefCell};

use markup5ever_rcdom::Handle;

use crate::config::SessionConfig;
use crate::dom::{ancestors, is_element, is_same_node};
use crate::selection::rules::is_artifact;

/// 节点与视口的相交变化
#[derive(Clone)]
pub struct VisibilityEvent {
    pub node: Handle,
    pub is_intersecting: bool,
}

impl VisibilityEvent {
    pub fn visible(node: Handle) -> Self {
        Self {
            node,
            is_intersecting: true,
        }
    }
}

/// 子树变更记录
#[derive(Clone)]
pub enum MutationRecord {
    ChildList {
        target: Handle,
        added: Vec<Handle>,
        removed: Vec<Handle>,
    },
    CharacterData {
        target: Handle,
    },
    Attributes {
        target: Handle,
        name: String,
    },
}

impl MutationRecord {
    pub fn target(&self) -> &Handle {
        match self {
            MutationRecord::ChildList { target, .. }
            | MutationRecord::CharacterData { target }
            | MutationRecord::Attributes { target, .. } => target,
        }
    }

    /// 由会话自己的写入引起：增删的都是译文产物、发生在产物内部，
    /// 或只是会话标记属性的变化
    pub fn is_self_inflicted(&self) -> bool {
        match self {
            MutationRecord::ChildList { target, added, removed } => {
                inside_artifact(target)
                    || (!(added.is_empty() && removed.is_empty())
                        && added
                            .iter()
                            .chain(removed.iter())
                            .all(|n| is_artifact(n) || (!is_element(n) && inside_artifact(n))))
            }
            MutationRecord::CharacterData { target } => inside_artifact(target),
            MutationRecord::Attributes { target, name } => {
                name.starts_with("data-fr-") || inside_artifact(target)
            }
        }
    }
}

fn inside_artifact(node: &Handle) -> bool {
    (is_element(node) && is_artifact(node)) || ancestors(node).any(|a| is_artifact(&a))
}

/// 视口判定参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityOptions {
    /// 视口向外扩展的像素数，节点提前进入判定范围
    pub root_margin_px: u32,
    /// 可见面积占比达到该值才算进入视口
    pub threshold: f64,
}

impl VisibilityOptions {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            root_margin_px: config.root_margin_px,
            threshold: config.visibility_threshold,
        }
    }
}

/// 可见性来源（浏览器中的 IntersectionObserver）
pub trait VisibilityFeed {
    /// 会话启动时下发视口参数
    fn configure(&self, _options: VisibilityOptions) {}
    fn observe(&self, node: &Handle);
    fn unobserve(&self, node: &Handle);
    fn disconnect(&self);
}

/// 变更来源（浏览器中的 MutationObserver）
pub trait MutationFeed {
    fn observe(&self, root: &Handle);
    fn disconnect(&self);
}

/// 只记录登记情况的来源，由调用方决定何时投递事件
#[derive(Default)]
pub struct RecordingFeed {
    observed: RefCell<Vec<Handle>>,
    roots: RefCell<Vec<Handle>>,
    options: Cell<Option<VisibilityOptions>>,
    disconnects: Cell<usize>,
}

impl RecordingFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observed(&self) -> Vec<Handle> {
        self.observed.borrow().clone()
    }

    pub fn is_observing(&self, node: &Handle) -> bool {
        self.observed.borrow().iter().any(|n| is_same_node(n, node))
    }

    /// 取出当前全部登记节点
    pub fn take_observed(&self) -> Vec<Handle> {
        std::mem::take(&mut *self.observed.borrow_mut())
    }

    pub fn roots(&self) -> Vec<Handle> {
        self.roots.borrow().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.get()
    }

    pub fn options(&self) -> Option<VisibilityOptions> {
        self.options.get()
    }
}

impl VisibilityFeed for RecordingFeed {
    fn configure(&self, options: VisibilityOptions) {
        self.options.set(Some(options));
    }

    fn observe(&self, node: &Handle) {
        if !self.is_observing(node) {
            self.observed.borrow_mut().push(node.clone());
        }
    }

    fn unobserve(&self, node: &Handle) {
        self.observed.borrow_mut().retain(|n| !is_same_node(n, node));
    }

    fn disconnect(&self) {
        self.observed.borrow_mut().clear();
        self.disconnects.set(self.disconnects.get() + 1);
    }
}

impl MutationFeed for RecordingFeed {
    fn observe(&self, root: &Handle) {
        self.roots.borrow_mut().push(root.clone());
    }

    fn disconnect(&self) {
        self.roots.borrow_mut().clear();
        self.disconnects.set(self.disconnects.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{create_element, create_text, descendants, get_node_name, html_to_dom};

    #[test]
    fn test_self_inflicted_detection() {
        let dom = html_to_dom(
            b"<p>Hi<span class=\"fluent-read-bilingual-content\">x</span></p>",
            "utf-8",
        );
        let nodes = descendants(&dom.document);
        let p = nodes.iter().find(|n| get_node_name(n) == Some("p")).unwrap().clone();
        let span = nodes.iter().find(|n| get_node_name(n) == Some("span")).unwrap().clone();
        let inner_text = span.children.borrow()[0].clone();

        let own = MutationRecord::ChildList {
            target: p.clone(),
            added: vec![span.clone()],
            removed: vec![],
        };
        assert!(own.is_self_inflicted());
        assert!(MutationRecord::CharacterData { target: inner_text }.is_self_inflicted());
        assert!(MutationRecord::Attributes {
            target: p.clone(),
            name: "data-fr-processing".into()
        }
        .is_self_inflicted());

        let organic = MutationRecord::ChildList {
            target: p.clone(),
            added: vec![create_text("more"), create_element("em", &[])],
            removed: vec![],
        };
        assert!(!organic.is_self_inflicted());
    }

    #[test]
    fn test_recording_feed() {
        let dom = html_to_dom(b"<p>a</p>", "utf-8");
        let p = descendants(&dom.document)
            .into_iter()
            .find(|n| get_node_name(n) == Some("p"))
            .unwrap();
        let feed = RecordingFeed::new();

        VisibilityFeed::observe(&feed, &p);
        VisibilityFeed::observe(&feed, &p);
        assert_eq!(feed.observed().len(), 1);

        feed.unobserve(&p);
        assert!(!feed.is_observing(&p));

        VisibilityFeed::observe(&feed, &p);
        assert_eq!(feed.take_observed().len(), 1);
        assert!(feed.observed().is_empty());
    }
}
