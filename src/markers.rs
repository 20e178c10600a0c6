//! 加载中与失败提示
//!
//! 标记只用于展示，不承载任何状态；恢复时按类名统一清除。

use markup5ever_rcdom::Handle;

use crate::dom::{append_child, create_element, create_text, element_children, has_class, remove_node};
use crate::selection::rules::{LOADING_CLASS, RETRY_CLASS};

const DIM_CLASS: &str = "fluent-read-loading-dim";

/// `acquire` 返回的句柄，交回 `release` 即移除标记
#[derive(Default)]
pub struct MarkerHandle(Option<Handle>);

impl MarkerHandle {
    pub fn none() -> Self {
        Self(None)
    }
}

pub trait VisualMarkers {
    fn acquire(&self, node: &Handle, dim: bool) -> MarkerHandle;

    fn release(&self, handle: MarkerHandle);

    /// 在节点上留下可关闭的失败提示
    fn fail(&self, node: &Handle, message: &str);
}

/// 直接在文档树中插入提示节点
#[derive(Debug, Default, Clone, Copy)]
pub struct DomMarkers;

impl VisualMarkers for DomMarkers {
    fn acquire(&self, node: &Handle, dim: bool) -> MarkerHandle {
        let class = if dim {
            format!("{} {}", LOADING_CLASS, DIM_CLASS)
        } else {
            LOADING_CLASS.to_string()
        };
        let spinner = create_element("span", &[("class", &class), ("aria-hidden", "true")]);
        append_child(node, spinner.clone());
        MarkerHandle(Some(spinner))
    }

    fn release(&self, handle: MarkerHandle) {
        if let Some(spinner) = handle.0 {
            remove_node(&spinner);
        }
    }

    fn fail(&self, node: &Handle, message: &str) {
        for child in element_children(node) {
            if has_class(&child, RETRY_CLASS) {
                remove_node(&child);
            }
        }

        let tip = create_element("span", &[("class", RETRY_CLASS), ("title", message)]);
        append_child(&tip, create_text("⚠"));
        append_child(node, tip);
    }
}

/// 不产生任何可见标记，批处理输出时使用
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMarkers;

impl VisualMarkers for NoopMarkers {
    fn acquire(&self, _node: &Handle, _dim: bool) -> MarkerHandle {
        MarkerHandle::none()
    }

    fn release(&self, _handle: MarkerHandle) {}

    fn fail(&self, _node: &Handle, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{descendants, get_node_name, html_to_dom, inner_html};
    use markup5ever_rcdom::RcDom;

    fn paragraph(html: &[u8]) -> (RcDom, Handle) {
        let dom = html_to_dom(html, "utf-8");
        let p = descendants(&dom.document)
            .into_iter()
            .find(|n| get_node_name(n) == Some("p"))
            .expect("paragraph");
        (dom, p)
    }

    #[test]
    fn test_acquire_and_release() {
        let (_dom, p) = paragraph(b"<p>Hello</p>");
        let handle = DomMarkers.acquire(&p, true);

        assert!(inner_html(&p).contains(LOADING_CLASS));
        assert!(inner_html(&p).contains(DIM_CLASS));

        DomMarkers.release(handle);
        assert_eq!(inner_html(&p), "Hello");
    }

    #[test]
    fn test_fail_replaces_previous_tip() {
        let (_dom, p) = paragraph(b"<p>Hello</p>");
        DomMarkers.fail(&p, "first");
        DomMarkers.fail(&p, "second");

        let html = inner_html(&p);
        assert_eq!(html.matches(RETRY_CLASS).count(), 1);
        assert!(html.contains("second"));
    }
}
