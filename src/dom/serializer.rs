use encoding_rs::Encoding;
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::{local_name, namespace_url, ns, parse_document, parse_fragment, QualName};
use markup5ever_rcdom::{Handle, RcDom, SerializableHandle};

use super::mutate::replace_children;
use super::node::{element_children, get_node_name};

/// 把原始字节按给定字符集解码后解析为文档
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> RcDom {
    let s: String = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => {
            let (string, _, _) = encoding.decode(data);
            string.to_string()
        }
        None => String::from_utf8_lossy(data).to_string(),
    };

    parse_document(RcDom::default(), Default::default()).one(s)
}

fn serialize_with_scope(node: &Handle, scope: TraversalScope) -> String {
    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = node.clone().into();
    let opts = SerializeOpts {
        traversal_scope: scope,
        ..Default::default()
    };

    if let Err(e) = serialize(&mut buf, &serializable, opts) {
        tracing::warn!("节点序列化失败: {}", e);
        return String::new();
    }

    String::from_utf8_lossy(&buf).into_owned()
}

/// 等价于 DOM 的 `innerHTML` 读取
pub fn inner_html(node: &Handle) -> String {
    serialize_with_scope(node, TraversalScope::ChildrenOnly(None))
}

/// 等价于 DOM 的 `outerHTML`
pub fn outer_html(node: &Handle) -> String {
    serialize_with_scope(node, TraversalScope::IncludeNode)
}

/// 以 `div` 为上下文解析片段，返回顶层节点（已脱离临时文档）
pub fn parse_html_fragment(html: &str) -> Vec<Handle> {
    let fragment = parse_fragment(
        RcDom::default(),
        Default::default(),
        QualName::new(None, ns!(html), local_name!("div")),
        vec![],
    )
    .one(html);

    // 片段解析结果挂在合成的 <html> 元素之下。
    // 必须先把子节点从该元素上摘走，否则 rcdom 的 Drop 会清空它们的后代
    element_children(&fragment.document)
        .into_iter()
        .find(|n| get_node_name(n) == Some("html"))
        .map(|root| take_children(&root))
        .unwrap_or_default()
}

/// 摘下全部子节点
pub fn take_children(node: &Handle) -> Vec<Handle> {
    let children: Vec<Handle> = node.children.borrow_mut().drain(..).collect();
    for child in &children {
        child.parent.set(None);
    }
    children
}

/// 等价于 DOM 的 `innerHTML` 写入
pub fn set_inner_html(node: &Handle, html: &str) {
    replace_children(node, parse_html_fragment(html));
}

/// 序列化整个文档并按原字符集重新编码
pub fn serialize_document(dom: &RcDom, document_encoding: &str) -> Vec<u8> {
    let html = serialize_with_scope(&dom.document, TraversalScope::ChildrenOnly(None));

    if !document_encoding.is_empty() {
        if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
            let (data, _, _) = encoding.encode(&html);
            return data.to_vec();
        }
    }

    html.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::node::{descendants, text_content};

    fn first(dom: &RcDom, tag: &str) -> Handle {
        descendants(&dom.document)
            .into_iter()
            .find(|n| get_node_name(n) == Some(tag))
            .expect("element should exist")
    }

    #[test]
    fn test_inner_and_outer_html() {
        let dom = html_to_dom(b"<p class=\"x\">Hello <b>world</b></p>", "utf-8");
        let p = first(&dom, "p");

        assert_eq!(inner_html(&p), "Hello <b>world</b>");
        assert_eq!(outer_html(&p), "<p class=\"x\">Hello <b>world</b></p>");
    }

    #[test]
    fn test_set_inner_html_reparents_children() {
        let dom = html_to_dom(b"<div id=\"t\">old</div>", "utf-8");
        let div = first(&dom, "div");

        set_inner_html(&div, "new <i>text</i> &amp; more");

        assert_eq!(inner_html(&div), "new <i>text</i> &amp; more");
        assert_eq!(text_content(&div), "new text & more");
        let italic = first(&dom, "i");
        let parent = crate::dom::get_parent_node(&italic).expect("fragment child is linked");
        assert!(crate::dom::is_same_node(&parent, &div));
    }

    #[test]
    fn test_serialize_document_keeps_encoding() {
        let dom = html_to_dom("<p>café</p>".as_bytes(), "utf-8");
        let out = serialize_document(&dom, "utf-8");
        let text = String::from_utf8(out).expect("valid utf-8");
        assert!(text.contains("<p>café</p>"));
    }
}
