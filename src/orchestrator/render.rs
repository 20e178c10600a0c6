//! 译文写回：双语追加、整段替换、按钮文本，以及恢复与膨胀判定用到的度量

use std::sync::OnceLock;

use markup5ever_rcdom::{Handle, NodeData};
use regex::{Captures, Regex};

use crate::config::constants::PARAGRAPH_SEPARATOR;
use crate::config::ServiceKind;
use crate::dom::{
    add_class, append_child, create_element, create_text, descendants, element_children,
    get_node_attr, get_node_name, has_class, insert_after, outer_html, remove_class, remove_node,
    set_node_attr, text_content,
};
use crate::selection::rules::{
    is_artifact, is_inline_tag, BILINGUAL_CLASS, BILINGUAL_CONTENT_CLASS, RETRY_CLASS,
};

fn separator_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| compile(&format!(r"\s*{}\s*", regex::escape(PARAGRAPH_SEPARATOR))))
        .as_ref()
}

fn svg_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            compile(
                r"(?i)viewbox|preserveaspectratio|clippathunits|gradienttransform|patterncontentunits|lineargradient|clippath",
            )
        })
        .as_ref()
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("正则编译失败 {}: {}", pattern, e);
            None
        }
    }
}

/// 多段落合并翻译时的拼接
pub fn join_blocks(blocks: &[Handle]) -> String {
    blocks
        .iter()
        .map(|block| text_content(block).trim().to_string())
        .collect::<Vec<_>>()
        .join(&format!("\n{}\n", PARAGRAPH_SEPARATOR))
}

/// 按分隔符拆分译文，丢弃空段
pub fn split_parts(text: &str) -> Vec<String> {
    let parts: Vec<String> = match separator_pattern() {
        Some(re) => re.split(text).map(str::to_string).collect(),
        None => text
            .split(PARAGRAPH_SEPARATOR)
            .map(|p| p.trim().to_string())
            .collect(),
    };
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

fn translation_node(text: &str, style_class: Option<&str>) -> Handle {
    let class = match style_class.filter(|c| !c.is_empty()) {
        Some(style) => format!("{} {}", BILINGUAL_CONTENT_CLASS, style),
        None => BILINGUAL_CONTENT_CLASS.to_string(),
    };
    let span = create_element("span", &[("class", &class)]);
    append_child(&span, create_text(text));
    span
}

/// 解除行数截断，否则追加的译文会被裁掉
pub fn smash_truncation_style(node: &Handle) {
    let existing = get_node_attr(node, "style").unwrap_or_default();
    let mut declarations: Vec<String> = existing
        .split(';')
        .map(str::trim)
        .filter(|decl| !decl.is_empty())
        .filter(|decl| {
            let property = decl.split(':').next().unwrap_or_default().trim().to_lowercase();
            property != "-webkit-line-clamp" && property != "max-height"
        })
        .map(str::to_string)
        .collect();
    declarations.push("-webkit-line-clamp: unset".to_string());
    declarations.push("max-height: unset".to_string());

    set_node_attr(node, "style", Some(format!("{};", declarations.join("; "))));
}

/// 把译文段落逐一挂到对应块上，返回配对数
pub fn pair_blocks(blocks: &[Handle], parts: &[String], style_class: Option<&str>) -> usize {
    let count = blocks.len().min(parts.len());
    for (block, part) in blocks.iter().zip(parts.iter()).take(count) {
        add_class(block, BILINGUAL_CLASS);
        smash_truncation_style(block);
        append_child(block, translation_node(part, style_class));
    }
    count
}

/// 双语模式下追加译文
///
/// 依次尝试：按段落块配对、按 `<br>` 分行插入、整体追加
pub fn append_bilingual(
    node: &Handle,
    text: &str,
    blocks: &[Handle],
    style_class: Option<&str>,
) {
    let parts = split_parts(text);

    if parts.len() > 1 && blocks.len() >= parts.len() {
        pair_blocks(&blocks[..parts.len()], &parts, style_class);
        return;
    }

    if parts.len() > 1 {
        let breaks: Vec<Handle> = descendants(node)
            .into_iter()
            .filter(|n| get_node_name(n) == Some("br"))
            .collect();

        if breaks.len() + 1 >= parts.len() {
            for (i, part) in parts.iter().enumerate() {
                let line = translation_node(part, style_class);
                match breaks.get(i) {
                    Some(br) if insert_after(br, line.clone()) => {}
                    _ => append_child(node, line),
                }
            }
            add_class(node, BILINGUAL_CLASS);
            return;
        }
    }

    add_class(node, BILINGUAL_CLASS);
    smash_truncation_style(node);
    append_child(node, translation_node(text, style_class));
}

/// 替换模式的原文：机器翻译类服务取纯文本（段落类标签）或内层标记，
/// 大模型服务取保留内联标记的规整文本
pub fn replace_source(node: &Handle, service: ServiceKind) -> String {
    if !service.is_machine() {
        return llm_standard_html(node);
    }

    match get_node_name(node) {
        Some("div" | "p" | "li" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6") => text_content(node),
        _ => crate::dom::inner_html(node),
    }
}

/// 文本原样拼接，内联元素保留外层标记，其余元素递归展开
pub fn llm_standard_html(node: &Handle) -> String {
    let mut out = String::new();
    for child in node.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => out.push_str(&contents.borrow()),
            NodeData::Element { name, .. } => {
                if is_inline_tag(&name.local) {
                    out.push_str(&outer_html(child));
                } else {
                    out.push_str(&llm_standard_html(child));
                }
            }
            _ => {}
        }
    }
    out
}

/// HTML 解析会把 SVG 中区分大小写的名称转成小写，写回前复原
pub fn restore_svg_case(text: &str) -> String {
    let Some(re) = svg_pattern() else {
        return text.to_string();
    };

    re.replace_all(text, |caps: &Captures| {
        match caps[0].to_lowercase().as_str() {
            "viewbox" => "viewBox",
            "preserveaspectratio" => "preserveAspectRatio",
            "clippathunits" => "clipPathUnits",
            "gradienttransform" => "gradientTransform",
            "patterncontentunits" => "patternContentUnits",
            "lineargradient" => "linearGradient",
            "clippath" => "clipPath",
            _ => return caps[0].to_string(),
        }
        .to_string()
    })
    .into_owned()
}

/// 不计译文产物的非空白字符数
pub fn content_len(node: &Handle) -> usize {
    let mut count = 0;
    let mut stack = vec![node.clone()];

    while let Some(current) = stack.pop() {
        match &current.data {
            NodeData::Text { contents } => {
                count += contents.borrow().chars().filter(|c| !c.is_whitespace()).count();
            }
            NodeData::Element { .. } => {
                if is_artifact(&current) {
                    continue;
                }
                stack.extend(current.children.borrow().iter().cloned());
            }
            _ => stack.extend(current.children.borrow().iter().cloned()),
        }
    }

    count
}

/// 移除节点内的译文、加载和失败提示，以及双语类名
pub fn strip_artifacts(node: &Handle) {
    for element in descendants(node) {
        if is_artifact(&element) {
            remove_node(&element);
        } else if has_class(&element, BILINGUAL_CLASS) {
            remove_class(&element, BILINGUAL_CLASS);
        }
    }
    remove_class(node, BILINGUAL_CLASS);
}

/// 移除节点直接挂载的失败提示
pub fn strip_retry_tips(node: &Handle) {
    for child in element_children(node) {
        if has_class(&child, RETRY_CLASS) {
            remove_node(&child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{html_to_dom, inner_html};
    use markup5ever_rcdom::RcDom;

    fn first(dom: &RcDom, tag: &str) -> Handle {
        descendants(&dom.document)
            .into_iter()
            .find(|n| get_node_name(n) == Some(tag))
            .expect("element should exist")
    }

    #[test]
    fn test_split_and_join() {
        assert_eq!(
            split_parts("一 %% 二\n%%\n三%%"),
            vec!["一".to_string(), "二".to_string(), "三".to_string()]
        );

        let dom = html_to_dom(b"<div><p> A </p><p>B</p></div>", "utf-8");
        let blocks: Vec<Handle> = descendants(&dom.document)
            .into_iter()
            .filter(|n| get_node_name(n) == Some("p"))
            .collect();
        assert_eq!(join_blocks(&blocks), "A\n%%\nB");
    }

    #[test]
    fn test_append_single_translation() {
        let dom = html_to_dom(
            b"<p style=\"color: red; -webkit-line-clamp: 3\">Hello</p>",
            "utf-8",
        );
        let p = first(&dom, "p");

        append_bilingual(&p, "你好", &[], Some("fr-style-underline"));

        assert!(has_class(&p, BILINGUAL_CLASS));
        assert_eq!(
            inner_html(&p),
            "Hello<span class=\"fluent-read-bilingual-content fr-style-underline\">你好</span>"
        );
        assert_eq!(
            get_node_attr(&p, "style").as_deref(),
            Some("color: red; -webkit-line-clamp: unset; max-height: unset;")
        );
    }

    #[test]
    fn test_append_after_line_breaks() {
        let dom = html_to_dom(b"<div>one<br>two</div>", "utf-8");
        let div = first(&dom, "div");

        append_bilingual(&div, "一%%二", &[], None);

        assert_eq!(
            inner_html(&div),
            "one<br><span class=\"fluent-read-bilingual-content\">一</span>two<span class=\"fluent-read-bilingual-content\">二</span>"
        );
    }

    #[test]
    fn test_pairing_truncates_to_shorter_side() {
        let dom = html_to_dom(b"<div><p>a</p><p>b</p><p>c</p></div>", "utf-8");
        let blocks: Vec<Handle> = descendants(&dom.document)
            .into_iter()
            .filter(|n| get_node_name(n) == Some("p"))
            .collect();

        let parts = vec!["甲".to_string(), "乙".to_string()];
        assert_eq!(pair_blocks(&blocks, &parts, None), 2);
        assert!(has_class(&blocks[1], BILINGUAL_CLASS));
        assert!(!has_class(&blocks[2], BILINGUAL_CLASS));
    }

    #[test]
    fn test_llm_standard_html_keeps_inline_markup() {
        let dom = html_to_dom(
            b"<div>Intro <a href=\"/x\">link</a><section>Nested <b>bold</b></section></div>",
            "utf-8",
        );
        let div = first(&dom, "div");

        assert_eq!(
            llm_standard_html(&div),
            "Intro <a href=\"/x\">link</a>Nested <b>bold</b>"
        );
        assert_eq!(replace_source(&div, ServiceKind::DeepLx), "Intro linkNested bold");
    }

    #[test]
    fn test_svg_case_restored() {
        assert_eq!(
            restore_svg_case("<svg viewbox=\"0 0 1 1\"><clippath></clippath></svg>"),
            "<svg viewBox=\"0 0 1 1\"><clipPath></clipPath></svg>"
        );
    }

    #[test]
    fn test_content_len_ignores_artifacts() {
        let dom = html_to_dom(
            b"<p>ab c<span class=\"fluent-read-bilingual-content\">ignored</span></p>",
            "utf-8",
        );
        let p = first(&dom, "p");
        assert_eq!(content_len(&p), 3);

        strip_artifacts(&p);
        assert_eq!(inner_html(&p), "ab c");
    }
}
