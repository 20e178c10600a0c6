//! 主内容区域与页面框架（导航、侧栏、页脚、广告等）识别

use std::sync::OnceLock;

use markup5ever_rcdom::Handle;
use regex::Regex;

use crate::dom::{descendants, get_node_attr, get_node_name, get_parent_node};

const MAIN_TAGS: &[&str] = &["main", "article"];
const CHROME_TAGS: &[&str] = &["nav", "aside", "footer", "header"];
const CHROME_ROLES: &[&str] = &["navigation", "complementary", "banner", "contentinfo"];

const MAIN_PATTERNS: &[&str] = &[
    r"(^|\s|[_-])(main|content|article|post|entry|story|body)([_-]|$|\s)",
    r"(content[_-]?(area|main|primary|body)|main[_-]?(content|area|body))",
    r"(post[_-]?(content|body|text)|article[_-]?(content|body|text))",
    r"(page[_-]?content|content[_-]?page|page[_-]?body)",
    r"(primary[_-]?content|content[_-]?primary)",
    r"(reader|reading[_-]?area|text[_-]?content)",
    r"^(container|wrapper)[_-]?(main|primary|content)$",
];

const CHROME_PATTERNS: &[&str] = &[
    // 侧栏
    r"(sidebar|side[_-]?bar|side[_-]?panel|side[_-]?nav)",
    r"\b(side|right[_-]?side|left[_-]?side)\b",
    r"(column[_-]?container|col[_-]?(lg|md|sm|xs))[^a-z]*sidebar",
    // 导航
    r"(^|\s|[_-])(nav|navigation|menu|breadcrumb|tabs?)([_-]|$|\s)",
    r"(top[_-]?nav|main[_-]?nav|primary[_-]?nav)",
    // 页脚、页头
    r"(footer|foot|bottom|copyright|legal)",
    r"(header|head|top|banner|title[_-]?bar)",
    // 广告
    r"(ad|ads|advertisement|advertising|sponsor|promo|promotion)",
    r"(google[_-]?ad|adsense|doubleclick)",
    // 评论、分享、推荐、标签、挂件、元信息
    r"(comment|comments|reply|replies)",
    r"(share|sharing|social|facebook|twitter|linkedin)",
    r"(related|recommend|suggestion|similar|popular|trending)",
    r"(tag|tags|category|categories|label|labels)",
    r"(widget|tool|utility|search[_-]?box)",
    r"(meta|info|author|date|time|published)",
    // 布局容器
    r"(container|wrapper|panel)[_-]?(side|right|left|secondary)",
    r"(right|left)[_-]?(column|col|panel|container)",
    // 目录、个人信息、通知
    r"(toc|table[_-]?of[_-]?contents)",
    r"(profile|user[_-]?info|avatar)",
    r"(notification|alert|message|toast)",
];

struct RegionPatterns {
    main: Vec<Regex>,
    chrome: Vec<Regex>,
}

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(&format!("(?i){}", p)) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!("区域正则编译失败 {}: {}", p, e);
                None
            }
        })
        .collect()
}

fn region_patterns() -> &'static RegionPatterns {
    static PATTERNS: OnceLock<RegionPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| RegionPatterns {
        main: compile_all(MAIN_PATTERNS),
        chrome: compile_all(CHROME_PATTERNS),
    })
}

/// 类名与 id 拼成的小写签名；两者都缺失时返回 `None`
fn signature(node: &Handle) -> Option<String> {
    let class = get_node_attr(node, "class");
    let id = get_node_attr(node, "id");
    if class.is_none() && id.is_none() {
        return None;
    }

    let classes = class
        .map(|c| c.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    Some(format!("{} {}", classes, id.unwrap_or_default()).to_lowercase())
}

fn is_main_signature(node: &Handle) -> bool {
    let Some(tag) = get_node_name(node) else {
        return false;
    };

    if MAIN_TAGS.contains(&tag) || get_node_attr(node, "role").as_deref() == Some("main") {
        return true;
    }

    match signature(node) {
        Some(combined) => region_patterns()
            .main
            .iter()
            .any(|re| re.is_match(&combined)),
        None => false,
    }
}

fn is_chrome_signature(node: &Handle) -> bool {
    let Some(tag) = get_node_name(node) else {
        return false;
    };

    if CHROME_TAGS.contains(&tag) {
        return true;
    }

    if let Some(role) = get_node_attr(node, "role") {
        if CHROME_ROLES.contains(&role.as_str()) {
            return true;
        }
    }

    match signature(node) {
        Some(combined) => region_patterns()
            .chrome
            .iter()
            .any(|re| re.is_match(&combined)),
        None => false,
    }
}

/// 自身起向上遍历，直到 `body` 为止
fn walk_until_body(node: &Handle, mut predicate: impl FnMut(&Handle) -> bool) -> bool {
    let mut current = Some(node.clone());

    while let Some(candidate) = current {
        match get_node_name(&candidate) {
            Some("body") => return false,
            Some(_) => {
                if predicate(&candidate) {
                    return true;
                }
            }
            None => {}
        }
        current = get_parent_node(&candidate);
    }

    false
}

pub fn is_in_main_content(node: &Handle) -> bool {
    walk_until_body(node, is_main_signature)
}

pub fn is_in_chrome(node: &Handle) -> bool {
    walk_until_body(node, is_chrome_signature)
}

/// 文档中是否存在可识别的主内容区域
pub fn has_explicit_main_content(document: &Handle) -> bool {
    descendants(document).iter().any(|node| {
        let tag = get_node_name(node).unwrap_or_default();
        if MAIN_TAGS.contains(&tag) || get_node_attr(node, "role").as_deref() == Some("main") {
            return true;
        }

        let hinted = |value: Option<String>| {
            value
                .map(|v| v.contains("main") || v.contains("content"))
                .unwrap_or(false)
        };
        hinted(get_node_attr(node, "class")) || hinted(get_node_attr(node, "id"))
    })
}

/// 区域判定：主内容内一律放行；存在主内容时区域外一律拒绝；否则只拒绝页面框架
pub fn is_outside_content(node: &Handle, has_main: bool) -> bool {
    if is_in_main_content(node) {
        return false;
    }

    if !has_main {
        return is_in_chrome(node);
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::html_to_dom;

    fn by_id(root: &Handle, id: &str) -> Handle {
        descendants(root)
            .into_iter()
            .find(|n| get_node_attr(n, "id").as_deref() == Some(id))
            .expect("element with id should exist")
    }

    #[test]
    fn test_main_content_detection() {
        let dom = html_to_dom(
            b"<div class=\"post-body\"><p id=\"a\">x</p></div><article><p id=\"b\">y</p></article><div><p id=\"c\">z</p></div>",
            "utf-8",
        );

        assert!(is_in_main_content(&by_id(&dom.document, "a")));
        assert!(is_in_main_content(&by_id(&dom.document, "b")));
        assert!(!is_in_main_content(&by_id(&dom.document, "c")));
        assert!(has_explicit_main_content(&dom.document));
    }

    #[test]
    fn test_structured_document_rejects_outside_main() {
        let dom = html_to_dom(
            b"<main><p id=\"in\">x</p></main><div><p id=\"out\">y</p></div>",
            "utf-8",
        );
        let has_main = has_explicit_main_content(&dom.document);

        assert!(!is_outside_content(&by_id(&dom.document, "in"), has_main));
        assert!(is_outside_content(&by_id(&dom.document, "out"), has_main));
    }

    #[test]
    fn test_permissive_mode_only_rejects_chrome() {
        let dom = html_to_dom(
            b"<nav><p id=\"nav\">x</p></nav><div class=\"sidebar\"><p id=\"side\">y</p></div><div class=\"wrap\"><p id=\"plain\">z</p></div><div class=\"share-links\"><p id=\"share\">s</p></div>",
            "utf-8",
        );
        let has_main = has_explicit_main_content(&dom.document);
        assert!(!has_main);

        assert!(is_outside_content(&by_id(&dom.document, "nav"), has_main));
        assert!(is_outside_content(&by_id(&dom.document, "side"), has_main));
        assert!(is_outside_content(&by_id(&dom.document, "share"), has_main));
        assert!(!is_outside_content(&by_id(&dom.document, "plain"), has_main));
    }
}
