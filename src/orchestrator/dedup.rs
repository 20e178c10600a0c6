//! 在途指纹集合
//!
//! 同一段内容在短时间内被悬停和自动扫描重复触发时只处理一次。
//! 条目要么一直持有到显式释放，要么带一个到期时间。

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use markup5ever_rcdom::Handle;
use regex::Regex;
use tokio::time::Instant;

use crate::dom::outer_html;

fn marker_attr_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| match Regex::new(r#"\s+data-fr-[a-z-]+="[^"]*""#) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!("指纹正则编译失败: {}", e);
                None
            }
        })
        .as_ref()
}

/// 节点指纹：外层 HTML 去掉会话自己的标记属性
pub fn fingerprint(node: &Handle) -> String {
    let html = outer_html(node);
    match marker_attr_pattern() {
        Some(re) => re.replace_all(&html, "").into_owned(),
        None => html,
    }
}

#[derive(Debug, Default)]
pub struct InFlightSet {
    entries: HashMap<String, Option<Instant>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn purge(&mut self) {
        let now = Instant::now();
        self.entries
            .retain(|_, expiry| expiry.map_or(true, |deadline| deadline > now));
    }

    pub fn contains(&mut self, fingerprint: &str) -> bool {
        self.purge();
        self.entries.contains_key(fingerprint)
    }

    /// 登记为在途；已存在时返回 false
    pub fn insert(&mut self, fingerprint: &str) -> bool {
        self.purge();
        if self.entries.contains_key(fingerprint) {
            return false;
        }
        self.entries.insert(fingerprint.to_string(), None);
        true
    }

    /// 保留一段时间后自动失效
    pub fn hold_for(&mut self, fingerprint: &str, window: Duration) {
        self.entries
            .insert(fingerprint.to_string(), Some(Instant::now() + window));
    }

    pub fn release(&mut self, fingerprint: &str) {
        self.entries.remove(fingerprint);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&mut self) -> usize {
        self.purge();
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{descendants, get_node_name, html_to_dom, set_node_attr};

    #[test]
    fn test_fingerprint_ignores_session_markers() {
        let dom = html_to_dom(b"<p class=\"a\">Hello</p>", "utf-8");
        let p = descendants(&dom.document)
            .into_iter()
            .find(|n| get_node_name(n) == Some("p"))
            .unwrap();
        let before = fingerprint(&p);

        set_node_attr(&p, "data-fr-node-id", Some("fr-node-3".into()));
        set_node_attr(&p, "data-fr-processing", Some("true".into()));

        assert_eq!(fingerprint(&p), before);
        assert_eq!(before, "<p class=\"a\">Hello</p>");
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expires() {
        let mut set = InFlightSet::new();

        assert!(set.insert("x"));
        assert!(!set.insert("x"));

        set.hold_for("x", Duration::from_millis(250));
        assert!(set.contains("x"));

        tokio::time::advance(Duration::from_millis(251)).await;
        assert!(!set.contains("x"));
        assert!(set.insert("x"));

        set.release("x");
        assert_eq!(set.len(), 0);
    }
}
