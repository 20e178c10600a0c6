//! 单元状态机与旁路登记表
//!
//! 状态存放在以单元 id 为键的表中，不依赖节点在树中的位置；
//! 节点上只留三个标记属性，恢复后全部移除。

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use markup5ever_rcdom::Handle;

use super::dedup::fingerprint;
use super::render::{content_len, strip_retry_tips};
use crate::dom::{ancestors, get_node_attr, inner_html, is_same_node, set_inner_html, set_node_attr};

pub const TRANSLATED_ATTR: &str = "data-fr-translated";
pub const NODE_ID_ATTR: &str = "data-fr-node-id";
pub const PROCESSING_ATTR: &str = "data-fr-processing";
pub const MARKER_ATTRS: &[&str] = &[TRANSLATED_ATTR, NODE_ID_ATTR, PROCESSING_ATTR];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Untouched,
    Processing,
    Translated,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitEvent {
    /// 进入视口或被手动触发
    Activate,
    Complete,
    Fail,
    /// 无需翻译（语言相同、译文与原文一致、任务取消）
    Skip,
    Restore,
    /// 已翻译内容明显变长
    ContentExpanded,
}

/// 状态转移；返回 `None` 表示该事件在当前状态下被拒绝
pub fn transition(phase: Phase, event: UnitEvent) -> Option<Phase> {
    use Phase::*;
    use UnitEvent::*;

    match (phase, event) {
        (Untouched | Failed, Activate) => Some(Processing),
        (Processing, Complete) => Some(Translated),
        (Processing, Fail) => Some(Failed),
        (Processing, Skip) => Some(Untouched),
        (Translated, ContentExpanded) => Some(Untouched),
        (_, Restore) => Some(Untouched),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fr-node-{}", self.0)
    }
}

/// 恢复所需的快照
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub inner_html: String,
    pub style: Option<String>,
    pub class: Option<String>,
    /// 不含译文产物的非空白字符数
    pub content_len: usize,
}

impl Snapshot {
    pub fn take(node: &Handle) -> Self {
        Self {
            inner_html: inner_html(node),
            style: get_node_attr(node, "style"),
            class: get_node_attr(node, "class"),
            content_len: content_len(node),
        }
    }
}

pub struct UnitRecord {
    pub id: UnitId,
    pub node: Handle,
    pub phase: Phase,
    pub snapshot: Snapshot,
    /// 膨胀判定的基准长度
    pub baseline_len: usize,
    /// 激活时节点的指纹
    pub fingerprint: String,
}

impl UnitRecord {
    /// 按快照还原节点内容、类名和样式，并移除标记属性
    pub fn restore(&self) {
        let node = &self.node;
        set_inner_html(node, &self.snapshot.inner_html);
        for attr in MARKER_ATTRS {
            set_node_attr(node, attr, None);
        }
        set_node_attr(node, "class", self.snapshot.class.clone());
        set_node_attr(node, "style", self.snapshot.style.clone());
    }
}

pub(crate) fn node_key(node: &Handle) -> usize {
    Rc::as_ptr(node) as usize
}

#[derive(Default)]
pub struct Registry {
    records: HashMap<UnitId, UnitRecord>,
    by_node: HashMap<usize, UnitId>,
    next_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, node: &Handle) -> Option<UnitId> {
        self.by_node.get(&node_key(node)).copied()
    }

    pub fn get(&self, id: UnitId) -> Option<&UnitRecord> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut UnitRecord> {
        self.records.get_mut(&id)
    }

    pub fn phase_of(&self, node: &Handle) -> Option<Phase> {
        self.find(node)
            .and_then(|id| self.records.get(&id))
            .map(|record| record.phase)
    }

    /// 激活节点：新节点分配 id，已登记的节点须通过状态机检查。
    /// 每次激活都会重新拍快照
    ///
    /// 祖先正在处理或已翻译时拒绝激活；子孙中已登记的单元先按各自快照还原，
    /// 再并入本节点，保证快照里只有原文
    pub fn begin(&mut self, node: &Handle) -> Option<UnitId> {
        let existing = self.find(node);
        if let Some(id) = existing {
            let phase = self.records.get(&id)?.phase;
            transition(phase, UnitEvent::Activate)?;
        }
        if self.active_ancestor(node).is_some() {
            return None;
        }

        for record in self.absorb_descendants(node) {
            record.restore();
        }

        strip_retry_tips(node);
        let fingerprint = fingerprint(node);
        let snapshot = Snapshot::take(node);
        let baseline_len = snapshot.content_len;

        let id = match existing {
            Some(id) => id,
            None => {
                let id = UnitId(self.next_id);
                self.next_id += 1;
                self.by_node.insert(node_key(node), id);
                id
            }
        };

        set_node_attr(node, NODE_ID_ATTR, Some(id.to_string()));
        set_node_attr(node, PROCESSING_ATTR, Some("true".to_string()));

        self.records.insert(
            id,
            UnitRecord {
                id,
                node: node.clone(),
                phase: Phase::Processing,
                snapshot,
                baseline_len,
                fingerprint,
            },
        );
        Some(id)
    }

    /// 最近的处于处理中或已翻译状态的已登记祖先（不含自身）
    pub fn active_ancestor(&self, node: &Handle) -> Option<UnitId> {
        ancestors(node).find_map(|ancestor| {
            let id = self.find(&ancestor)?;
            matches!(
                self.records.get(&id)?.phase,
                Phase::Processing | Phase::Translated
            )
            .then_some(id)
        })
    }

    /// 移出 `node` 子树内的全部记录，后登记的在前
    fn absorb_descendants(&mut self, node: &Handle) -> Vec<UnitRecord> {
        let mut inner: Vec<UnitId> = self
            .records
            .values()
            .filter(|record| ancestors(&record.node).any(|a| is_same_node(&a, node)))
            .map(|record| record.id)
            .collect();
        inner.sort_unstable_by(|a, b| b.cmp(a));

        inner
            .into_iter()
            .filter_map(|id| {
                let record = self.records.remove(&id)?;
                self.by_node.remove(&node_key(&record.node));
                Some(record)
            })
            .collect()
    }

    /// 施加事件，成功时同步节点上的标记属性
    pub fn apply(&mut self, id: UnitId, event: UnitEvent) -> Option<Phase> {
        let record = self.records.get_mut(&id)?;
        let next = transition(record.phase, event)?;
        record.phase = next;

        set_node_attr(&record.node, PROCESSING_ATTR, None);
        let translated = (next == Phase::Translated).then(|| "true".to_string());
        set_node_attr(&record.node, TRANSLATED_ATTR, translated);

        Some(next)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count(&self, phase: Phase) -> usize {
        self.records.values().filter(|r| r.phase == phase).count()
    }

    /// 按 id 顺序取出全部记录，并重置计数器
    pub fn drain(&mut self) -> Vec<UnitRecord> {
        let mut records: Vec<UnitRecord> = self.records.drain().map(|(_, r)| r).collect();
        records.sort_by_key(|r| r.id);
        self.by_node.clear();
        self.next_id = 0;
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{descendants, get_node_name, html_to_dom};

    #[test]
    fn test_transition_table() {
        use Phase::*;
        use UnitEvent::*;

        assert_eq!(transition(Untouched, Activate), Some(Processing));
        assert_eq!(transition(Failed, Activate), Some(Processing));
        assert_eq!(transition(Processing, Activate), None);
        assert_eq!(transition(Translated, Activate), None);
        assert_eq!(transition(Processing, Complete), Some(Translated));
        assert_eq!(transition(Processing, Fail), Some(Failed));
        assert_eq!(transition(Processing, Skip), Some(Untouched));
        assert_eq!(transition(Translated, ContentExpanded), Some(Untouched));
        assert_eq!(transition(Untouched, ContentExpanded), None);
        assert_eq!(transition(Translated, Complete), None);
        for phase in [Untouched, Processing, Translated, Failed] {
            assert_eq!(transition(phase, Restore), Some(Untouched));
        }
    }

    #[test]
    fn test_begin_rejects_reentry_and_marks_node() {
        let dom = html_to_dom(b"<p>Hello there</p>", "utf-8");
        let p = descendants(&dom.document)
            .into_iter()
            .find(|n| get_node_name(n) == Some("p"))
            .unwrap();
        let mut registry = Registry::new();

        let id = registry.begin(&p).expect("first activation");
        assert_eq!(id.to_string(), "fr-node-0");
        assert_eq!(get_node_attr(&p, PROCESSING_ATTR).as_deref(), Some("true"));
        assert!(registry.begin(&p).is_none());

        assert_eq!(registry.apply(id, UnitEvent::Complete), Some(Phase::Translated));
        assert_eq!(get_node_attr(&p, PROCESSING_ATTR), None);
        assert_eq!(get_node_attr(&p, TRANSLATED_ATTR).as_deref(), Some("true"));
        assert!(registry.begin(&p).is_none());

        assert_eq!(registry.drain().len(), 1);
        assert!(registry.find(&p).is_none());
    }

    #[test]
    fn test_nested_units_keep_original_snapshot() {
        let dom = html_to_dom(b"<p>Read the <a href=\"#\">Continue</a> part</p>", "utf-8");
        let find = |tag: &str| {
            descendants(&dom.document)
                .into_iter()
                .find(|n| get_node_name(n) == Some(tag))
                .unwrap()
        };
        let (p, a) = (find("p"), find("a"));
        let mut registry = Registry::new();

        let child = registry.begin(&a).unwrap();
        registry.apply(child, UnitEvent::Complete);
        crate::dom::set_text(&a, "继续");

        let parent = registry.begin(&p).unwrap();
        assert!(registry.find(&a).is_none(), "descendant record is absorbed");
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(parent).unwrap().snapshot.inner_html,
            "Read the <a href=\"#\">Continue</a> part"
        );

        assert!(
            registry.begin(&a).is_none(),
            "descendant of a processing unit is refused"
        );
    }
}
