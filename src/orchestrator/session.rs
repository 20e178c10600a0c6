//! 翻译会话
//!
//! 会话持有可见性来源、变更来源、在途集合和登记表，`start`/`stop`/`restore`
//! 管理生命周期。文档树基于 `Rc`，所有异步任务都通过 `spawn_local`
//! 运行，调用方必须处在 `tokio::task::LocalSet` 之内。
//!
//! 每个挂起点之后都重新检查会话代数和单元状态，过期的结果直接丢弃。

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::{Rc, Weak};

use markup5ever_rcdom::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::dedup::{fingerprint, InFlightSet};
use super::events::{
    MutationFeed, MutationRecord, RecordingFeed, VisibilityEvent, VisibilityFeed, VisibilityOptions,
};
use super::render::{
    append_bilingual, content_len, join_blocks, pair_blocks, replace_source, restore_svg_case,
    split_parts, strip_artifacts,
};
use super::state::{
    node_key, Phase, Registry, Snapshot, UnitEvent, UnitId, MARKER_ATTRS, TRANSLATED_ATTR,
};
use crate::config::{constants, ConfigSource, DisplayMode, TranslationConfig};
use crate::detect::{should_skip, LanguageDetector, ScriptDetector};
use crate::dom::{
    ancestors, descendants, get_node_attr, get_node_name, get_parent_node, is_element,
    parse_html_fragment, replace_children, set_inner_html, set_node_attr, set_text, take_children,
    text_content,
};
use crate::error::{helpers, TranslationError, TranslationResult};
use crate::markers::{DomMarkers, VisualMarkers};
use crate::queue::{CancelScope, QueueStatus};
use crate::selection::rules::is_artifact;
use crate::selection::{
    block_children_with_text, grab_all_nodes, normalize_targets, Selector, SiteOverride,
    TranslationTarget, TranslationUnit,
};
use crate::storage::CacheScope;
use crate::translator::Translator;

/// 单元的执行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Translated,
    Skipped,
}

/// 会话状态快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub running: bool,
    pub tracked: usize,
    pub processing: usize,
    pub translated: usize,
    pub failed: usize,
    pub watching: usize,
    pub queue: QueueStatus,
    pub requests: u64,
}

struct SessionState {
    running: bool,
    generation: u64,
    registry: Registry,
    in_flight: InFlightSet,
    watching: HashMap<usize, TranslationTarget>,
    last_config: Option<TranslationConfig>,
}

struct SessionInner {
    document: Handle,
    context: String,
    config: Rc<dyn ConfigSource>,
    translator: Rc<Translator>,
    detector: Box<dyn LanguageDetector>,
    markers: Box<dyn VisualMarkers>,
    visibility: Rc<dyn VisibilityFeed>,
    mutations: Rc<dyn MutationFeed>,
    site: Option<Rc<dyn SiteOverride>>,
    state: RefCell<SessionState>,
    cancel: CancelScope,
    tasks: Cell<usize>,
    idle: Notify,
    watcher: RefCell<Option<JoinHandle<()>>>,
}

/// 一个文档上的翻译会话，克隆后共享同一状态
#[derive(Clone)]
pub struct Session {
    inner: Rc<SessionInner>,
}

pub struct SessionBuilder {
    document: Handle,
    translator: Rc<Translator>,
    config: Option<Rc<dyn ConfigSource>>,
    detector: Option<Box<dyn LanguageDetector>>,
    markers: Option<Box<dyn VisualMarkers>>,
    visibility: Option<Rc<dyn VisibilityFeed>>,
    mutations: Option<Rc<dyn MutationFeed>>,
    site: Option<Rc<dyn SiteOverride>>,
    context: Option<String>,
}

impl SessionBuilder {
    pub fn config(mut self, config: Rc<dyn ConfigSource>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn detector(mut self, detector: Box<dyn LanguageDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn markers(mut self, markers: Box<dyn VisualMarkers>) -> Self {
        self.markers = Some(markers);
        self
    }

    pub fn visibility(mut self, feed: Rc<dyn VisibilityFeed>) -> Self {
        self.visibility = Some(feed);
        self
    }

    pub fn mutations(mut self, feed: Rc<dyn MutationFeed>) -> Self {
        self.mutations = Some(feed);
        self
    }

    pub fn site(mut self, site: Option<Rc<dyn SiteOverride>>) -> Self {
        self.site = site;
        self
    }

    /// 随每次翻译请求发送的上下文，默认取文档标题
    pub fn context(mut self, context: &str) -> Self {
        self.context = Some(context.to_string());
        self
    }

    pub fn build(self) -> Session {
        let context = self
            .context
            .unwrap_or_else(|| document_title(&self.document));

        Session {
            inner: Rc::new(SessionInner {
                context,
                config: self
                    .config
                    .unwrap_or_else(|| Rc::new(TranslationConfig::default())),
                translator: self.translator,
                detector: self.detector.unwrap_or_else(|| Box::new(ScriptDetector)),
                markers: self.markers.unwrap_or_else(|| Box::new(DomMarkers)),
                visibility: self
                    .visibility
                    .unwrap_or_else(|| Rc::new(RecordingFeed::new())),
                mutations: self
                    .mutations
                    .unwrap_or_else(|| Rc::new(RecordingFeed::new())),
                site: self.site,
                document: self.document,
                state: RefCell::new(SessionState {
                    running: false,
                    generation: 0,
                    registry: Registry::new(),
                    in_flight: InFlightSet::new(),
                    watching: HashMap::new(),
                    last_config: None,
                }),
                cancel: CancelScope::new(),
                tasks: Cell::new(0),
                idle: Notify::new(),
                watcher: RefCell::new(None),
            }),
        }
    }
}

fn document_title(document: &Handle) -> String {
    descendants(document)
        .into_iter()
        .find(|n| get_node_name(n) == Some("title"))
        .map(|title| text_content(&title).trim().to_string())
        .unwrap_or_default()
}

impl Session {
    pub fn builder(document: Handle, translator: Rc<Translator>) -> SessionBuilder {
        SessionBuilder {
            document,
            translator,
            config: None,
            detector: None,
            markers: None,
            visibility: None,
            mutations: None,
            site: None,
            context: None,
        }
    }

    pub fn translator(&self) -> &Translator {
        &self.inner.translator
    }

    pub fn document(&self) -> &Handle {
        &self.inner.document
    }

    fn selector(&self) -> Selector {
        Selector::new(&self.inner.document, self.inner.site.clone())
    }

    /// 扫描整个文档并登记候选单元，返回登记数
    pub fn start(&self) -> usize {
        let config = self.inner.config.snapshot();
        {
            let mut state = self.inner.state.borrow_mut();
            if state.running {
                return 0;
            }
            state.running = true;
            state.last_config = Some(config.clone());
        }

        self.inner
            .visibility
            .configure(VisibilityOptions::from_config(&config.session));

        let selector = self.selector();
        let units = normalize_targets(grab_all_nodes(&self.inner.document, &selector));
        let registered = self.watch_units(units);

        self.inner.mutations.observe(&self.inner.document);
        self.spawn_config_watcher();

        tracing::info!("翻译会话已启动，登记 {} 个候选单元", registered);
        registered
    }

    /// 停止自动翻译，保留已写入的译文
    pub fn stop(&self) {
        {
            let mut state = self.inner.state.borrow_mut();
            state.running = false;
            state.watching.clear();
        }
        self.abort_config_watcher();
        self.inner.visibility.disconnect();
        self.inner.mutations.disconnect();
        tracing::info!("翻译会话已停止");
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.borrow().running
    }

    fn watch_units(&self, units: Vec<TranslationUnit>) -> usize {
        let mut state = self.inner.state.borrow_mut();
        let mut registered = 0;

        for unit in units {
            let node = unit.node().clone();
            if matches!(
                state.registry.phase_of(&node),
                Some(Phase::Processing | Phase::Translated)
            ) {
                continue;
            }

            let key = node_key(&node);
            if state.watching.contains_key(&key) {
                continue;
            }
            state.watching.insert(key, unit.target);
            self.inner.visibility.observe(&node);
            registered += 1;
        }

        registered
    }

    /// 处理可见性事件：进入视口的已登记单元被激活，且不再观察
    pub fn on_visibility<I>(&self, events: I)
    where
        I: IntoIterator<Item = VisibilityEvent>,
    {
        for event in events {
            if !event.is_intersecting {
                continue;
            }

            let target = {
                let mut state = self.inner.state.borrow_mut();
                if !state.running {
                    return;
                }
                match state.watching.remove(&node_key(&event.node)) {
                    Some(target) => target,
                    None => continue,
                }
            };

            self.inner.visibility.unobserve(&event.node);
            self.activate(target);
        }
    }

    /// 手动触发（悬停、点击）：分类、规范化、去重后进入同一状态机。
    /// 返回实际开始翻译的单元数
    pub fn translate_node(&self, node: &Handle) -> usize {
        let Some(target) = self.selector().classify(node) else {
            return 0;
        };

        let mut started = 0;
        for unit in normalize_targets(vec![target]) {
            let fp = fingerprint(unit.node());
            if self.inner.state.borrow_mut().in_flight.contains(&fp) {
                tracing::trace!("相同内容正在处理，忽略重复触发");
                continue;
            }
            if self.activate(unit.target) {
                started += 1;
            }
        }
        started
    }

    /// 直接激活一个已分类的目标，不做段落拆分
    pub fn translate_target(&self, target: TranslationTarget) -> bool {
        self.activate(target)
    }

    fn activate(&self, target: TranslationTarget) -> bool {
        let node = target.node().clone();
        if get_parent_node(&node).is_none() {
            return false;
        }

        let (id, generation, fp) = {
            let mut state = self.inner.state.borrow_mut();
            let Some(id) = state.registry.begin(&node) else {
                tracing::trace!("节点或其祖先正在处理或已翻译，跳过");
                return false;
            };
            let fp = state
                .registry
                .get(id)
                .map(|record| record.fingerprint.clone())
                .unwrap_or_default();
            state.in_flight.insert(&fp);
            if state.watching.remove(&node_key(&node)).is_some() {
                self.inner.visibility.unobserve(&node);
            }
            (id, state.generation, fp)
        };

        tracing::debug!("开始翻译 {} ({})", id, target.kind());
        let session = self.clone();
        self.spawn(async move { session.run_unit(id, target, generation, fp).await });
        true
    }

    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.inner.tasks.set(self.inner.tasks.get() + 1);
        let inner = self.inner.clone();
        tokio::task::spawn_local(async move {
            future.await;
            let remaining = inner.tasks.get().saturating_sub(1);
            inner.tasks.set(remaining);
            if remaining == 0 {
                inner.idle.notify_waiters();
            }
        });
    }

    /// 等待所有翻译和重新登记任务结束
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.tasks.get() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn is_current(&self, id: UnitId, generation: u64) -> bool {
        let state = self.inner.state.borrow();
        state.generation == generation
            && state
                .registry
                .get(id)
                .map(|record| record.phase == Phase::Processing)
                .unwrap_or(false)
    }

    async fn run_unit(self, id: UnitId, target: TranslationTarget, generation: u64, fp: String) {
        let config = self.inner.config.snapshot();
        let node = target.node().clone();

        let result = if target.is_label() {
            self.translate_label(id, generation, &node, &config).await
        } else if config.display == DisplayMode::Bilingual {
            self.translate_bilingual(id, generation, &node, &config).await
        } else {
            self.translate_replace(id, generation, &node, &config).await
        };

        self.finish(id, generation, &fp, result);
    }

    async fn translate_label(
        &self,
        id: UnitId,
        generation: u64,
        node: &Handle,
        config: &TranslationConfig,
    ) -> TranslationResult<Outcome> {
        let origin = text_content(node).trim().to_string();
        if origin.is_empty() {
            return Ok(Outcome::Skipped);
        }

        let result = self
            .inner
            .translator
            .translate_scoped(&origin, &self.inner.context, config, Some(&self.inner.cancel))
            .await;
        if !self.is_current(id, generation) {
            return Err(TranslationError::Cancelled);
        }

        let text = result?;
        if text.is_empty() || text == origin {
            return Ok(Outcome::Skipped);
        }

        if config.use_cache {
            let scope = CacheScope::from_config(config);
            self.inner
                .translator
                .cache()
                .set_bidirectional(&scope, &origin, &text);
        }
        set_text(node, &text);
        Ok(Outcome::Translated)
    }

    async fn translate_bilingual(
        &self,
        id: UnitId,
        generation: u64,
        node: &Handle,
        config: &TranslationConfig,
    ) -> TranslationResult<Outcome> {
        let source = text_content(node);
        if should_skip(self.inner.detector.as_ref(), &source, &config.target_lang) {
            tracing::debug!("{} 已是目标语言，跳过", id);
            return Ok(Outcome::Skipped);
        }

        let blocks = block_children_with_text(node);
        if blocks.len() >= 2 {
            let joined = join_blocks(&blocks);
            let marker = self.inner.markers.acquire(node, false);
            let result = self
                .inner
                .translator
                .translate_scoped(&joined, &self.inner.context, config, Some(&self.inner.cancel))
                .await;
            self.inner.markers.release(marker);
            if !self.is_current(id, generation) {
                return Err(TranslationError::Cancelled);
            }

            let parts = split_parts(&result?);
            let paired = pair_blocks(&blocks, &parts, config.style_class.as_deref());
            if paired < blocks.len() {
                tracing::debug!("{} 段落数不一致: {} 段原文，{} 段译文", id, blocks.len(), parts.len());
            }
            return Ok(if paired > 0 {
                Outcome::Translated
            } else {
                Outcome::Skipped
            });
        }

        let marker = self.inner.markers.acquire(node, false);
        let result = self
            .inner
            .translator
            .translate_scoped(&source, &self.inner.context, config, Some(&self.inner.cancel))
            .await;
        self.inner.markers.release(marker);
        if !self.is_current(id, generation) {
            return Err(TranslationError::Cancelled);
        }

        let text = result?;
        if text.trim().is_empty() || text.trim() == source.trim() {
            tracing::debug!("{} 译文与原文相同，改用替换模式", id);
            return self.translate_replace(id, generation, node, config).await;
        }

        append_bilingual(
            node,
            &text,
            &block_children_with_text(node),
            config.style_class.as_deref(),
        );
        Ok(Outcome::Translated)
    }

    async fn translate_replace(
        &self,
        id: UnitId,
        generation: u64,
        node: &Handle,
        config: &TranslationConfig,
    ) -> TranslationResult<Outcome> {
        if should_skip(
            self.inner.detector.as_ref(),
            &text_content(node),
            &config.target_lang,
        ) {
            tracing::debug!("{} 已是目标语言，跳过", id);
            return Ok(Outcome::Skipped);
        }

        let scope = CacheScope::from_config(config);
        let cache = self.inner.translator.cache();
        let before = fingerprint(node);

        if config.use_cache {
            if let Some(cached) = cache.get(&scope, &before) {
                if self.splice_cached(node, &cached) {
                    tracing::debug!("{} 命中整节点缓存", id);
                    return Ok(Outcome::Translated);
                }
            }
        }

        let origin = replace_source(node, config.service);
        let marker = self.inner.markers.acquire(node, false);
        let result = self
            .inner
            .translator
            .translate_scoped(&origin, &self.inner.context, config, Some(&self.inner.cancel))
            .await;
        self.inner.markers.release(marker);
        if !self.is_current(id, generation) {
            return Err(TranslationError::Cancelled);
        }

        let text = restore_svg_case(&result?);
        if text.is_empty() || text == origin {
            return Ok(Outcome::Skipped);
        }
        if fingerprint(node) != before {
            tracing::debug!("{} 在翻译期间被改写，放弃写回", id);
            return Ok(Outcome::Skipped);
        }

        set_inner_html(node, &text);
        let after = fingerprint(node);
        if config.use_cache {
            cache.set_bidirectional(&scope, &before, &after);
        }
        self.inner
            .state
            .borrow_mut()
            .in_flight
            .hold_for(&after, config.session.debounce());

        Ok(Outcome::Translated)
    }

    /// 把缓存的整节点译文写回，保持节点本身不变
    fn splice_cached(&self, node: &Handle, cached_outer_html: &str) -> bool {
        if let Some(site) = &self.inner.site {
            if site.replace(node, cached_outer_html) {
                return true;
            }
        }

        let parsed = parse_html_fragment(cached_outer_html);
        let Some(root) = parsed.iter().find(|n| is_element(n)) else {
            return false;
        };
        if get_node_name(root) != get_node_name(node) {
            return false;
        }

        replace_children(node, take_children(root));
        true
    }

    fn finish(&self, id: UnitId, generation: u64, fp: &str, result: TranslationResult<Outcome>) {
        let debounce = self.inner.config.snapshot().session.debounce();
        let mut state = self.inner.state.borrow_mut();
        if state.generation != generation {
            return;
        }
        let Some(record) = state.registry.get(id) else {
            // 已被祖先单元并入
            state.in_flight.release(fp);
            return;
        };
        let node = record.node.clone();
        let fp = record.fingerprint.clone();

        match result {
            Ok(Outcome::Translated) => {
                state.registry.apply(id, UnitEvent::Complete);
                if let Some(record) = state.registry.get_mut(id) {
                    record.baseline_len = record.snapshot.content_len.max(content_len(&node));
                }
                state.in_flight.hold_for(&fp, debounce);
                tracing::debug!("{} 翻译完成", id);
            }
            Ok(Outcome::Skipped) => {
                state.registry.apply(id, UnitEvent::Skip);
                state.in_flight.hold_for(&fp, debounce);
            }
            Err(error) if error.is_cancelled() => {
                state.registry.apply(id, UnitEvent::Skip);
                state.in_flight.release(&fp);
                tracing::debug!("{} 已取消", id);
            }
            Err(error) => {
                state.registry.apply(id, UnitEvent::Fail);
                state.in_flight.release(&fp);
                drop(state);

                self.inner.markers.fail(&node, &error.to_string());
                let _ = helpers::log_error::<()>(error);
            }
        }
    }

    /// 处理一批子树变更
    ///
    /// 会话自己的写入被忽略；已翻译单元内部的变化走膨胀判定；
    /// 其余位置新插入的子树重新分类并登记
    pub fn on_mutations(&self, records: &[MutationRecord]) {
        let mut expanded: Vec<UnitId> = Vec::new();
        let mut inserted: Vec<Handle> = Vec::new();

        {
            let state = self.inner.state.borrow();
            if !state.running {
                return;
            }

            for record in records {
                if record.is_self_inflicted() {
                    continue;
                }

                match enclosing_unit(&state.registry, record.target()) {
                    Some((_, Phase::Processing)) => continue,
                    Some((id, Phase::Translated)) => {
                        if !expanded.contains(&id) {
                            expanded.push(id);
                        }
                        continue;
                    }
                    _ => {}
                }

                if let MutationRecord::ChildList { added, .. } = record {
                    inserted.extend(
                        added
                            .iter()
                            .filter(|n| is_element(n) && !is_artifact(n))
                            .cloned(),
                    );
                }
            }
        }

        for id in expanded {
            self.check_expansion(id);
        }

        if inserted.is_empty() {
            return;
        }

        let selector = self.selector();
        let targets: Vec<TranslationTarget> = inserted
            .iter()
            .filter(|root| get_parent_node(root).is_some())
            .flat_map(|root| grab_all_nodes(root, &selector))
            .collect();
        let registered = self.watch_units(normalize_targets(targets));
        if registered > 0 {
            tracing::debug!("新插入内容中登记 {} 个候选单元", registered);
        }
    }

    /// 已翻译单元的内容明显变长时降级并在稳定后重新登记
    fn check_expansion(&self, id: UnitId) {
        let config = self.inner.config.snapshot();
        let mut state = self.inner.state.borrow_mut();

        let Some(record) = state.registry.get(id) else {
            return;
        };
        if record.phase != Phase::Translated {
            return;
        }

        let node = record.node.clone();
        let previous_style = record.snapshot.style.clone();
        let current = content_len(&node);
        if (current as f64) <= record.baseline_len as f64 * config.session.expansion_ratio {
            return;
        }

        tracing::debug!(
            "{} 内容由 {} 增长到 {}，重新翻译",
            id,
            record.baseline_len,
            current
        );

        strip_artifacts(&node);
        set_node_attr(&node, "style", previous_style);
        state.registry.apply(id, UnitEvent::ContentExpanded);
        if let Some(record) = state.registry.get_mut(id) {
            record.snapshot = Snapshot::take(&node);
            record.baseline_len = record.snapshot.content_len;
            record.fingerprint = fingerprint(&node);
        }
        let generation = state.generation;
        drop(state);

        let session = self.clone();
        let settle = config.session.settle_delay();
        self.spawn(async move {
            tokio::time::sleep(settle).await;
            session.rewatch(id, generation);
        });
    }

    fn rewatch(&self, id: UnitId, generation: u64) {
        let node = {
            let state = self.inner.state.borrow();
            if !state.running || state.generation != generation {
                return;
            }
            match state.registry.get(id) {
                Some(record) if record.phase == Phase::Untouched => record.node.clone(),
                _ => return,
            }
        };

        if get_parent_node(&node).is_none() {
            return;
        }
        if let Some(target) = self.selector().classify(&node) {
            self.watch_units(normalize_targets(vec![target]));
        }
    }

    /// 配置变化：清理尚未翻译节点在新旧命名空间下的缓存
    pub fn on_config_changed(&self) -> usize {
        let config = self.inner.config.snapshot();
        let previous = self
            .inner
            .state
            .borrow_mut()
            .last_config
            .replace(config.clone());

        let mut scopes = vec![CacheScope::from_config(&config)];
        if let Some(previous) = previous {
            let old = CacheScope::from_config(&previous);
            if !scopes.contains(&old) {
                scopes.push(old);
            }
        }

        let cache = self.inner.translator.cache();
        let mut removed = 0;
        for node in descendants(&self.inner.document)
            .into_iter()
            .filter(|n| get_node_attr(n, TRANSLATED_ATTR).as_deref() != Some("true"))
            .take(constants::CONFIG_INVALIDATION_LIMIT)
        {
            let fp = fingerprint(&node);
            let text = text_content(&node);
            // 双语模式以整段文本为键，标签以去掉首尾空白的文本为键
            let label = text.trim();
            for scope in &scopes {
                removed += usize::from(cache.remove(scope, &fp));
                removed += usize::from(cache.remove(scope, &text));
                if label != text {
                    removed += usize::from(cache.remove(scope, label));
                }
            }
        }

        tracing::info!("配置已变更，清理 {} 条缓存", removed);
        removed
    }

    fn spawn_config_watcher(&self) {
        let Some(mut receiver) = self.inner.config.subscribe() else {
            return;
        };

        let weak: Weak<SessionInner> = Rc::downgrade(&self.inner);
        let handle = tokio::task::spawn_local(async move {
            while receiver.changed().await.is_ok() {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                Session { inner }.on_config_changed();
            }
        });

        if let Some(previous) = self.inner.watcher.borrow_mut().replace(handle) {
            previous.abort();
        }
    }

    fn abort_config_watcher(&self) {
        if let Some(handle) = self.inner.watcher.borrow_mut().take() {
            handle.abort();
        }
    }

    /// 全部恢复：取消本会话的排队任务，还原所有登记节点并清除标记和产物
    pub fn restore(&self) {
        self.inner.cancel.cancel();
        self.abort_config_watcher();

        let records = {
            let mut state = self.inner.state.borrow_mut();
            state.generation += 1;
            state.running = false;
            state.in_flight.clear();
            state.watching.clear();
            state.registry.drain()
        };

        for record in &records {
            record.restore();
        }

        for element in descendants(&self.inner.document) {
            if is_artifact(&element) {
                crate::dom::remove_node(&element);
                continue;
            }
            for attr in MARKER_ATTRS {
                if get_node_attr(&element, attr).is_some() {
                    set_node_attr(&element, attr, None);
                }
            }
        }

        self.inner.visibility.disconnect();
        self.inner.mutations.disconnect();
        tracing::info!("已恢复 {} 个节点", records.len());
    }

    pub fn phase_of(&self, node: &Handle) -> Option<Phase> {
        self.inner.state.borrow().registry.phase_of(node)
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.inner.state.borrow();
        let stats = self.inner.translator.stats();
        SessionStatus {
            running: state.running,
            tracked: state.registry.len(),
            processing: state.registry.count(Phase::Processing),
            translated: state.registry.count(Phase::Translated),
            failed: state.registry.count(Phase::Failed),
            watching: state.watching.len(),
            queue: stats.queue,
            requests: stats.requests,
        }
    }
}

/// 最近的已登记祖先（含自身）
fn enclosing_unit(registry: &Registry, node: &Handle) -> Option<(UnitId, Phase)> {
    std::iter::once(node.clone())
        .chain(ancestors(node))
        .find_map(|candidate| {
            let id = registry.find(&candidate)?;
            registry.get(id).map(|record| (id, record.phase))
        })
}
