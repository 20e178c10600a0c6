// 集成测试公共模块
//
// 提供可计数、可注入延迟和失败的模拟后端，以及文档与会话的构建辅助

#![allow(dead_code)]

use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use markup5ever_rcdom::{Handle, RcDom};

use livetrans::config::TranslationConfig;
use livetrans::dom::{descendants, get_node_attr, get_node_name, html_to_dom};
use livetrans::error::{TranslationError, TranslationResult};
use livetrans::orchestrator::{RecordingFeed, Session, VisibilityEvent};
use livetrans::{TranslationBackend, Translator};

/// 模拟后端的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// 每段加上 `译:` 前缀，保留段落分隔符
    Prefix,
    /// 原样返回
    Echo,
    /// 加上 `[目标语言]` 前缀
    Tagged,
    /// 始终失败
    Fail,
}

pub struct MockBackend {
    behavior: Behavior,
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    seen: Mutex<Vec<String>>,
    langs: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Self::with_delay(behavior, Duration::ZERO)
    }

    pub fn with_delay(behavior: Behavior, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            delay,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            langs: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// 每次请求携带的目标语言
    pub fn langs(&self) -> Vec<String> {
        self.langs.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

pub fn prefix_parts(text: &str) -> String {
    text.split("\n%%\n")
        .map(|part| format!("译:{}", part.trim()))
        .collect::<Vec<_>>()
        .join("\n%%\n")
}

#[async_trait]
impl TranslationBackend for MockBackend {
    async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        _context: &str,
    ) -> TranslationResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(text.to_string());
        }
        if let Ok(mut langs) = self.langs.lock() {
            langs.push(target_lang.to_string());
        }

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        match self.behavior {
            Behavior::Prefix => Ok(prefix_parts(text)),
            Behavior::Echo => Ok(text.to_string()),
            Behavior::Tagged => Ok(format!("[{}] {}", target_lang, text.trim())),
            Behavior::Fail => Err(TranslationError::Parse("mock failure".to_string())),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// 目标为中文、无重试的测试配置
pub fn test_config() -> TranslationConfig {
    let mut config = TranslationConfig::default_with_lang("zh");
    config.queue.max_retries = 0;
    config
}

pub fn parse(html: &str) -> RcDom {
    html_to_dom(html.as_bytes(), "utf-8")
}

pub fn find_by_id(dom: &RcDom, id: &str) -> Handle {
    descendants(&dom.document)
        .into_iter()
        .find(|n| get_node_attr(n, "id").as_deref() == Some(id))
        .unwrap_or_else(|| panic!("element #{} should exist", id))
}

pub fn find_all(dom: &RcDom, tag: &str) -> Vec<Handle> {
    descendants(&dom.document)
        .into_iter()
        .filter(|n| get_node_name(n) == Some(tag))
        .collect()
}

pub fn body(dom: &RcDom) -> Handle {
    find_all(dom, "body")
        .into_iter()
        .next()
        .expect("document should have a body")
}

/// 测试会话及其依赖
pub struct Harness {
    pub dom: RcDom,
    pub backend: Arc<MockBackend>,
    pub translator: Rc<Translator>,
    pub feed: Rc<RecordingFeed>,
    pub session: Session,
}

impl Harness {
    pub fn new(html: &str, backend: Arc<MockBackend>, config: TranslationConfig) -> Self {
        let dom = parse(html);
        let translator = Rc::new(Translator::from_config(backend.clone(), &config));
        let feed = Rc::new(RecordingFeed::new());
        let session = Session::builder(dom.document.clone(), translator.clone())
            .config(Rc::new(config))
            .visibility(feed.clone())
            .mutations(feed.clone())
            .context("test page")
            .build();

        Self {
            dom,
            backend,
            translator,
            feed,
            session,
        }
    }

    /// 把当前登记的节点全部标为可见，并等待翻译结束
    pub async fn reveal_all(&self) -> usize {
        let pending = self.feed.take_observed();
        let count = pending.len();
        self.session
            .on_visibility(pending.into_iter().map(VisibilityEvent::visible));
        self.session.wait_idle().await;
        count
    }
}

/// 在单线程 LocalSet 中运行测试体
pub async fn local<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    tokio::task::LocalSet::new().run_until(future).await
}
