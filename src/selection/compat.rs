//! 站点兼容层：按主域名注册的选择与回填钩子

use std::collections::HashMap;
use std::rc::Rc;

use markup5ever_rcdom::Handle;
use url::Url;

/// 站点钩子对单个节点的裁决
#[derive(Clone)]
pub enum OverrideVerdict {
    /// 改为翻译另一个节点
    Substitute(Handle),
    /// 不翻译该节点
    Skip,
}

/// 站点特定的 DOM 适配
pub trait SiteOverride {
    /// 分类阶段调用；`None` 表示交给通用规则
    fn select(&self, node: &Handle) -> Option<OverrideVerdict>;

    /// 仅译文模式下回填缓存的整节点译文；返回 false 表示交给默认回填
    fn replace(&self, _node: &Handle, _cached_outer_html: &str) -> bool {
        false
    }
}

/// 主域名到钩子的注册表
#[derive(Default, Clone)]
pub struct SiteOverrides {
    handlers: HashMap<String, Rc<dyn SiteOverride>>,
}

impl SiteOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, domain: &str, handler: H)
    where
        H: SiteOverride + 'static,
    {
        self.handlers.insert(main_domain(domain), Rc::new(handler));
    }

    pub fn lookup(&self, domain: &str) -> Option<Rc<dyn SiteOverride>> {
        self.handlers.get(&main_domain(domain)).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// 两段式公共后缀，如 `co.uk`、`com.cn`
const SECOND_LEVEL_LABELS: &[&str] = &["co", "com", "net", "org", "gov", "edu", "ac"];

/// 归一化为主域名：接受完整 URL 或裸主机名，去掉查询串和子域
pub fn main_domain(input: &str) -> String {
    let trimmed = input.trim();
    let host = Url::parse(trimmed)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| {
            trimmed
                .split(['/', '?', '#'])
                .next()
                .unwrap_or_default()
                .split(':')
                .next()
                .unwrap_or_default()
                .to_string()
        })
        .to_lowercase();

    if host.parse::<std::net::IpAddr>().is_ok() {
        return host;
    }

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    let keep = match labels.as_slice() {
        [.., second, tld] if tld.len() == 2 && SECOND_LEVEL_LABELS.contains(second) => 3,
        _ => 2,
    };

    let start = labels.len().saturating_sub(keep);
    labels[start..].join(".")
}
