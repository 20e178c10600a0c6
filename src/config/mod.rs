//! 翻译配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值。
//! 会话在每个分类/翻译周期开始时通过 [`ConfigSource`] 读取一份新快照。

pub mod manager;
pub mod source;

pub use manager::{
    CacheConfig, ConfigManager, DisplayMode, QueueConfig, ServiceKind, SessionConfig,
    TranslationConfig,
};
pub use source::{ConfigSource, SharedConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 队列相关
    pub const DEFAULT_CONCURRENCY: usize = 4;
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(45000);
    pub const CHANNEL_RETRY_DELAY: Duration = Duration::from_millis(500);

    // 会话相关
    pub const SETTLE_DELAY: Duration = Duration::from_millis(300);
    pub const DEDUP_WINDOW: Duration = Duration::from_millis(250);
    pub const EXPANSION_RATIO: f64 = 1.3;
    pub const ROOT_MARGIN_PX: u32 = 50;
    pub const VISIBILITY_THRESHOLD: f64 = 0.1;
    /// 配置变更时最多检查的未翻译节点数
    pub const CONFIG_INVALIDATION_LIMIT: usize = 200;

    // 文本过滤相关
    pub const MIN_TEXT_LENGTH: usize = 2;
    pub const MAX_TEXT_LENGTH: usize = 3072;
    pub const MAX_MARKUP_LENGTH: usize = 4096;
    pub const LANGUAGE_SKIP_MIN_CHARS: usize = 20;

    // 默认API设置
    pub const DEFAULT_API_URL: &str = "http://localhost:1188/translate";
    pub const DEFAULT_TARGET_LANG: &str = "zh";

    // 缓存设置
    pub const DEFAULT_CACHE_CAPACITY: usize = 5000;
    pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

    /// 多段落合并翻译时使用的分隔符
    pub const PARAGRAPH_SEPARATOR: &str = "%%";

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "livetrans.toml",
        ".livetrans.toml",
        "livetrans.json",
        "~/.config/livetrans/config.toml",
        "/etc/livetrans/config.toml",
    ];
}
