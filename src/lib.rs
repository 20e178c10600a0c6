//! # Livetrans
//!
//! 在活动的 HTML 文档上就地进行双语或替换式翻译。
//!
//! ## 模块组织
//!
//! - `selection` - 判定哪些节点值得翻译
//! - `orchestrator` - 单元状态机、译文写回与恢复
//! - `queue` - 有界并发、重试与超时的请求队列
//! - `storage` - 按语言和服务隔离的翻译缓存
//! - `backend` - 翻译服务接口
//! - `dom` - 基于 rcdom 的节点操作与序列化
//! - `config` - 配置文件、环境变量与运行时配置快照

pub mod backend;
pub mod config;
pub mod detect;
pub mod dom;
pub mod env;
pub mod error;
pub mod logging;
pub mod markers;
pub mod orchestrator;
pub mod queue;
pub mod selection;
pub mod storage;
pub mod translator;

pub use backend::{HttpBackend, PassthroughBackend, TranslationBackend};
pub use config::{ConfigManager, ConfigSource, DisplayMode, ServiceKind, SharedConfig, TranslationConfig};
pub use error::{TranslationError, TranslationResult};
pub use orchestrator::{Phase, Session, SessionStatus};
pub use queue::{CancelScope, QueueJob, QueueStatus, TranslationQueue};
pub use selection::{grab_all_nodes, normalize_targets, Selector, TranslationTarget, TranslationUnit};
pub use storage::{CacheScope, TranslationCache};
pub use translator::Translator;
