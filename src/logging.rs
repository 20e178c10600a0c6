use tracing_subscriber::EnvFilter;

use crate::env::{core::LogLevel, EnvVar};

/// 安装全局 fmt 订阅者
///
/// 过滤规则优先取 `RUST_LOG`，其次是传入的级别，最后是 `LIVETRANS_LOG_LEVEL`
pub fn init(level: Option<&str>) {
    let fallback = match level {
        Some(level) => level.to_string(),
        None => LogLevel::get_or_default("info".to_string()),
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("livetrans={}", fallback)))
        .unwrap_or_else(|_| EnvFilter::new("livetrans=info"));

    // 重复初始化（例如多个测试）时保留已有订阅者
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
