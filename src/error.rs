//! 统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use std::fmt;

use thiserror::Error;

/// 宿主消息通道断开时后端会带上的消息片段
const CHANNEL_INVALIDATED_MARKERS: [&str; 3] = [
    "Extension context invalidated",
    "Receiving end does not exist",
    "The message port closed",
];

/// 翻译错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// 后端在限定时间内未响应
    #[error("翻译请求超时")]
    Timeout,

    /// 后端返回的其他失败
    #[error("翻译服务错误: {0}")]
    Backend(String),

    /// 宿主消息通道已断开
    #[error("宿主通道已失效: {0}")]
    ChannelInvalidated(String),

    /// 队列重置导致任务被丢弃
    #[error("翻译任务已取消")]
    Cancelled,

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 缓存错误
    #[error("缓存错误: {0}")]
    Cache(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// 文件读写错误
    #[error("IO错误: {0}")]
    Io(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// 语言检测无法给出结论
    #[error("无法识别文本语言")]
    LanguageUnknown,
}

impl TranslationError {
    /// 按后端消息内容归类错误
    pub fn from_backend_message<T: fmt::Display>(msg: T) -> Self {
        let msg = msg.to_string();
        if CHANNEL_INVALIDATED_MARKERS
            .iter()
            .any(|marker| msg.contains(marker))
        {
            TranslationError::ChannelInvalidated(msg)
        } else {
            TranslationError::Backend(msg)
        }
    }

    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::Timeout => true,
            TranslationError::Backend(_) => true,
            TranslationError::ChannelInvalidated(_) => true,
            TranslationError::Cache(_) => true,
            TranslationError::Io(_) => true,
            TranslationError::Cancelled => false,
            TranslationError::Config(_) => false,
            TranslationError::Parse(_) => false,
            TranslationError::Serialization(_) => false,
            TranslationError::LanguageUnknown => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TranslationError::Cancelled)
    }

    pub fn is_channel_invalidated(&self) -> bool {
        matches!(self, TranslationError::ChannelInvalidated(_))
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::Cancelled => ErrorSeverity::Info,
            TranslationError::LanguageUnknown => ErrorSeverity::Info,
            TranslationError::Timeout => ErrorSeverity::Warning,
            TranslationError::Cache(_) => ErrorSeverity::Warning,
            TranslationError::Backend(_) => ErrorSeverity::Error,
            TranslationError::Parse(_) => ErrorSeverity::Error,
            TranslationError::Io(_) => ErrorSeverity::Error,
            TranslationError::Serialization(_) => ErrorSeverity::Error,
            TranslationError::ChannelInvalidated(_) => ErrorSeverity::Critical,
            TranslationError::Config(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::Timeout => ErrorCategory::Timeout,
            TranslationError::Backend(_) => ErrorCategory::Service,
            TranslationError::ChannelInvalidated(_) => ErrorCategory::Channel,
            TranslationError::Cancelled => ErrorCategory::Cancellation,
            TranslationError::Config(_) => ErrorCategory::Configuration,
            TranslationError::Cache(_) => ErrorCategory::Cache,
            TranslationError::Parse(_) => ErrorCategory::Parsing,
            TranslationError::Io(_) => ErrorCategory::Io,
            TranslationError::Serialization(_) => ErrorCategory::Serialization,
            TranslationError::LanguageUnknown => ErrorCategory::Detection,
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Timeout,
    Service,
    Channel,
    Cancellation,
    Configuration,
    Cache,
    Parsing,
    Io,
    Serialization,
    Detection,
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::Serialization(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::Parse(format!("TOML解析错误: {}", error))
    }
}

impl From<toml::ser::Error> for TranslationError {
    fn from(error: toml::ser::Error) -> Self {
        TranslationError::Serialization(format!("TOML序列化错误: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        TranslationError::Timeout
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::Timeout
        } else {
            TranslationError::from_backend_message(error)
        }
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 记录并返回错误
    pub fn log_error<T>(error: TranslationError) -> TranslationResult<T> {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误 [{:?}]: {}", error.category(), error),
            ErrorSeverity::Critical => {
                tracing::error!("翻译严重错误 [{:?}]: {}", error.category(), error)
            }
        }

        if error.is_channel_invalidated() {
            tracing::warn!("扩展进程已不可用，建议刷新页面后重试");
        }

        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_messages_are_recognized() {
        let err = TranslationError::from_backend_message(
            "Error: Extension context invalidated.",
        );
        assert!(err.is_channel_invalidated());

        let err = TranslationError::from_backend_message(
            "Could not establish connection. Receiving end does not exist.",
        );
        assert!(err.is_channel_invalidated());

        let err = TranslationError::from_backend_message("HTTP 502");
        assert_eq!(err, TranslationError::Backend("HTTP 502".to_string()));
    }

    #[test]
    fn test_cancelled_is_quiet() {
        let err = TranslationError::Cancelled;
        assert!(err.is_cancelled());
        assert!(!err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Info);
        assert_eq!(err.category(), ErrorCategory::Cancellation);
    }

    #[test]
    fn test_log_error_passes_error_through() {
        let result: TranslationResult<()> = helpers::log_error(TranslationError::Timeout);
        assert_eq!(result, Err(TranslationError::Timeout));
    }
}
