//! 类型安全的环境变量管理
//!
//! 每个变量实现 [`EnvVar`]，带名称、默认值、说明和解析逻辑

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => Self::DEFAULT.ok_or_else(|| EnvError {
                variable: Self::NAME.to_string(),
                message: "Required environment variable not set".to_string(),
            }),
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }

    /// 仅在变量被显式设置且合法时返回值，非法值记录警告后忽略
    fn lookup() -> Option<T> {
        let value = env::var(Self::NAME).ok()?;
        match Self::parse(&value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("忽略非法环境变量: {}", e);
                None
            }
        }
    }
}

/// 核心环境变量
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "LIVETRANS_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;
    use crate::config::{DisplayMode, ServiceKind};

    /// 目标语言
    pub struct TargetLang;
    impl EnvVar<String> for TargetLang {
        const NAME: &'static str = "LIVETRANS_TARGET_LANG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Target language tag, e.g. zh, en, ja, zh-TW";

        fn parse(value: &str) -> EnvResult<String> {
            let lang = value.trim();
            let valid = !lang.is_empty()
                && lang.len() <= 8
                && lang.chars().all(|c| c.is_ascii_alphabetic() || c == '-');
            if valid {
                Ok(lang.to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid language tag '{}'", value),
                })
            }
        }
    }

    /// 显示模式
    pub struct Display;
    impl EnvVar<DisplayMode> for Display {
        const NAME: &'static str = "LIVETRANS_DISPLAY";
        const DEFAULT: Option<DisplayMode> = Some(DisplayMode::Bilingual);
        const DESCRIPTION: &'static str = "Display mode: bilingual or replace";

        fn parse(value: &str) -> EnvResult<DisplayMode> {
            value.parse().map_err(|e| EnvError {
                variable: Self::NAME.to_string(),
                message: format!("{}", e),
            })
        }
    }

    /// 翻译服务
    pub struct Service;
    impl EnvVar<ServiceKind> for Service {
        const NAME: &'static str = "LIVETRANS_SERVICE";
        const DEFAULT: Option<ServiceKind> = Some(ServiceKind::DeepLx);
        const DESCRIPTION: &'static str = "Translation service, e.g. deeplx, google, openai";

        fn parse(value: &str) -> EnvResult<ServiceKind> {
            value.parse().map_err(|e| EnvError {
                variable: Self::NAME.to_string(),
                message: format!("{}", e),
            })
        }
    }

    /// API URL
    pub struct ApiUrl;
    impl EnvVar<String> for ApiUrl {
        const NAME: &'static str = "LIVETRANS_API_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Translation API endpoint URL";

        fn parse(value: &str) -> EnvResult<String> {
            let parsed = url::Url::parse(value.trim()).map_err(|e| EnvError {
                variable: Self::NAME.to_string(),
                message: format!("Invalid URL: {}", e),
            })?;

            match parsed.scheme() {
                "http" | "https" => Ok(parsed.to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API URL must start with http:// or https://".to_string(),
                }),
            }
        }
    }

    /// 最大并发请求数
    pub struct Concurrency;
    impl EnvVar<usize> for Concurrency {
        const NAME: &'static str = "LIVETRANS_CONCURRENCY";
        const DEFAULT: Option<usize> = Some(4);
        const DESCRIPTION: &'static str = "Maximum concurrent translation requests";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 64)
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 缓存启用状态
    pub struct Enabled;
    impl EnvVar<bool> for Enabled {
        const NAME: &'static str = "LIVETRANS_USE_CACHE";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Enable the translation cache";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 缓存条目数上限
    pub struct Size;
    impl EnvVar<usize> for Size {
        const NAME: &'static str = "LIVETRANS_CACHE_SIZE";
        const DEFAULT: Option<usize> = Some(5000);
        const DESCRIPTION: &'static str = "Cache capacity (number of entries)";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 10, 1_000_000)
        }
    }

    /// 缓存TTL
    pub struct Ttl;
    impl EnvVar<Duration> for Ttl {
        const NAME: &'static str = "LIVETRANS_CACHE_TTL";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(7 * 86400));
        const DESCRIPTION: &'static str = "Cache TTL in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds: u64 = value.trim().parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid number of seconds".to_string(),
            })?;

            if seconds < 60 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "TTL too short (minimum 60 seconds)".to_string(),
                });
            }

            if seconds > 86400 * 30 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "TTL too long (maximum 30 days)".to_string(),
                });
            }

            Ok(Duration::from_secs(seconds))
        }
    }
}

fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

/// 生成环境变量说明文档
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    let entries: [(&str, &str); 9] = [
        (core::LogLevel::NAME, core::LogLevel::DESCRIPTION),
        (translation::TargetLang::NAME, translation::TargetLang::DESCRIPTION),
        (translation::Display::NAME, translation::Display::DESCRIPTION),
        (translation::Service::NAME, translation::Service::DESCRIPTION),
        (translation::ApiUrl::NAME, translation::ApiUrl::DESCRIPTION),
        (translation::Concurrency::NAME, translation::Concurrency::DESCRIPTION),
        (cache::Enabled::NAME, cache::Enabled::DESCRIPTION),
        (cache::Size::NAME, cache::Size::DESCRIPTION),
        (cache::Ttl::NAME, cache::Ttl::DESCRIPTION),
    ];

    for (name, description) in entries {
        docs.push_str(&format!("- `{}`: {}\n", name, description));
    }

    docs
}
