//! 配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::error::{TranslationError, TranslationResult};

/// 译文展示方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// 保留原文，在其后追加译文
    #[default]
    Bilingual,
    /// 用译文整体替换原文
    Replace,
}

impl FromStr for DisplayMode {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bilingual" | "dual" => Ok(DisplayMode::Bilingual),
            "replace" | "single" => Ok(DisplayMode::Replace),
            other => Err(TranslationError::Config(format!(
                "未知显示模式 '{}'，可选: bilingual, replace",
                other
            ))),
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayMode::Bilingual => write!(f, "bilingual"),
            DisplayMode::Replace => write!(f, "replace"),
        }
    }
}

/// 翻译服务种类
///
/// 机器翻译服务只接收纯文本，大模型服务接收规范化后的标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Google,
    Microsoft,
    DeepL,
    #[default]
    DeepLx,
    OpenAi,
    DeepSeek,
    Ollama,
    Custom,
}

impl ServiceKind {
    pub fn is_machine(&self) -> bool {
        matches!(
            self,
            ServiceKind::Google | ServiceKind::Microsoft | ServiceKind::DeepL | ServiceKind::DeepLx
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Google => "google",
            ServiceKind::Microsoft => "microsoft",
            ServiceKind::DeepL => "deepl",
            ServiceKind::DeepLx => "deeplx",
            ServiceKind::OpenAi => "openai",
            ServiceKind::DeepSeek => "deepseek",
            ServiceKind::Ollama => "ollama",
            ServiceKind::Custom => "custom",
        }
    }
}

impl FromStr for ServiceKind {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google" => Ok(ServiceKind::Google),
            "microsoft" | "bing" => Ok(ServiceKind::Microsoft),
            "deepl" => Ok(ServiceKind::DeepL),
            "deeplx" => Ok(ServiceKind::DeepLx),
            "openai" => Ok(ServiceKind::OpenAi),
            "deepseek" => Ok(ServiceKind::DeepSeek),
            "ollama" => Ok(ServiceKind::Ollama),
            "custom" => Ok(ServiceKind::Custom),
            other => Err(TranslationError::Config(format!("未知翻译服务 '{}'", other))),
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 队列配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    pub concurrency: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_ms: u64,
    pub channel_retry_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: constants::DEFAULT_CONCURRENCY,
            max_retries: constants::DEFAULT_MAX_RETRIES,
            retry_delay_ms: constants::DEFAULT_RETRY_DELAY.as_millis() as u64,
            timeout_ms: constants::DEFAULT_TIMEOUT.as_millis() as u64,
            channel_retry_delay_ms: constants::CHANNEL_RETRY_DELAY.as_millis() as u64,
        }
    }
}

impl QueueConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn channel_retry_delay(&self) -> Duration {
        Duration::from_millis(self.channel_retry_delay_ms)
    }
}

/// 缓存配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
    pub persist_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: constants::DEFAULT_CACHE_CAPACITY,
            ttl_secs: constants::DEFAULT_CACHE_TTL.as_secs(),
            persist_path: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// 会话配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub settle_delay_ms: u64,
    pub debounce_ms: u64,
    pub expansion_ratio: f64,
    pub root_margin_px: u32,
    pub visibility_threshold: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: constants::SETTLE_DELAY.as_millis() as u64,
            debounce_ms: constants::DEDUP_WINDOW.as_millis() as u64,
            expansion_ratio: constants::EXPANSION_RATIO,
            root_margin_px: constants::ROOT_MARGIN_PX,
            visibility_threshold: constants::VISIBILITY_THRESHOLD,
        }
    }
}

impl SessionConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// 翻译配置快照
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub target_lang: String,
    pub display: DisplayMode,
    pub service: ServiceKind,
    pub style_class: Option<String>,
    pub use_cache: bool,
    pub api_url: String,
    pub queue: QueueConfig,
    pub cache: CacheConfig,
    pub session: SessionConfig,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            target_lang: constants::DEFAULT_TARGET_LANG.to_string(),
            display: DisplayMode::default(),
            service: ServiceKind::default(),
            style_class: None,
            use_cache: true,
            api_url: constants::DEFAULT_API_URL.to_string(),
            queue: QueueConfig::default(),
            cache: CacheConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl TranslationConfig {
    /// 创建带指定语言的默认配置
    pub fn default_with_lang(target_lang: &str) -> Self {
        Self {
            target_lang: target_lang.to_string(),
            ..Self::default()
        }
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.target_lang.trim().is_empty() {
            return Err(TranslationError::Config("目标语言不能为空".to_string()));
        }

        if self.queue.concurrency == 0 {
            return Err(TranslationError::Config("并发数不能为0".to_string()));
        }

        if self.use_cache && self.cache.capacity == 0 {
            return Err(TranslationError::Config(
                "启用缓存时缓存大小不能为0".to_string(),
            ));
        }

        if self.session.expansion_ratio <= 0.0 {
            return Err(TranslationError::Config("内容扩展阈值必须大于0".to_string()));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{cache, translation, EnvVar};

        if let Some(target_lang) = translation::TargetLang::lookup() {
            self.target_lang = target_lang;
        }

        if let Some(display) = translation::Display::lookup() {
            self.display = display;
        }

        if let Some(service) = translation::Service::lookup() {
            self.service = service;
        }

        if let Some(api_url) = translation::ApiUrl::lookup() {
            self.api_url = api_url;
            tracing::info!("环境变量覆盖 API URL: {}", self.api_url);
        }

        if let Some(concurrency) = translation::Concurrency::lookup() {
            self.queue.concurrency = concurrency;
        }

        if let Some(use_cache) = cache::Enabled::lookup() {
            self.use_cache = use_cache;
        }

        if let Some(capacity) = cache::Size::lookup() {
            self.cache.capacity = capacity;
        }

        if let Some(ttl) = cache::Ttl::lookup() {
            self.cache.ttl_secs = ttl.as_secs();
        }
    }
}

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: TranslationConfig,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// 依次加载 .env、配置文件、环境变量覆盖，然后校验
    pub fn new() -> TranslationResult<Self> {
        Self::load_dotenv();

        let (mut config, source_path) = match Self::find_config_file() {
            Some(path) => {
                tracing::info!("加载配置文件: {}", path.display());
                (Self::load_from_file(&path)?, Some(path))
            }
            None => {
                tracing::info!("未找到配置文件，使用默认配置");
                (TranslationConfig::default(), None)
            }
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(Self {
            config,
            source_path,
        })
    }

    /// 从指定文件创建，同样应用环境变量覆盖
    pub fn from_file<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let path = path.as_ref();
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self {
            config,
            source_path: Some(path.to_path_buf()),
        })
    }

    pub fn get_config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn into_config(self) -> TranslationConfig {
        self.config
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    fn find_config_file() -> Option<PathBuf> {
        constants::CONFIG_PATHS
            .iter()
            .map(|path| PathBuf::from(shellexpand::tilde(path).as_ref()))
            .find(|path| path.exists())
    }

    /// 从指定文件加载配置，按扩展名选择 TOML 或 JSON
    pub fn load_from_file(path: &Path) -> TranslationResult<TranslationConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslationError::Config(format!("读取配置文件失败: {}", e)))?;

        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::Config(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| TranslationError::Config(format!("解析TOML配置失败: {}", e)))
        }
    }

    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config<P: AsRef<Path>>(path: P) -> TranslationResult<()> {
        let config = TranslationConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| TranslationError::Config(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::Config(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TranslationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue.concurrency, 4);
        assert_eq!(config.queue.timeout(), Duration::from_secs(45));
        assert_eq!(config.session.settle_delay(), Duration::from_millis(300));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = TranslationConfig::default();
        config.queue.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = TranslationConfig::default();
        config.cache.capacity = 0;
        assert!(config.validate().is_err());
        config.use_cache = false;
        assert!(config.validate().is_ok());

        let mut config = TranslationConfig::default();
        config.session.expansion_ratio = 0.0;
        assert!(config.validate().is_err());

        let config = TranslationConfig::default_with_lang("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TranslationConfig = toml::from_str(
            r#"
            target_lang = "ja"
            display = "replace"
            service = "openai"

            [queue]
            concurrency = 2
            "#,
        )
        .expect("partial config should parse");

        assert_eq!(config.target_lang, "ja");
        assert_eq!(config.display, DisplayMode::Replace);
        assert!(!config.service.is_machine());
        assert_eq!(config.queue.concurrency, 2);
        assert_eq!(config.queue.max_retries, 3);
        assert!(config.use_cache);
    }

    #[test]
    fn test_service_capability_flag() {
        assert!(ServiceKind::DeepLx.is_machine());
        assert!(ServiceKind::Google.is_machine());
        assert!(!ServiceKind::OpenAi.is_machine());
        assert_eq!("Bing".parse::<ServiceKind>(), Ok(ServiceKind::Microsoft));
        assert!("nope".parse::<ServiceKind>().is_err());
    }

    #[test]
    fn test_example_config_round_trips() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("livetrans.toml");

        ConfigManager::generate_example_config(&path).expect("template should be written");
        let manager = ConfigManager::from_file(&path).expect("template should load");

        assert_eq!(manager.source_path(), Some(path.as_path()));
        assert!(manager.get_config().validate().is_ok());
    }
}
