//! 翻译后端
//!
//! 后端只负责“文本 + 目标语言 + 上下文 -> 译文”，超时与重试由队列负责。
//! 目标语言随每个请求传入，配置变更后立即生效。

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::TranslationConfig;
use crate::error::{TranslationError, TranslationResult};

/// 外部翻译服务
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// 把一段文本翻译为 `target_lang`；`context` 为页面标题等辅助信息，可以为空
    async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        context: &str,
    ) -> TranslationResult<String>;

    fn name(&self) -> &str {
        "backend"
    }
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    source_lang: &'a str,
    target_lang: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    context: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// DeepLX 兼容的 HTTP 接口
pub struct HttpBackend {
    client: Client,
    api_url: String,
}

impl HttpBackend {
    pub fn new(api_url: &str) -> TranslationResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("livetrans/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TranslationError::Config(format!("无法创建 HTTP 客户端: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
        })
    }

    pub fn from_config(config: &TranslationConfig) -> TranslationResult<Self> {
        Self::new(&config.api_url)
    }
}

fn build_request<'a>(text: &'a str, target_lang: &'a str, context: &'a str) -> TranslateRequest<'a> {
    TranslateRequest {
        text,
        source_lang: "auto",
        target_lang,
        context,
    }
}

#[async_trait]
impl TranslationBackend for HttpBackend {
    async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        context: &str,
    ) -> TranslationResult<String> {
        let request = build_request(text, target_lang, context);

        let response = self.client.post(&self.api_url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationError::from_backend_message(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let body: TranslateResponse = response.json().await?;
        if let Some(code) = body.code {
            if code != 200 {
                return Err(TranslationError::from_backend_message(
                    body.message.unwrap_or_else(|| format!("接口返回错误码 {}", code)),
                ));
            }
        }

        body.data
            .ok_or_else(|| TranslationError::Backend("响应中缺少 data 字段".to_string()))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// 原样返回输入，未配置服务时使用
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughBackend;

#[async_trait]
impl TranslationBackend for PassthroughBackend {
    async fn translate(
        &self,
        text: &str,
        _target_lang: &str,
        _context: &str,
    ) -> TranslationResult<String> {
        Ok(text.to_string())
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}
