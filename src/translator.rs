//! 先查缓存、再走队列的翻译入口

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::backend::TranslationBackend;
use crate::config::TranslationConfig;
use crate::error::TranslationResult;
use crate::queue::{CancelScope, QueueJob, QueueStatus, TranslationQueue};
use crate::storage::{CacheScope, CacheStats, TranslationCache};

/// 翻译统计
#[derive(Debug, Clone, Default)]
pub struct TranslatorStats {
    /// 实际发往后端的请求数
    pub requests: u64,
    pub cache: CacheStats,
    pub queue: QueueStatus,
}

pub struct Translator {
    backend: Arc<dyn TranslationBackend>,
    queue: TranslationQueue,
    cache: TranslationCache,
    requests: AtomicU64,
}

impl Translator {
    pub fn new(
        backend: Arc<dyn TranslationBackend>,
        queue: TranslationQueue,
        cache: TranslationCache,
    ) -> Self {
        Self {
            backend,
            queue,
            cache,
            requests: AtomicU64::new(0),
        }
    }

    pub fn from_config(backend: Arc<dyn TranslationBackend>, config: &TranslationConfig) -> Self {
        Self::new(
            backend,
            TranslationQueue::new(config.queue.clone()),
            TranslationCache::from_config(&config.cache),
        )
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn queue(&self) -> &TranslationQueue {
        &self.queue
    }

    /// 翻译纯文本或标记
    ///
    /// 缓存值与原文相同时不算命中；后端返回空串时返回原文
    pub async fn translate_text(
        &self,
        origin: &str,
        context: &str,
        config: &TranslationConfig,
    ) -> TranslationResult<String> {
        self.translate_scoped(origin, context, config, None).await
    }

    /// 同 `translate_text`，队列任务挂在给定的取消范围上
    pub async fn translate_scoped(
        &self,
        origin: &str,
        context: &str,
        config: &TranslationConfig,
        scope: Option<&CancelScope>,
    ) -> TranslationResult<String> {
        let cache_scope = CacheScope::from_config(config);
        let use_cache = config.use_cache;

        if use_cache {
            if let Some(cached) = self.cache.get(&cache_scope, origin) {
                if cached != origin {
                    tracing::trace!("缓存命中: {} 字符", origin.chars().count());
                    return Ok(cached);
                }
            }
        }

        self.requests.fetch_add(1, Ordering::SeqCst);
        let translated = self
            .queue
            .enqueue(QueueJob::new(
                self.backend.clone(),
                origin,
                &config.target_lang,
                context,
            )
            .with_scope(scope.cloned()))
            .await?;

        if translated.is_empty() {
            return Ok(origin.to_string());
        }

        if use_cache && translated != origin {
            self.cache.set(&cache_scope, origin, &translated);
        }

        Ok(translated)
    }

    pub fn stats(&self) -> TranslatorStats {
        TranslatorStats {
            requests: self.requests.load(Ordering::SeqCst),
            cache: self.cache.stats(),
            queue: self.queue.status(),
        }
    }
}
