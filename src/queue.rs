//! 翻译请求队列
//!
//! - 同时执行的任务数不超过 `concurrency`，超出部分按到达顺序排队
//! - 每次调用都有超时；失败按固定间隔重试，通道失效只快速重试一次
//! - `cancel_all` 递增代数：排队中的任务立即以 `Cancelled` 结束，
//!   执行中的任务被放弃，结果丢弃
//! - 任务可以挂在一个 `CancelScope` 上，取消该范围只影响其中的任务

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, Semaphore};
use tokio::time::{sleep, timeout};

use crate::backend::TranslationBackend;
use crate::config::QueueConfig;
use crate::error::{TranslationError, TranslationResult};

/// 一个待执行的翻译请求
pub struct QueueJob {
    pub backend: Arc<dyn TranslationBackend>,
    pub text: String,
    pub target_lang: String,
    pub context: String,
    pub scope: Option<CancelScope>,
    pub enqueued_at: Instant,
}

impl QueueJob {
    pub fn new(
        backend: Arc<dyn TranslationBackend>,
        text: &str,
        target_lang: &str,
        context: &str,
    ) -> Self {
        Self {
            backend,
            text: text.to_string(),
            target_lang: target_lang.to_string(),
            context: context.to_string(),
            scope: None,
            enqueued_at: Instant::now(),
        }
    }

    pub fn with_scope(mut self, scope: Option<CancelScope>) -> Self {
        self.scope = scope;
        self
    }
}

/// 一组任务共享的取消信号，克隆后指向同一范围
#[derive(Clone)]
pub struct CancelScope {
    generation: Arc<watch::Sender<u64>>,
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelScope {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            generation: Arc::new(generation),
        }
    }

    /// 取消此范围内排队和执行中的任务，之后提交的任务不受影响
    pub fn cancel(&self) {
        self.generation.send_modify(|generation| *generation += 1);
    }

    fn watch(&self) -> (watch::Receiver<u64>, u64) {
        let receiver = self.generation.subscribe();
        let generation = *receiver.borrow();
        (receiver, generation)
    }
}

/// 队列状态快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStatus {
    pub pending: usize,
    pub active: usize,
}

struct QueueInner {
    permits: Semaphore,
    generation: watch::Sender<u64>,
    pending: AtomicUsize,
    active: AtomicUsize,
    config: QueueConfig,
}

/// 并发受限的翻译队列，克隆后共享同一队列
#[derive(Clone)]
pub struct TranslationQueue {
    inner: Arc<QueueInner>,
}

struct CounterGuard<'a>(&'a AtomicUsize);

impl<'a> CounterGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CounterGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TranslationQueue {
    pub fn new(config: QueueConfig) -> Self {
        let concurrency = config.concurrency.max(1);
        let (generation, _) = watch::channel(0);

        Self {
            inner: Arc::new(QueueInner {
                permits: Semaphore::new(concurrency),
                generation,
                pending: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                config,
            }),
        }
    }

    /// 当前代数
    pub fn generation(&self) -> u64 {
        *self.inner.generation.borrow()
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            pending: self.inner.pending.load(Ordering::SeqCst),
            active: self.inner.active.load(Ordering::SeqCst),
        }
    }

    /// 取消所有排队和执行中的任务
    pub fn cancel_all(&self) {
        self.inner.generation.send_modify(|generation| *generation += 1);
        tracing::debug!("翻译队列已清空");
    }

    /// 提交任务并等待结果
    pub async fn enqueue(&self, job: QueueJob) -> TranslationResult<String> {
        let generation = self.generation();
        let global = wait_for_cancel(self.inner.generation.subscribe(), generation);
        let scoped = job.scope.as_ref().map(CancelScope::watch);
        let cancelled = async move {
            match scoped {
                Some((receiver, generation)) => tokio::select! {
                    _ = global => {}
                    _ = wait_for_cancel(receiver, generation) => {}
                },
                None => global.await,
            }
        };
        tokio::pin!(cancelled);

        let permit = {
            let _pending = CounterGuard::enter(&self.inner.pending);
            tokio::select! {
                biased;
                _ = &mut cancelled => return Err(TranslationError::Cancelled),
                permit = self.inner.permits.acquire() => permit,
            }
        };
        let _permit = permit.map_err(|_| TranslationError::Cancelled)?;
        let _active = CounterGuard::enter(&self.inner.active);

        tracing::trace!(
            "任务开始执行，排队耗时 {:?}",
            job.enqueued_at.elapsed()
        );

        tokio::select! {
            biased;
            _ = &mut cancelled => Err(TranslationError::Cancelled),
            result = self.run(&job) => result,
        }
    }

    async fn run(&self, job: &QueueJob) -> TranslationResult<String> {
        let config = &self.inner.config;
        let mut retry_count: u32 = 0;

        loop {
            let error = match timeout(
                config.timeout(),
                job.backend
                    .translate(&job.text, &job.target_lang, &job.context),
            )
            .await
            {
                Ok(Ok(translated)) => return Ok(translated),
                Ok(Err(error)) => error,
                Err(elapsed) => elapsed.into(),
            };

            if error.is_channel_invalidated() {
                if retry_count < 1 {
                    retry_count += 1;
                    tracing::warn!("通信通道失效，{:?} 后重试: {}", config.channel_retry_delay(), error);
                    sleep(config.channel_retry_delay()).await;
                    continue;
                }
                return Err(error);
            }

            if error.is_retryable() && retry_count < config.max_retries {
                retry_count += 1;
                tracing::warn!(
                    "翻译失败，第 {}/{} 次重试: {}",
                    retry_count,
                    config.max_retries,
                    error
                );
                sleep(config.retry_delay()).await;
                continue;
            }

            return Err(error);
        }
    }
}

async fn wait_for_cancel(mut receiver: watch::Receiver<u64>, generation: u64) {
    if receiver.wait_for(|current| *current != generation).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct SlowBackend {
        delay: Duration,
        running: AtomicUsize,
        peak: AtomicUsize,
        started: Mutex<Vec<String>>,
    }

    impl SlowBackend {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                started: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TranslationBackend for SlowBackend {
        async fn translate(
            &self,
            text: &str,
            _target_lang: &str,
            _context: &str,
        ) -> TranslationResult<String> {
            self.started.lock().unwrap().push(text.to_string());
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            sleep(self.delay).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("[{}]", text))
        }
    }

    struct FailingBackend {
        error: TranslationError,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranslationBackend for FailingBackend {
        async fn translate(
            &self,
            _text: &str,
            _target_lang: &str,
            _context: &str,
        ) -> TranslationResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }
    }

    fn config(concurrency: usize) -> QueueConfig {
        QueueConfig {
            concurrency,
            ..QueueConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bound_and_fifo_start() {
        let queue = TranslationQueue::new(config(2));
        let backend = Arc::new(SlowBackend::new(Duration::from_millis(100)));

        let handles: Vec<_> = (0..5)
            .map(|i| {
                let queue = queue.clone();
                let job = QueueJob::new(backend.clone(), &format!("job{}", i), "zh", "");
                tokio::spawn(async move { queue.enqueue(job).await })
            })
            .collect();

        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(queue.status(), QueueStatus { pending: 3, active: 2 });

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(backend.peak.load(Ordering::SeqCst), 2);
        assert_eq!(
            *backend.started.lock().unwrap(),
            vec!["job0", "job1", "job2", "job3", "job4"]
        );
        assert_eq!(queue.status(), QueueStatus::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_surfaces() {
        let queue = TranslationQueue::new(config(1));
        let backend = Arc::new(FailingBackend {
            error: TranslationError::Backend("boom".into()),
            calls: AtomicUsize::new(0),
        });

        let result = queue.enqueue(QueueJob::new(backend.clone(), "x", "zh", "")).await;

        assert_eq!(result, Err(TranslationError::Backend("boom".into())));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 4, "one call plus three retries");
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_invalidated_gets_one_fast_retry() {
        let queue = TranslationQueue::new(config(1));
        let backend = Arc::new(FailingBackend {
            error: TranslationError::from_backend_message("Extension context invalidated."),
            calls: AtomicUsize::new(0),
        });

        let started = tokio::time::Instant::now();
        let result = queue.enqueue(QueueJob::new(backend.clone(), "x", "zh", "")).await;

        assert!(matches!(result, Err(TranslationError::ChannelInvalidated(_))));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let queue = TranslationQueue::new(QueueConfig {
            concurrency: 1,
            max_retries: 0,
            ..QueueConfig::default()
        });
        let backend = Arc::new(SlowBackend::new(Duration::from_secs(120)));

        let result = queue.enqueue(QueueJob::new(backend, "x", "zh", "")).await;
        assert_eq!(result, Err(TranslationError::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_resolves_everything_as_cancelled() {
        let queue = TranslationQueue::new(config(1));
        let backend = Arc::new(SlowBackend::new(Duration::from_secs(10)));

        let handles: Vec<_> = (0..3)
            .map(|i| {
                let queue = queue.clone();
                let job = QueueJob::new(backend.clone(), &format!("job{}", i), "zh", "");
                tokio::spawn(async move { queue.enqueue(job).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(queue.status(), QueueStatus { pending: 2, active: 1 });

        queue.cancel_all();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Err(TranslationError::Cancelled));
        }
        assert_eq!(queue.status(), QueueStatus::default());

        let after = queue.enqueue(QueueJob::new(backend, "fresh", "zh", "")).await;
        assert_eq!(after.as_deref(), Ok("[fresh]"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scope_cancel_leaves_other_jobs_running() {
        let queue = TranslationQueue::new(config(2));
        let backend = Arc::new(SlowBackend::new(Duration::from_secs(1)));
        let scope = CancelScope::new();

        let scoped = {
            let queue = queue.clone();
            let job =
                QueueJob::new(backend.clone(), "mine", "zh", "").with_scope(Some(scope.clone()));
            tokio::spawn(async move { queue.enqueue(job).await })
        };
        let other = {
            let queue = queue.clone();
            let job = QueueJob::new(backend.clone(), "theirs", "zh", "");
            tokio::spawn(async move { queue.enqueue(job).await })
        };

        tokio::time::sleep(Duration::from_millis(1)).await;
        scope.cancel();

        assert_eq!(scoped.await.unwrap(), Err(TranslationError::Cancelled));
        assert_eq!(other.await.unwrap().as_deref(), Ok("[theirs]"));

        let again = queue
            .enqueue(QueueJob::new(backend, "later", "zh", "").with_scope(Some(scope)))
            .await;
        assert_eq!(again.as_deref(), Ok("[later]"));
    }
}
