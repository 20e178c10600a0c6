use std::sync::{Arc, RwLock};

use tokio::sync::watch;

use super::manager::TranslationConfig;

/// 配置快照来源
///
/// 会话不跨越挂起点持有配置，每次需要时重新调用 `snapshot()`
pub trait ConfigSource {
    fn snapshot(&self) -> TranslationConfig;

    /// 配置变更通知；不支持变更的来源返回 `None`
    fn subscribe(&self) -> Option<watch::Receiver<u64>> {
        None
    }
}

impl ConfigSource for TranslationConfig {
    fn snapshot(&self) -> TranslationConfig {
        self.clone()
    }
}

/// 可在运行中更新的共享配置
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<TranslationConfig>>,
    version: Arc<watch::Sender<u64>>,
}

impl SharedConfig {
    pub fn new(config: TranslationConfig) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(config)),
            version: Arc::new(version),
        }
    }

    /// 修改配置并通知所有订阅者
    pub fn update<F>(&self, apply: F)
    where
        F: FnOnce(&mut TranslationConfig),
    {
        {
            let mut guard = match self.inner.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            apply(&mut guard);
        }
        self.version.send_modify(|v| *v += 1);
    }
}

impl ConfigSource for SharedConfig {
    fn snapshot(&self) -> TranslationConfig {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn subscribe(&self) -> Option<watch::Receiver<u64>> {
        Some(self.version.subscribe())
    }
}
