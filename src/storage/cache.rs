//! 翻译缓存
//!
//! 内容寻址：键为源文本（或序列化标记）按目标语言与服务做命名空间后的 blake3 摘要。
//! 条目有容量（LRU）和时间（TTL）两个上限，可持久化为 JSON。
//!
//! 值永远不会等于键：把“翻译成自身”记成成功没有意义。

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use blake3::Hasher;
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::config::{CacheConfig, ServiceKind, TranslationConfig};
use crate::error::{TranslationError, TranslationResult};

const PERSIST_FORMAT_VERSION: u32 = 1;

/// 缓存命名空间：切换目标语言或服务后旧条目自然失配
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheScope {
    pub target_lang: String,
    pub service: ServiceKind,
}

impl CacheScope {
    pub fn new(target_lang: &str, service: ServiceKind) -> Self {
        Self {
            target_lang: target_lang.to_string(),
            service,
        }
    }

    pub fn from_config(config: &TranslationConfig) -> Self {
        Self::new(&config.target_lang, config.service)
    }
}

/// 缓存条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    /// 反向映射的键；仅由 `set_bidirectional` 写入
    pub reverse_key: Option<String>,
    /// 写入时间（UNIX 秒）
    pub created_at: u64,
}

impl CacheEntry {
    fn new(key: String, value: String, reverse_key: Option<String>) -> Self {
        Self {
            key,
            value,
            reverse_key,
            created_at: now_secs(),
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        now_secs().saturating_sub(self.created_at) > ttl.as_secs()
    }

    /// 生成缓存键
    pub fn generate_key(text: &str, scope: &CacheScope) -> String {
        let mut hasher = Hasher::new();
        hasher.update(scope.target_lang.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(scope.service.as_str().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(text.as_bytes());
        format!("trans:{}", hasher.finalize().to_hex())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    /// 因值等于键而拒绝写入的次数
    pub rejected_identical: u64,
    pub expired_items: u64,
    pub removed: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedCache {
    version: u32,
    entries: Vec<CacheEntry>,
}

struct CacheState {
    entries: LruCache<String, CacheEntry>,
    stats: CacheStats,
}

/// 翻译缓存，克隆后共享同一存储
#[derive(Clone)]
pub struct TranslationCache {
    state: Arc<Mutex<CacheState>>,
    ttl: Duration,
}

impl TranslationCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            })),
            ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.capacity, config.ttl())
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 查找译文；值等于键的条目视为不存在
    pub fn get(&self, scope: &CacheScope, text: &str) -> Option<String> {
        let key = CacheEntry::generate_key(text, scope);
        let mut state = self.lock();

        let lookup = match state.entries.get(&key) {
            Some(entry) if entry.is_expired(self.ttl) => Err(true),
            Some(entry) if entry.value == text => Err(false),
            Some(entry) => Ok(entry.value.clone()),
            None => Err(false),
        };

        match lookup {
            Ok(value) => {
                state.stats.hits += 1;
                Some(value)
            }
            Err(expired) => {
                if expired {
                    state.entries.pop(&key);
                    state.stats.expired_items += 1;
                }
                state.stats.misses += 1;
                None
            }
        }
    }

    /// 写入；值与键相同（或为空）时拒绝并返回 false
    pub fn set(&self, scope: &CacheScope, text: &str, value: &str) -> bool {
        self.insert(scope, text, value, false)
    }

    /// 双向写入，前后两种形式都能查到对方
    pub fn set_bidirectional(&self, scope: &CacheScope, a: &str, b: &str) -> bool {
        self.insert(scope, a, b, true)
    }

    fn insert(&self, scope: &CacheScope, text: &str, value: &str, bidirectional: bool) -> bool {
        let mut state = self.lock();

        if text == value || value.trim().is_empty() {
            state.stats.rejected_identical += 1;
            return false;
        }

        let key = CacheEntry::generate_key(text, scope);
        if bidirectional {
            let reverse = CacheEntry::generate_key(value, scope);
            state.entries.put(
                reverse.clone(),
                CacheEntry::new(reverse.clone(), text.to_string(), Some(key.clone())),
            );
            state
                .entries
                .put(key.clone(), CacheEntry::new(key, value.to_string(), Some(reverse)));
        } else {
            state
                .entries
                .put(key.clone(), CacheEntry::new(key, value.to_string(), None));
        }
        state.stats.sets += 1;
        true
    }

    /// 删除条目；双向条目连同反向映射一起删除
    pub fn remove(&self, scope: &CacheScope, text: &str) -> bool {
        let key = CacheEntry::generate_key(text, scope);
        let mut state = self.lock();

        match state.entries.pop(&key) {
            Some(entry) => {
                if let Some(reverse) = entry.reverse_key {
                    let points_back = state
                        .entries
                        .peek(&reverse)
                        .map(|r| r.reverse_key.as_deref() == Some(key.as_str()))
                        .unwrap_or(false);
                    if points_back {
                        state.entries.pop(&reverse);
                    }
                }
                state.stats.removed += 1;
                true
            }
            None => false,
        }
    }

    /// 清理过期条目
    pub fn cleanup_expired(&self) -> usize {
        let mut state = self.lock();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.entries.pop(key);
        }
        state.stats.expired_items += expired.len() as u64;
        expired.len()
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats.clone()
    }

    /// 以 JSON 持久化（按最近使用从旧到新排列，加载后顺序不变）
    pub fn save<P: AsRef<Path>>(&self, path: P) -> TranslationResult<()> {
        let entries: Vec<CacheEntry> = {
            let state = self.lock();
            let mut entries: Vec<CacheEntry> = state
                .entries
                .iter()
                .filter(|(_, entry)| !entry.is_expired(self.ttl))
                .map(|(_, entry)| entry.clone())
                .collect();
            entries.reverse();
            entries
        };

        let persisted = PersistedCache {
            version: PERSIST_FORMAT_VERSION,
            entries,
        };
        let content = serde_json::to_string(&persisted)?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path.as_ref(), content)?;

        tracing::debug!("缓存已保存: {} 条", persisted.entries.len());
        Ok(())
    }

    /// 从 JSON 加载，跳过已过期条目，返回加载条数
    pub fn load<P: AsRef<Path>>(&self, path: P) -> TranslationResult<usize> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let persisted: PersistedCache = serde_json::from_str(&content)?;

        if persisted.version != PERSIST_FORMAT_VERSION {
            return Err(TranslationError::Cache(format!(
                "不支持的缓存文件版本: {}",
                persisted.version
            )));
        }

        let mut state = self.lock();
        let mut loaded = 0;
        for entry in persisted.entries {
            if entry.is_expired(self.ttl) {
                continue;
            }
            state.entries.put(entry.key.clone(), entry);
            loaded += 1;
        }

        tracing::debug!("缓存已加载: {} 条", loaded);
        Ok(loaded)
    }
}
