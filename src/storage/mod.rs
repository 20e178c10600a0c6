//! 存储模块

pub mod cache;

pub use cache::{CacheEntry, CacheScope, CacheStats, TranslationCache};
