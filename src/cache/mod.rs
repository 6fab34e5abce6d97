//! 重启缓存模块
//!
//! 持久化完整解析后的配置，供系统重启后直接使用

pub mod store;

// 重新导出主要类型
pub use store::{write_file_atomically, CacheState, CacheStore, FileCacheStore};
