//! Worker Boot - worker 启动配置解析
//!
//! 在 worker 启动前确定唯一的最终配置：
//! - 解析并验证静态配置文件（YAML/TOML）
//! - 从密钥服务获取配置并深度合并（密钥优先）
//! - 重启缓存：已有完整解析结果时直接使用，不访问任何外部服务
//! - 结构化日志记录

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod resolver;
pub mod secrets;


// 重新导出主要类型
pub use cache::{CacheState, CacheStore, FileCacheStore};
pub use config::{RawConfig, ResolvedConfig, Value};
pub use error::BootError;
pub use resolver::{ConfigResolver, Resolution, ResolutionSource, ResolverOptions};
pub use secrets::{SecretsBundle, SecretsFetcher, WorkerIdentity};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
