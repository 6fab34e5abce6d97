//! 配置管理模块
//!
//! 提供静态配置文件解析、验证以及嵌套配置值的合并功能

pub mod loader;
pub mod types;
pub mod usage;
pub mod value;

// 重新导出主要类型
pub use loader::{ConfigFormat, ConfigLoader, FileConfigLoader};
pub use types::{validate_config, ProviderConfig, RawConfig, ResolvedConfig, WorkerSection};
pub use value::{ListMerge, Value, ValueMap};
