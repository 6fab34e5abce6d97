//! 密钥服务模块
//!
//! 提供密钥获取能力的抽象和HTTP实现

pub mod fetcher;
pub mod http;

// 重新导出主要类型
pub use fetcher::{SecretsBundle, SecretsFetcher, UnconfiguredFetcher, WorkerIdentity};
pub use http::HttpSecretsFetcher;
