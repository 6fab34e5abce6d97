//! 密钥获取器模块
//!
//! 定义密钥获取的trait、worker身份和密钥数据的规范化

use crate::config::types::RawConfig;
use crate::config::value::{Value, ValueMap};
use crate::error::SecretsError;
use async_trait::async_trait;
use tracing::warn;

/// 用于向密钥服务证明身份的 worker 信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerIdentity {
    /// provider 类型
    pub provider_type: String,
    /// worker 实现名称
    pub implementation: String,
    /// worker pool 标识
    pub worker_pool_id: Option<String>,
}

impl WorkerIdentity {
    /// 从静态配置中提取身份
    pub fn from_config(config: &RawConfig) -> Self {
        Self {
            provider_type: config.provider.provider_type.clone(),
            implementation: config.worker.implementation.clone(),
            worker_pool_id: config
                .provider
                .worker_pool_id
                .clone()
                .filter(|id| !id.trim().is_empty()),
        }
    }

    /// 密钥名称
    ///
    /// 设置了 worker pool 时为 `worker-pool:<workerPoolId>`，
    /// 否则为 `worker-type:<providerType>/<implementation>`。
    pub fn secret_name(&self) -> String {
        match &self.worker_pool_id {
            Some(pool) => format!("worker-pool:{}", pool),
            None => format!(
                "worker-type:{}/{}",
                self.provider_type, self.implementation
            ),
        }
    }
}

/// 一次解析中获取的密钥数据，合并后即丢弃
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecretsBundle(ValueMap);

impl SecretsBundle {
    pub fn new(values: ValueMap) -> Self {
        Self(values)
    }

    /// 从密钥服务返回的原始值构造
    ///
    /// 只包含 `config`（以及可选的 `files`）键时取 `config` 映射；
    /// 否则按旧格式把整个密钥当作配置。非映射的值视为服务错误。
    pub fn from_secret(secret: Value) -> Result<Self, SecretsError> {
        let map = match secret {
            Value::Map(map) => map,
            other => {
                return Err(SecretsError::ServiceError {
                    status: None,
                    message: format!("密钥内容必须是映射，实际为 {}", other.kind()),
                })
            }
        };

        let structured = map.contains_key("config")
            && map.keys().all(|key| key == "config" || key == "files");
        if !structured {
            if !map.is_empty() {
                warn!("密钥使用旧格式（缺少 config 字段），整个密钥将作为 worker 配置");
            }
            return Ok(Self(map));
        }

        match map.into_iter().find(|(key, _)| key == "config") {
            Some((_, Value::Map(config))) => Ok(Self(config)),
            Some((_, Value::Null)) | None => Ok(Self::default()),
            Some((_, other)) => Err(SecretsError::ServiceError {
                status: None,
                message: format!("密钥的 config 字段必须是映射，实际为 {}", other.kind()),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_value(self) -> Value {
        Value::Map(self.0)
    }
}

/// 密钥获取器trait
#[async_trait]
pub trait SecretsFetcher: Send + Sync {
    /// 获取 worker 的密钥
    ///
    /// # 参数
    /// * `identity` - worker 身份
    ///
    /// # 返回
    /// * `Result<SecretsBundle, SecretsError>` - 密钥数据或错误，不在内部重试
    async fn fetch(&self, identity: &WorkerIdentity) -> Result<SecretsBundle, SecretsError>;
}

/// 未配置密钥服务时使用的获取器，总是返回不可达
pub struct UnconfiguredFetcher;

#[async_trait]
impl SecretsFetcher for UnconfiguredFetcher {
    async fn fetch(&self, _identity: &WorkerIdentity) -> Result<SecretsBundle, SecretsError> {
        Err(SecretsError::Unreachable(
            "未配置密钥服务地址（--secrets-url）".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(pool: Option<&str>) -> WorkerIdentity {
        WorkerIdentity {
            provider_type: "aws".to_string(),
            implementation: "generic-worker".to_string(),
            worker_pool_id: pool.map(str::to_string),
        }
    }

    #[test]
    fn test_secret_name() {
        assert_eq!(
            identity(Some("proj/pool")).secret_name(),
            "worker-pool:proj/pool"
        );
        assert_eq!(
            identity(None).secret_name(),
            "worker-type:aws/generic-worker"
        );
    }

    #[test]
    fn test_identity_ignores_blank_pool() {
        let config: RawConfig = serde_yaml::from_str(
            "provider:\n  providerType: aws\n  workerPoolId: ''\nworker:\n  implementation: w\n",
        )
        .unwrap();
        let identity = WorkerIdentity::from_config(&config);
        assert!(identity.worker_pool_id.is_none());
        assert_eq!(identity.implementation, "w");
    }

    #[test]
    fn test_structured_secret_uses_config() {
        let secret: Value = serde_json::from_str(
            r#"{"config": {"token": "abc"}, "files": [{"path": "/etc/x"}]}"#,
        )
        .unwrap();
        let bundle = SecretsBundle::from_secret(secret).unwrap();
        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle.into_value().get("token"), Some(&Value::from("abc")));
    }

    #[test]
    fn test_legacy_secret_is_whole_config() {
        let secret: Value = serde_json::from_str(r#"{"token": "abc", "config": 1}"#).unwrap();
        let bundle = SecretsBundle::from_secret(secret).unwrap();
        assert_eq!(bundle.len(), 2);
    }

    #[test]
    fn test_non_map_secret_is_service_error() {
        let result = SecretsBundle::from_secret(Value::from("plain"));
        assert!(matches!(result, Err(SecretsError::ServiceError { .. })));

        let secret: Value = serde_json::from_str(r#"{"config": [1, 2]}"#).unwrap();
        let result = SecretsBundle::from_secret(secret);
        assert!(matches!(result, Err(SecretsError::ServiceError { .. })));
    }

    #[test]
    fn test_null_config_is_empty_bundle() {
        let secret: Value = serde_json::from_str(r#"{"config": null}"#).unwrap();
        let bundle = SecretsBundle::from_secret(secret).unwrap();
        assert!(bundle.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_fetcher_is_unreachable() {
        let result = UnconfiguredFetcher.fetch(&identity(None)).await;
        assert!(matches!(result, Err(SecretsError::Unreachable(_))));
    }
}
