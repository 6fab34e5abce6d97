//! 配置数据结构定义
//!
//! 定义静态配置文件、最终解析结果的结构体和验证逻辑

use crate::config::value::{join_path, Value, ValueMap};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 配置文件的原始内容
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawConfig {
    /// 负责实例化该 worker 的 provider 信息
    #[serde(default)]
    pub provider: ProviderConfig,
    /// worker 实现信息
    #[serde(default)]
    pub worker: WorkerSection,
    /// 传给 worker 的基础配置
    #[serde(default = "Value::empty_map")]
    pub worker_config: Value,
    /// 是否从密钥服务获取配置
    #[serde(default = "default_get_secrets")]
    pub get_secrets: bool,
    /// 重启缓存文件路径
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_over_restarts: Option<PathBuf>,
}

/// provider 配置段
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// provider 类型，例如云厂商名称或 `static`
    #[serde(default)]
    pub provider_type: String,
    /// worker pool 标识，参与密钥名称的计算
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_pool_id: Option<String>,
    /// provider 特定的其余字段，原样保留
    #[serde(flatten)]
    pub extra: ValueMap,
}

/// worker 配置段
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSection {
    /// worker 实现名称
    #[serde(default)]
    pub implementation: String,
    /// 实现特定的其余字段，原样保留
    #[serde(flatten)]
    pub extra: ValueMap,
}

/// 交给 worker 实现的最终配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub provider: ProviderConfig,
    pub worker: WorkerSection,
    pub worker_config: Value,
}

fn default_get_secrets() -> bool {
    true
}

impl RawConfig {
    /// 返回已启用的缓存路径，空路径视为未启用
    pub fn cache_path(&self) -> Option<&Path> {
        self.cache_over_restarts
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    /// 规范化可选字段：`workerConfig: ~` 等同于空映射
    pub(crate) fn normalize(&mut self) {
        if self.worker_config.is_null() {
            self.worker_config = Value::empty_map();
        }
    }
}

impl ResolvedConfig {
    pub fn provider_type(&self) -> &str {
        &self.provider.provider_type
    }

    pub fn implementation(&self) -> &str {
        &self.worker.implementation
    }

    /// 检查结果必须携带的身份字段
    pub fn validate(&self) -> Result<(), String> {
        if self.provider_type().trim().is_empty() {
            return Err("provider.providerType 为空".to_string());
        }
        if self.implementation().trim().is_empty() {
            return Err("worker.implementation 为空".to_string());
        }
        if self.worker_config.as_map().is_none() {
            return Err(format!(
                "workerConfig 必须是映射，实际为 {}",
                self.worker_config.kind()
            ));
        }
        if let Some(path) = non_finite_path(&self.provider, &self.worker, &self.worker_config) {
            return Err(format!("{} 不是有限数值", path));
        }
        Ok(())
    }
}

/// 在各配置段中查找非有限浮点数，返回完整路径
fn non_finite_path(
    provider: &ProviderConfig,
    worker: &WorkerSection,
    worker_config: &Value,
) -> Option<String> {
    let sections = [
        ("provider", &provider.extra),
        ("worker", &worker.extra),
    ];
    sections
        .into_iter()
        .find_map(|(name, extra)| {
            extra.iter().find_map(|(key, value)| {
                value
                    .find_non_finite()
                    .map(|rest| join_path(&format!("{}.{}", name, key), &rest))
            })
        })
        .or_else(|| {
            worker_config
                .find_non_finite()
                .map(|rest| join_path("workerConfig", &rest))
        })
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
/// * `origin` - 配置来源，用于错误信息
///
/// # 返回
/// * `Result<(), ConfigError>` - 验证结果
pub fn validate_config(config: &RawConfig, origin: &str) -> Result<(), ConfigError> {
    if config.provider.provider_type.trim().is_empty() {
        return Err(ConfigError::MissingField {
            field: "provider.providerType",
        });
    }

    if config.worker.implementation.trim().is_empty() {
        return Err(ConfigError::MissingField {
            field: "worker.implementation",
        });
    }

    if config.worker_config.as_map().is_none() {
        return Err(ConfigError::ParseError {
            path: origin.to_string(),
            message: format!(
                "workerConfig 必须是映射，实际为 {}",
                config.worker_config.kind()
            ),
        });
    }

    // 缓存以JSON保存，inf/nan 无法原样读回
    if let Some(path) = non_finite_path(&config.provider, &config.worker, &config.worker_config)
    {
        return Err(ConfigError::ParseError {
            path: origin.to_string(),
            message: format!("{} 不是有限数值（不支持 inf/nan）", path),
        });
    }

    Ok(())
}
