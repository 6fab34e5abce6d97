//! 错误处理模块
//!
//! 定义配置解析流程的统一错误类型。每个致命错误都能指出失败的来源
//! （配置文件、缓存或密钥服务）。

use thiserror::Error;

/// Worker Boot 的主要错误类型
#[derive(Error, Debug)]
pub enum BootError {
    /// 静态配置文件错误
    #[error("配置文件错误: {0}")]
    Config(#[from] ConfigError),

    /// 重启缓存错误
    #[error("缓存状态错误: {0}")]
    Cache(#[from] CacheError),

    /// 密钥服务错误
    #[error("密钥服务错误: {0}")]
    Secrets(#[from] SecretsError),

    /// 解析过程被关闭信号中断
    #[error("配置解析已取消: 收到关闭信号")]
    Cancelled,

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

impl BootError {
    /// 返回失败来源的名称，用于启动失败时的提示信息
    pub fn failed_source(&self) -> &'static str {
        match self {
            BootError::Config(_) => "file",
            BootError::Cache(_) => "cache",
            BootError::Secrets(_) => "secrets",
            BootError::Cancelled => "shutdown",
            BootError::Io(_) | BootError::Json(_) | BootError::Other(_) => "runtime",
        }
    }
}

/// 配置文件错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件不存在、无法读取或不是合法的结构化数据
    #[error("配置文件解析失败 ({path}): {message}")]
    ParseError { path: String, message: String },

    /// 必填字段缺失或为空
    #[error("缺少必填字段: {field}")]
    MissingField { field: &'static str },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 缓存状态错误类型
#[derive(Error, Debug)]
pub enum CacheError {
    /// 缓存文件存在但无法读取或结构无效
    #[error("缓存文件已损坏 ({path}): {reason}")]
    CorruptCache { path: String, reason: String },

    /// 缓存写入失败
    #[error("缓存文件写入失败 ({path}): {source}")]
    WriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 密钥服务错误类型
#[derive(Error, Debug)]
pub enum SecretsError {
    /// 身份认证或授权失败
    #[error("密钥服务拒绝访问: HTTP {status}")]
    Unauthorized { status: u16 },

    /// 无法连接或请求超时
    #[error("密钥服务不可达: {0}")]
    Unreachable(String),

    /// 服务返回错误状态或无效响应
    #[error("密钥服务返回错误{}: {message}", format_status(.status))]
    ServiceError {
        status: Option<u16>,
        message: String,
    },
}

fn format_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, BootError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_source_names() {
        let err: BootError = ConfigError::MissingField {
            field: "provider.providerType",
        }
        .into();
        assert_eq!(err.failed_source(), "file");

        let err: BootError = CacheError::CorruptCache {
            path: "/var/cache/state.json".to_string(),
            reason: "bad json".to_string(),
        }
        .into();
        assert_eq!(err.failed_source(), "cache");

        let err: BootError = SecretsError::Unauthorized { status: 401 }.into();
        assert_eq!(err.failed_source(), "secrets");
        assert_eq!(BootError::Cancelled.failed_source(), "shutdown");
    }

    #[test]
    fn test_error_messages_name_the_field() {
        let err = ConfigError::MissingField {
            field: "worker.implementation",
        };
        assert!(err.to_string().contains("worker.implementation"));

        let err = SecretsError::ServiceError {
            status: Some(503),
            message: "maintenance".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("503"));
        assert!(text.contains("maintenance"));

        let err = SecretsError::ServiceError {
            status: None,
            message: "bad payload".to_string(),
        };
        assert!(!err.to_string().contains("HTTP"));
    }
}
