//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use crate::config::ListMerge;
use crate::logging::LogConfig;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Worker Boot - worker 配置解析工具
#[derive(Parser, Debug, Clone)]
#[command(
    name = "worker-boot",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "WORKER_BOOT_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 日志级别
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        help = "日志级别",
        env = "WORKER_BOOT_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// 是否输出JSON格式日志
    #[arg(long, help = "输出JSON格式日志")]
    pub log_json: bool,

    /// 日志文件路径，设置后日志写入文件而不是标准错误
    #[arg(
        long,
        value_name = "FILE",
        help = "日志写入该文件（默认输出到标准错误）",
        env = "WORKER_BOOT_LOG_FILE"
    )]
    pub log_file: Option<PathBuf>,

    /// 是否启用环境变量替换
    #[arg(long, help = "把配置字符串值中的 ${VAR} 替换为环境变量")]
    pub env_substitution: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum LogLevel {
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 解析最终配置并交给 worker
    Resolve {
        /// 密钥服务根地址
        #[arg(
            long,
            value_name = "URL",
            help = "密钥服务根地址",
            env = "WORKER_BOOT_SECRETS_URL"
        )]
        secrets_url: Option<String>,

        /// 密钥服务访问令牌
        #[arg(
            long,
            value_name = "TOKEN",
            help = "密钥服务访问令牌",
            env = "WORKER_BOOT_SECRETS_TOKEN",
            hide_env_values = true
        )]
        secrets_token: Option<String>,

        /// 密钥请求超时时间（秒）
        #[arg(
            short,
            long,
            value_name = "SECONDS",
            default_value = "30",
            help = "密钥请求超时时间（秒）"
        )]
        timeout: u64,

        /// 列表合并策略
        #[arg(
            long,
            value_enum,
            default_value = "replace",
            help = "workerConfig 与密钥中列表的合并方式"
        )]
        list_merge: ListMergeArg,

        /// 输出文件
        #[arg(
            short,
            long,
            value_name = "FILE",
            help = "把最终配置写入该文件（默认输出到标准输出）"
        )]
        output: Option<PathBuf>,
    },

    /// 验证配置文件
    Validate {
        /// 配置文件路径
        #[arg(value_name = "FILE", help = "配置文件路径")]
        config_path: Option<PathBuf>,

        /// 是否显示详细信息
        #[arg(short, long, help = "显示详细信息")]
        verbose: bool,
    },

    /// 显示配置文件格式说明
    Usage,

    /// 显示版本信息
    Version {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },
}

/// 输出格式枚举
#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
}

/// 列表合并策略参数
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum ListMergeArg {
    /// 密钥中的列表整体替换
    Replace,
    /// 密钥中的元素追加在后
    Append,
}

impl From<ListMergeArg> for ListMerge {
    fn from(arg: ListMergeArg) -> Self {
        match arg {
            ListMergeArg::Replace => ListMerge::Replace,
            ListMergeArg::Append => ListMerge::Append,
        }
    }
}

impl Args {
    /// 根据全局参数生成日志配置，指定日志文件时不再输出到标准错误
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level.clone().into(),
            file_path: self.log_file.clone(),
            console: self.log_file.is_none(),
            json_format: self.log_json,
        }
    }

    /// 获取配置文件路径
    pub fn get_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::loader::get_default_config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolve_command() {
        let args = Args::try_parse_from([
            "worker-boot",
            "--config",
            "/etc/worker-runner.yaml",
            "resolve",
            "--secrets-url",
            "https://tc.example.com",
            "--timeout",
            "5",
            "--list-merge",
            "append",
            "-o",
            "/run/worker/config.json",
        ])
        .unwrap();

        assert_eq!(args.get_config_path(), PathBuf::from("/etc/worker-runner.yaml"));
        match args.command {
            Commands::Resolve {
                secrets_url,
                timeout,
                list_merge,
                output,
                ..
            } => {
                assert_eq!(secrets_url.as_deref(), Some("https://tc.example.com"));
                assert_eq!(timeout, 5);
                assert_eq!(ListMerge::from(list_merge), ListMerge::Append);
                assert_eq!(output, Some(PathBuf::from("/run/worker/config.json")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_defaults() {
        let args = Args::try_parse_from(["worker-boot", "resolve"]).unwrap();
        match args.command {
            Commands::Resolve {
                timeout,
                list_merge,
                output,
                ..
            } => {
                assert_eq!(timeout, 30);
                assert_eq!(list_merge, ListMergeArg::Replace);
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_logging_and_substitution_flags() {
        let args = Args::try_parse_from([
            "worker-boot",
            "--log-file",
            "/var/log/worker-boot.log",
            "--env-substitution",
            "validate",
        ])
        .unwrap();
        assert_eq!(args.log_file, Some(PathBuf::from("/var/log/worker-boot.log")));
        assert!(args.env_substitution);

        let log_config = args.log_config();
        assert_eq!(
            log_config.file_path,
            Some(PathBuf::from("/var/log/worker-boot.log"))
        );
        assert!(!log_config.console);

        let args =
            Args::try_parse_from(["worker-boot", "--log-level", "warn", "--log-json", "usage"])
                .unwrap();
        assert!(args.log_file.is_none());
        assert!(!args.env_substitution);

        let log_config = args.log_config();
        assert!(log_config.console);
        assert!(log_config.json_format);
        assert_eq!(log_config.level, log::LevelFilter::Warn);
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(log::LevelFilter::from(LogLevel::Warn), log::LevelFilter::Warn);
        assert_eq!(LogLevel::Debug.to_string(), "debug");
    }
}
