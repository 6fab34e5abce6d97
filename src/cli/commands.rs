//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cache::{write_file_atomically, FileCacheStore};
use crate::cli::args::{Args, Commands, OutputFormat};
use crate::config::{ConfigLoader, FileConfigLoader};
use crate::error::Result;
use crate::logging::LoggingSystem;
use crate::resolver::{ConfigResolver, Resolution, ResolutionSource, ResolverOptions};
use crate::secrets::{HttpSecretsFetcher, SecretsFetcher, UnconfiguredFetcher};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = &args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                OutputFormat::Text => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(())
    }
}

/// 配置格式说明命令
pub struct UsageCommand;

#[async_trait]
impl Command for UsageCommand {
    async fn execute(&self, _args: &Args) -> Result<()> {
        println!("{}", crate::config::usage::usage());
        Ok(())
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Validate {
            config_path,
            verbose,
        } = &args.command
        {
            let path = config_path.clone().unwrap_or_else(|| args.get_config_path());
            let loader = FileConfigLoader::new(args.env_substitution);
            let config = loader.load_from_file(&path).await?;

            println!("配置文件有效: {}", path.display());
            println!("  providerType:      {}", config.provider.provider_type);
            println!("  implementation:    {}", config.worker.implementation);
            println!("  getSecrets:        {}", config.get_secrets);
            match config.cache_path() {
                Some(cache) => println!("  cacheOverRestarts: {}", cache.display()),
                None => println!("  cacheOverRestarts: （未启用）"),
            }

            if *verbose {
                let worker_config = serde_json::to_string_pretty(&config.worker_config)?;
                println!("  workerConfig:\n{}", worker_config);
            }
        }
        Ok(())
    }
}

/// 解析命令
pub struct ResolveCommand {
    /// 关闭信号发送端，解析时订阅
    shutdown_tx: broadcast::Sender<()>,
    /// 日志系统，用于记录启动审计日志
    logging: Arc<LoggingSystem>,
}

impl ResolveCommand {
    pub fn new(shutdown_tx: broadcast::Sender<()>, logging: Arc<LoggingSystem>) -> Self {
        Self {
            shutdown_tx,
            logging,
        }
    }

    /// 根据参数创建密钥获取器
    fn build_fetcher(
        secrets_url: Option<&str>,
        secrets_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Arc<dyn SecretsFetcher>> {
        match secrets_url {
            Some(url) => Ok(Arc::new(HttpSecretsFetcher::new(
                url,
                secrets_token.map(str::to_string),
                timeout,
            )?)),
            None => Ok(Arc::new(UnconfiguredFetcher)),
        }
    }

    /// 输出最终配置
    fn emit(resolution: &Resolution, output: Option<&Path>) -> Result<()> {
        let json_data = serde_json::to_vec_pretty(&resolution.config)?;
        match output {
            Some(path) => {
                write_file_atomically(path, &json_data)?;
                info!("最终配置已写入: {}", path.display());
            }
            None => println!("{}", String::from_utf8_lossy(&json_data)),
        }
        Ok(())
    }
}

#[async_trait]
impl Command for ResolveCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Resolve {
            secrets_url,
            secrets_token,
            timeout,
            list_merge,
            output,
        } = &args.command
        {
            let fetcher = Self::build_fetcher(
                secrets_url.as_deref(),
                secrets_token.as_deref(),
                Duration::from_secs(*timeout),
            )?;

            let resolver = ConfigResolver::new(
                FileConfigLoader::new(args.env_substitution),
                fetcher,
                Arc::new(FileCacheStore::new()),
            )
            .with_options(ResolverOptions {
                list_merge: (*list_merge).into(),
            });

            let resolution = resolver
                .resolve_file_until_shutdown(args.get_config_path(), self.shutdown_tx.subscribe())
                .await?;

            let source = match resolution.source {
                ResolutionSource::Cache => "cache",
                ResolutionSource::Full => "full",
            };
            self.logging.startup_log(
                source,
                resolution.config.provider_type(),
                resolution.config.implementation(),
                resolution.cache_persisted,
            );

            Self::emit(&resolution, output.as_deref())?;
        }
        Ok(())
    }
}
