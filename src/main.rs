//! Worker Boot 主程序入口
//!
//! 解析 worker 的最终配置并交给 worker 实现

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};
use worker_boot::cli::args::{Args, Commands};
use worker_boot::cli::commands::{
    Command, ResolveCommand, UsageCommand, ValidateCommand, VersionCommand,
};
use worker_boot::logging::LoggingSystem;
use worker_boot::BootError;

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志系统
    let logging_system = Arc::new(
        LoggingSystem::setup_logging(args.log_config()).context("初始化日志系统失败")?,
    );

    info!("Worker Boot v{} 启动", worker_boot::VERSION);

    // 执行命令
    if let Err(e) = execute_command(&args, logging_system).await {
        error!(source = e.failed_source(), "启动失败: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// 执行CLI命令
async fn execute_command(
    args: &Args,
    logging_system: Arc<LoggingSystem>,
) -> std::result::Result<(), BootError> {
    match &args.command {
        Commands::Resolve { .. } => {
            let (shutdown_tx, _) = broadcast::channel(1);

            // 设置Ctrl+C信号处理，中止进行中的密钥请求
            let shutdown_tx_clone = shutdown_tx.clone();
            tokio::spawn(async move {
                match signal::ctrl_c().await {
                    Ok(()) => {
                        info!("收到中断信号，正在取消配置解析...");
                        let _ = shutdown_tx_clone.send(());
                    }
                    Err(err) => {
                        error!("监听中断信号失败: {}", err);
                    }
                }
            });

            ResolveCommand::new(shutdown_tx, logging_system)
                .execute(args)
                .await
        }
        Commands::Validate { .. } => ValidateCommand.execute(args).await,
        Commands::Usage => UsageCommand.execute(args).await,
        Commands::Version { .. } => VersionCommand.execute(args).await,
    }
}
