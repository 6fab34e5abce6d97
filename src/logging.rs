//! 日志系统模块
//!
//! 提供结构化日志配置和管理功能。日志输出到标准错误，标准输出留给解析结果。

use log::LevelFilter;
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tracing_subscriber::filter::{Directive, LevelFilter as TracingLevel};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter, Layer};

/// 全局日志初始化状态
#[derive(Debug, Default)]
struct GlobalLoggingState {
    /// 是否已初始化
    initialized: bool,
    /// 初始化失败时的错误信息
    init_error: Option<String>,
    /// 当前配置
    current_config: Option<LogConfig>,
}

/// 全局日志状态管理器
static GLOBAL_LOGGING_STATE: OnceLock<Mutex<GlobalLoggingState>> = OnceLock::new();

fn lock_state() -> MutexGuard<'static, GlobalLoggingState> {
    GLOBAL_LOGGING_STATE
        .get_or_init(|| Mutex::new(GlobalLoggingState::default()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 日志配置结构
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 日志级别
    pub level: LevelFilter,
    /// 日志文件路径（可选）
    pub file_path: Option<PathBuf>,
    /// 是否输出到控制台（标准错误）
    pub console: bool,
    /// 是否使用JSON格式
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            file_path: None,
            console: true,
            json_format: false,
        }
    }
}

/// 日志系统管理器
pub struct LoggingSystem {
    /// 配置
    config: LogConfig,
}

impl LoggingSystem {
    /// 创建新的日志系统
    pub fn new(config: LogConfig) -> Self {
        Self { config }
    }

    /// 初始化日志系统
    ///
    /// 进程内只初始化一次，重复调用返回新的 `LoggingSystem` 实例。
    ///
    /// # 参数
    /// * `config` - 日志配置
    pub fn setup_logging(config: LogConfig) -> anyhow::Result<Self> {
        Self::setup_logging_with_options(config, false)
    }

    /// 初始化日志系统（带选项）
    ///
    /// # 参数
    /// * `config` - 日志配置
    /// * `force_reinit` - 是否强制重新初始化（主要用于测试）
    pub fn setup_logging_with_options(
        config: LogConfig,
        force_reinit: bool,
    ) -> anyhow::Result<Self> {
        {
            let state = lock_state();
            if state.initialized && !force_reinit {
                return match &state.init_error {
                    None => Ok(Self::new(config)),
                    Some(e) => Err(anyhow::anyhow!("日志系统之前初始化失败: {}", e)),
                };
            }
        }

        // 执行实际的初始化
        let init_result = Self::perform_initialization(&config);

        {
            let mut state = lock_state();
            state.initialized = true;
            state.current_config = Some(config.clone());
            state.init_error = init_result.as_ref().err().map(|e| e.to_string());
        }

        init_result?;
        Ok(Self::new(config))
    }

    /// 执行实际的日志系统初始化
    fn perform_initialization(config: &LogConfig) -> anyhow::Result<()> {
        // 初始化 LogTracer（log crate 到 tracing 的桥接）
        Self::init_log_tracer()?;

        // 初始化 tracing subscriber
        Self::init_tracing_subscriber(config)?;

        Ok(())
    }

    /// 初始化 LogTracer
    fn init_log_tracer() -> anyhow::Result<()> {
        use tracing_log::LogTracer;

        static LOG_TRACER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

        let result = LOG_TRACER_INIT.get_or_init(|| LogTracer::init().map_err(|e| e.to_string()));

        result
            .as_ref()
            .map_err(|e| anyhow::anyhow!("LogTracer初始化失败: {}", e))?;
        Ok(())
    }

    /// 初始化 tracing subscriber
    fn init_tracing_subscriber(config: &LogConfig) -> anyhow::Result<()> {
        // 创建环境过滤器，RUST_LOG 可追加模块级别指令
        let env_filter = EnvFilter::from_default_env()
            .add_directive(Self::convert_level_to_directive(config.level));

        // 创建格式化层
        let fmt_layer = if config.json_format {
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_file(true)
                .with_line_number(true)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_ansi(true)
                .with_target(true)
                .boxed()
        };

        let result = if let (false, Some(file_path)) = (config.console, &config.file_path) {
            // 文件输出，追加写入以保留重启前的日志
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)
                .map_err(|e| anyhow::anyhow!("打开日志文件失败: {}", e))?;
            let file_layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true);

            registry().with(env_filter).with(file_layer).try_init()
        } else {
            registry().with(env_filter).with(fmt_layer).try_init()
        };

        match result {
            Ok(()) => {
                tracing::debug!("日志系统初始化完成: {:?}", config);
                Ok(())
            }
            Err(e) => {
                let error_msg = e.to_string();
                if error_msg.contains(
                    "attempted to set a logger after the logging system was already initialized",
                ) || error_msg.contains("a global default trace dispatcher has already been set")
                {
                    // 已经初始化过了（测试中常见）
                    tracing::debug!("日志系统已经初始化过了");
                    Ok(())
                } else {
                    Err(anyhow::anyhow!(
                        "tracing subscriber初始化失败: {}",
                        error_msg
                    ))
                }
            }
        }
    }

    /// 将 log::LevelFilter 转换为 tracing 的指令
    fn convert_level_to_directive(level: LevelFilter) -> Directive {
        let level = match level {
            LevelFilter::Off => TracingLevel::OFF,
            LevelFilter::Error => TracingLevel::ERROR,
            LevelFilter::Warn => TracingLevel::WARN,
            LevelFilter::Info => TracingLevel::INFO,
            LevelFilter::Debug => TracingLevel::DEBUG,
            LevelFilter::Trace => TracingLevel::TRACE,
        };
        Directive::from(level)
    }

    /// 检查日志系统是否已初始化
    pub fn is_initialized() -> bool {
        GLOBAL_LOGGING_STATE.get().is_some() && lock_state().initialized
    }

    /// 获取当前日志配置（如果已初始化）
    pub fn current_config() -> Option<LogConfig> {
        GLOBAL_LOGGING_STATE.get()?;
        lock_state().current_config.clone()
    }

    /// 重置日志系统状态（主要用于测试）
    #[cfg(test)]
    pub fn reset_for_testing() {
        if GLOBAL_LOGGING_STATE.get().is_some() {
            let mut state = lock_state();
            state.initialized = false;
            state.init_error = None;
            state.current_config = None;
        }
    }

    /// 记录启动审计日志：最终配置的来源和身份
    ///
    /// # 参数
    /// * `source` - 配置来源（`cache` 或 `full`）
    /// * `provider_type` - provider 类型
    /// * `implementation` - worker 实现
    /// * `cache_persisted` - 是否写入了重启缓存
    pub fn startup_log(
        &self,
        source: &str,
        provider_type: &str,
        implementation: &str,
        cache_persisted: bool,
    ) {
        if self.config.json_format {
            let entry = json!({
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "type": "startup",
                "source": source,
                "provider_type": provider_type,
                "implementation": implementation,
                "cache_persisted": cache_persisted,
            });
            tracing::info!("{entry}");
        } else {
            tracing::info!(
                "STARTUP: {} / {} from {} (cache persisted: {})",
                provider_type,
                implementation,
                source,
                cache_persisted
            );
        }
    }
}
