//! 配置加载器实现
//!
//! 提供YAML/TOML配置文件解析、环境变量替换和错误处理功能

use crate::config::types::{validate_config, RawConfig};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "worker-runner.yaml";

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML（同时兼容JSON）
    Yaml,
    /// TOML
    Toml,
}

impl ConfigFormat {
    /// 根据文件扩展名判断格式，`.toml` 以外一律按YAML解析
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// 配置加载器trait，定义配置加载接口
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// 从文件加载配置
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    ///
    /// # 返回
    /// * `Result<RawConfig>` - 加载的配置或错误
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<RawConfig>;

    /// 从字符串加载配置
    ///
    /// # 参数
    /// * `content` - 配置文件内容
    /// * `format` - 内容格式
    ///
    /// # 返回
    /// * `Result<RawConfig>` - 加载的配置或错误
    async fn load_from_string(&self, content: &str, format: ConfigFormat) -> Result<RawConfig>;

    /// 验证配置
    fn validate(&self, config: &RawConfig, origin: &str) -> Result<()>;
}

/// 基于文件的配置加载器实现
#[derive(Debug, Clone)]
pub struct FileConfigLoader {
    /// 是否启用环境变量替换
    enable_env_substitution: bool,
}

impl FileConfigLoader {
    /// 创建新的配置加载器
    ///
    /// # 参数
    /// * `enable_env_substitution` - 是否启用环境变量替换
    pub fn new(enable_env_substitution: bool) -> Self {
        Self {
            enable_env_substitution,
        }
    }

    /// 替换配置中字符串值里的环境变量
    ///
    /// 只处理解析后的字符串叶子（映射的键除外），替换结果不会改变文档结构。
    ///
    /// # 参数
    /// * `config` - 已解析的配置
    /// * `origin` - 配置来源，用于错误信息
    fn substitute_env_vars(&self, config: &mut RawConfig, origin: &str) -> Result<()> {
        if !self.enable_env_substitution {
            return Ok(());
        }

        // 匹配 ${VAR_NAME} 格式的环境变量
        let env_var_regex =
            Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").map_err(|e| ConfigError::ParseError {
                path: origin.to_string(),
                message: format!("正则表达式错误: {}", e),
            })?;

        let mut expand = |s: &mut String| expand_env_vars(&env_var_regex, s);

        expand(&mut config.provider.provider_type)?;
        if let Some(pool) = config.provider.worker_pool_id.as_mut() {
            expand(pool)?;
        }
        expand(&mut config.worker.implementation)?;

        for value in config
            .provider
            .extra
            .values_mut()
            .chain(config.worker.extra.values_mut())
        {
            value.try_for_each_string_mut(&mut expand)?;
        }
        config.worker_config.try_for_each_string_mut(&mut expand)?;

        if let Some(path) = config.cache_over_restarts.as_mut() {
            if let Some(raw) = path.to_str() {
                let mut expanded = raw.to_string();
                expand(&mut expanded)?;
                *path = PathBuf::from(expanded);
            }
        }

        Ok(())
    }

    /// 解析配置内容，应用默认值
    fn parse(&self, content: &str, format: ConfigFormat, origin: &str) -> Result<RawConfig> {
        let parse_error = |message: String| ConfigError::ParseError {
            path: origin.to_string(),
            message,
        };

        let mut config: RawConfig = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| parse_error(format!("YAML解析失败: {}", e)))?,
            ConfigFormat::Toml => toml::from_str(content)
                .map_err(|e| parse_error(format!("TOML解析失败: {}", e)))?,
        };
        config.normalize();

        // 替换环境变量
        self.substitute_env_vars(&mut config, origin)?;

        Ok(config)
    }
}

/// 在单个字符串中展开 `${VAR}`，任一变量未设置时返回 `EnvVarError`
fn expand_env_vars(regex: &Regex, value: &mut String) -> std::result::Result<(), ConfigError> {
    if !regex.is_match(value.as_str()) {
        return Ok(());
    }

    let mut missing = None;
    let expanded = regex.replace_all(value.as_str(), |captures: &regex::Captures| {
        match std::env::var(&captures[1]) {
            Ok(resolved) => resolved,
            Err(_) => {
                missing.get_or_insert_with(|| captures[1].to_string());
                String::new()
            }
        }
    });

    if let Some(var) = missing {
        return Err(ConfigError::EnvVarError { var });
    }

    *value = expanded.into_owned();
    Ok(())
}

impl Default for FileConfigLoader {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl ConfigLoader for FileConfigLoader {
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<RawConfig> {
        let path = path.as_ref();
        let origin = path.display().to_string();

        // 文件不存在同样视为解析失败
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ParseError {
                path: origin.clone(),
                message: format!("读取文件失败: {}", e),
            })?;

        let config = self.parse(&content, ConfigFormat::from_path(path), &origin)?;

        // 验证配置
        self.validate(&config, &origin)?;

        info!(
            provider_type = %config.provider.provider_type,
            implementation = %config.worker.implementation,
            "成功加载配置文件: {}",
            path.display()
        );
        debug!(
            get_secrets = config.get_secrets,
            cache_over_restarts = ?config.cache_over_restarts,
            "配置选项"
        );

        Ok(config)
    }

    async fn load_from_string(&self, content: &str, format: ConfigFormat) -> Result<RawConfig> {
        let config = self.parse(content, format, "<string>")?;

        self.validate(&config, "<string>")?;

        debug!("成功解析配置字符串");

        Ok(config)
    }

    fn validate(&self, config: &RawConfig, origin: &str) -> Result<()> {
        validate_config(config, origin).map_err(Into::into)
    }
}

/// 获取默认配置文件路径
///
/// 当前目录存在 `worker-runner.yaml` 时使用它，否则使用用户配置目录下的
/// `worker-boot/worker-runner.yaml`。
pub fn get_default_config_path() -> PathBuf {
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return local;
    }

    dirs::config_dir()
        .map(|config_dir| config_dir.join("worker-boot").join(DEFAULT_CONFIG_FILE))
        .unwrap_or(local)
}
