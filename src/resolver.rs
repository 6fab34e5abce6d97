//! 配置解析器
//!
//! 按固定顺序组合静态配置文件、重启缓存和密钥服务，得到交给 worker 的最终配置。
//!
//! 状态流转：`Start → FastPathCheck → {FastPathReturn | FullResolve} → (Persist) → Done`，
//! 任何不可恢复的错误直接终止解析，不会返回部分结果。

use crate::cache::{CacheState, CacheStore};
use crate::config::{
    validate_config, ConfigLoader, FileConfigLoader, ListMerge, RawConfig, ResolvedConfig,
};
use crate::error::{BootError, CacheError, Result};
use crate::secrets::{SecretsBundle, SecretsFetcher, WorkerIdentity};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// 最终配置的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// 重启缓存（快速路径）
    Cache,
    /// 配置文件与密钥的完整合并
    Full,
}

/// 解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// 最终配置
    pub config: ResolvedConfig,
    /// 配置来源
    pub source: ResolutionSource,
    /// 本次是否成功写入了重启缓存
    pub cache_persisted: bool,
}

/// 解析选项
#[derive(Debug, Clone, Default)]
pub struct ResolverOptions {
    /// 列表合并策略
    pub list_merge: ListMerge,
}

/// 配置解析器
pub struct ConfigResolver {
    /// 配置文件加载器
    loader: FileConfigLoader,
    /// 密钥获取器
    fetcher: Arc<dyn SecretsFetcher>,
    /// 重启缓存存储
    cache: Arc<dyn CacheStore>,
    /// 解析选项
    options: ResolverOptions,
}

impl ConfigResolver {
    /// 创建新的配置解析器
    pub fn new(
        loader: FileConfigLoader,
        fetcher: Arc<dyn SecretsFetcher>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            loader,
            fetcher,
            cache,
            options: ResolverOptions::default(),
        }
    }

    /// 设置解析选项
    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// 从配置文件开始完整执行一次解析
    pub async fn resolve_file<P: AsRef<Path>>(&self, path: P) -> Result<Resolution> {
        let raw = self.loader.load_from_file(path.as_ref()).await?;
        self.resolve(&raw).await
    }

    /// 与 [`resolve_file`](Self::resolve_file) 相同，收到关闭信号时中止密钥请求
    pub async fn resolve_file_until_shutdown<P: AsRef<Path>>(
        &self,
        path: P,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<Resolution> {
        let raw = self.loader.load_from_file(path.as_ref()).await?;
        self.resolve_with(&raw, wait_for_shutdown(shutdown_rx)).await
    }

    /// 从已加载的静态配置开始解析
    pub async fn resolve(&self, raw: &RawConfig) -> Result<Resolution> {
        self.resolve_with(raw, std::future::pending()).await
    }

    /// 使用显式传入的缓存快照解析，不访问缓存存储的读取接口
    pub async fn resolve_from(
        &self,
        raw: &RawConfig,
        snapshot: Option<CacheState>,
    ) -> Result<Resolution> {
        validate_config(raw, "<memory>")?;
        self.run(raw, snapshot, std::future::pending()).await
    }

    async fn resolve_with<S>(&self, raw: &RawConfig, shutdown: S) -> Result<Resolution>
    where
        S: Future<Output = ()>,
    {
        validate_config(raw, "<memory>")?;

        // FastPathCheck
        let snapshot = match raw.cache_path() {
            Some(path) => self.cache.try_load(path)?,
            None => None,
        };

        self.run(raw, snapshot, shutdown).await
    }

    async fn run<S>(
        &self,
        raw: &RawConfig,
        snapshot: Option<CacheState>,
        shutdown: S,
    ) -> Result<Resolution>
    where
        S: Future<Output = ()>,
    {
        // FastPathReturn：缓存原样使用，不重新合并也不获取密钥
        if let Some(state) = snapshot {
            state.check().map_err(|reason| CacheError::CorruptCache {
                path: cache_origin(raw),
                reason,
            })?;
            info!(
                provider_type = %state.resolved.provider_type(),
                implementation = %state.resolved.implementation(),
                written_at = %state.written_at,
                "使用重启缓存中的配置，跳过密钥服务"
            );
            return Ok(Resolution {
                config: state.into_resolved(),
                source: ResolutionSource::Cache,
                cache_persisted: false,
            });
        }

        // FullResolve
        let secrets = if raw.get_secrets {
            let identity = WorkerIdentity::from_config(raw);
            debug!(secret = %identity.secret_name(), "开始获取密钥");
            tokio::select! {
                biased;
                _ = shutdown => {
                    warn!("收到关闭信号，中止密钥获取");
                    return Err(BootError::Cancelled);
                }
                result = self.fetcher.fetch(&identity) => Some(result?),
            }
        } else {
            debug!("getSecrets 已关闭，跳过密钥服务");
            None
        };

        let resolved = merge_config(raw, secrets, self.options.list_merge);

        // Persist：写入失败只记录，不影响本次启动
        let cache_persisted = match raw.cache_path() {
            Some(path) => match self.cache.save(path, &CacheState::new(resolved.clone())) {
                Ok(()) => true,
                Err(e) => {
                    warn!("{}，本次启动不具备重启缓存", e);
                    false
                }
            },
            None => false,
        };

        info!(
            provider_type = %resolved.provider_type(),
            implementation = %resolved.implementation(),
            cache_persisted,
            "配置解析完成"
        );

        Ok(Resolution {
            config: resolved,
            source: ResolutionSource::Full,
            cache_persisted,
        })
    }
}

/// 合并静态配置与密钥，冲突时密钥优先
///
/// # 参数
/// * `raw` - 静态配置
/// * `secrets` - 密钥数据，`None` 表示未获取
/// * `lists` - 列表合并策略
pub fn merge_config(
    raw: &RawConfig,
    secrets: Option<SecretsBundle>,
    lists: ListMerge,
) -> ResolvedConfig {
    let worker_config = match secrets {
        Some(bundle) => raw.worker_config.clone().merge(bundle.into_value(), lists),
        None => raw.worker_config.clone(),
    };

    ResolvedConfig {
        provider: raw.provider.clone(),
        worker: raw.worker.clone(),
        worker_config,
    }
}

fn cache_origin(raw: &RawConfig) -> String {
    raw.cache_path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<snapshot>".to_string())
}

/// 等待关闭信号；发送端全部关闭时永远等待
async fn wait_for_shutdown(mut shutdown_rx: broadcast::Receiver<()>) {
    match shutdown_rx.recv().await {
        Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
        Err(broadcast::error::RecvError::Closed) => std::future::pending().await,
    }
}
