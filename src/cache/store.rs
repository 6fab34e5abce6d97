//! 重启缓存存储
//!
//! 读写上一次完整解析得到的配置快照。写入采用“临时文件 + 重命名”，
//! 进程在写入途中崩溃不会留下半截文件。

use crate::config::types::ResolvedConfig;
use crate::error::CacheError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// 缓存文件格式标识
pub const CACHE_FORMAT: &str = "worker-boot/cache";

/// 缓存文件格式版本
pub const CACHE_VERSION: u32 = 1;

/// 缓存的配置快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CacheState {
    /// 格式标识，必须等于 [`CACHE_FORMAT`]
    pub format: String,
    /// 格式版本，必须等于 [`CACHE_VERSION`]
    pub version: u32,
    /// 写入时间
    pub written_at: DateTime<Utc>,
    /// 完整解析后的配置
    pub resolved: ResolvedConfig,
}

impl CacheState {
    /// 为新解析的配置创建快照
    pub fn new(resolved: ResolvedConfig) -> Self {
        Self {
            format: CACHE_FORMAT.to_string(),
            version: CACHE_VERSION,
            written_at: Utc::now(),
            resolved,
        }
    }

    /// 结构校验，失败时返回原因
    pub fn check(&self) -> Result<(), String> {
        if self.format != CACHE_FORMAT {
            return Err(format!("未知的缓存格式: {}", self.format));
        }
        if self.version != CACHE_VERSION {
            return Err(format!(
                "不支持的缓存版本: {}（期望 {}）",
                self.version, CACHE_VERSION
            ));
        }
        self.resolved.validate()
    }

    pub fn into_resolved(self) -> ResolvedConfig {
        self.resolved
    }
}

/// 缓存存储trait
pub trait CacheStore: Send + Sync {
    /// 读取缓存
    ///
    /// # 返回
    /// * `Ok(None)` - 路径为空或文件不存在
    /// * `Ok(Some(state))` - 有效的缓存
    /// * `Err(CacheError::CorruptCache)` - 文件存在但无法读取或解析
    fn try_load(&self, path: &Path) -> Result<Option<CacheState>, CacheError>;

    /// 原子写入缓存
    fn save(&self, path: &Path, state: &CacheState) -> Result<(), CacheError>;
}

/// 基于本地文件的缓存存储
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCacheStore;

impl FileCacheStore {
    pub fn new() -> Self {
        Self
    }
}

impl CacheStore for FileCacheStore {
    fn try_load(&self, path: &Path) -> Result<Option<CacheState>, CacheError> {
        if path.as_os_str().is_empty() {
            return Ok(None);
        }

        let corrupt = |reason: String| CacheError::CorruptCache {
            path: path.display().to_string(),
            reason,
        };

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("缓存文件不存在: {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(corrupt(format!("读取失败: {}", e))),
        };

        let state: CacheState =
            serde_json::from_str(&content).map_err(|e| corrupt(format!("解析失败: {}", e)))?;
        state.check().map_err(corrupt)?;

        info!(
            written_at = %state.written_at,
            "已读取重启缓存: {}",
            path.display()
        );
        Ok(Some(state))
    }

    fn save(&self, path: &Path, state: &CacheState) -> Result<(), CacheError> {
        // 写入前校验，读回时无法通过校验的快照不落盘
        state.check().map_err(|reason| CacheError::WriteError {
            path: path.display().to_string(),
            source: io::Error::new(io::ErrorKind::InvalidData, reason),
        })?;

        let json_data = serde_json::to_vec_pretty(state).map_err(|e| CacheError::WriteError {
            path: path.display().to_string(),
            source: io::Error::other(e),
        })?;

        write_file_atomically(path, &json_data).map_err(|source| CacheError::WriteError {
            path: path.display().to_string(),
            source,
        })?;

        info!("已写入重启缓存: {}", path.display());
        Ok(())
    }
}

/// 原子写入文件
///
/// 在目标目录内创建临时文件，写入并刷盘后重命名为目标路径，
/// 最后在Unix上对目录刷盘，使重命名本身在断电后仍然有效。
/// 临时文件在Unix上以0600权限创建，重命名后保持该权限。
pub fn write_file_atomically(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // 确保目录存在
    fs::create_dir_all(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir)?;
    temp_file.write_all(contents)?;
    temp_file.as_file().sync_all()?;

    temp_file.persist(path).map_err(|e| e.error)?;
    sync_dir(dir)?;

    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{ProviderConfig, WorkerSection};
    use crate::config::value::Value;
    use tempfile::TempDir;

    fn sample_resolved() -> ResolvedConfig {
        ResolvedConfig {
            provider: ProviderConfig {
                provider_type: "aws".to_string(),
                worker_pool_id: Some("proj/pool".to_string()),
                ..Default::default()
            },
            worker: WorkerSection {
                implementation: "docker-worker".to_string(),
                ..Default::default()
            },
            worker_config: [("capacity", Value::Integer(2))].into_iter().collect(),
        }
    }

    #[test]
    fn test_empty_path_is_absent() {
        let store = FileCacheStore::new();
        assert!(store.try_load(Path::new("")).unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::new();
        let result = store.try_load(&dir.path().join("state.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let state = CacheState::new(sample_resolved());

        FileCacheStore::new().save(&path, &state).unwrap();

        // 使用新的存储实例读取，模拟重启后的进程
        let loaded = FileCacheStore::new().try_load(&path).unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.into_resolved(), sample_resolved());
    }

    #[test]
    fn test_save_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let store = FileCacheStore::new();

        store.save(&path, &CacheState::new(sample_resolved())).unwrap();

        let mut updated = sample_resolved();
        updated.worker_config = Value::empty_map();
        let state = CacheState::new(updated.clone());
        store.save(&path, &state).unwrap();

        let loaded = store.try_load(&path).unwrap().unwrap();
        assert_eq!(loaded.resolved, updated);

        // 目录里只剩目标文件，没有残留的临时文件
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_garbage_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let result = FileCacheStore::new().try_load(&path);
        assert!(matches!(result, Err(CacheError::CorruptCache { .. })));
    }

    #[test]
    fn test_truncated_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let json = serde_json::to_string(&CacheState::new(sample_resolved())).unwrap();
        fs::write(&path, &json[..json.len() / 2]).unwrap();

        let result = FileCacheStore::new().try_load(&path);
        assert!(matches!(result, Err(CacheError::CorruptCache { .. })));
    }

    #[test]
    fn test_wrong_version_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let mut state = CacheState::new(sample_resolved());
        state.version = CACHE_VERSION + 1;
        fs::write(&path, serde_json::to_string(&state).unwrap()).unwrap();

        let result = FileCacheStore::new().try_load(&path);
        assert!(matches!(result, Err(CacheError::CorruptCache { .. })));
    }

    #[test]
    fn test_unknown_fields_are_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let mut json = serde_json::to_value(CacheState::new(sample_resolved())).unwrap();
        json["unexpected"] = serde_json::json!(true);
        fs::write(&path, json.to_string()).unwrap();

        let result = FileCacheStore::new().try_load(&path);
        assert!(matches!(result, Err(CacheError::CorruptCache { .. })));
    }

    #[test]
    fn test_empty_identity_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let mut resolved = sample_resolved();
        resolved.provider.provider_type.clear();
        fs::write(
            &path,
            serde_json::to_string(&CacheState::new(resolved)).unwrap(),
        )
        .unwrap();

        let result = FileCacheStore::new().try_load(&path);
        assert!(matches!(result, Err(CacheError::CorruptCache { .. })));
    }

    #[test]
    fn test_save_into_unwritable_location_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        // 父路径是普通文件，无法创建目录
        let path = blocker.join("state.json");
        let result = FileCacheStore::new().save(&path, &CacheState::new(sample_resolved()));
        assert!(matches!(result, Err(CacheError::WriteError { .. })));
    }

    #[test]
    fn test_non_finite_float_is_rejected_on_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let config: crate::config::RawConfig = serde_yaml::from_str(
            "provider:\n  providerType: static\nworker:\n  implementation: x\nworkerConfig:\n  limit: .inf\n",
        )
        .unwrap();
        let mut resolved = sample_resolved();
        resolved.worker_config = config.worker_config;
        assert_eq!(
            resolved.worker_config.get("limit"),
            Some(&Value::Float(f64::INFINITY))
        );

        let result = FileCacheStore::new().save(&path, &CacheState::new(resolved));
        assert!(matches!(result, Err(CacheError::WriteError { .. })));
        assert!(!path.exists());
    }

    #[test]
    fn test_finite_floats_survive_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let mut resolved = sample_resolved();
        resolved.worker_config = [("ratio", Value::Float(0.25)), ("big", Value::Float(1e300))]
            .into_iter()
            .collect();
        let state = CacheState::new(resolved);

        FileCacheStore::new().save(&path, &state).unwrap();
        let loaded = FileCacheStore::new().try_load(&path).unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_atomic_write_into_new_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("out.json");

        write_file_atomically(&path, b"{}").unwrap();
        write_file_atomically(&path, b"[1]").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "[1]");
        let entries = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        FileCacheStore::new()
            .save(&path, &CacheState::new(sample_resolved()))
            .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
