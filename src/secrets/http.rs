//! HTTP密钥获取器
//!
//! 通过密钥服务的HTTP接口获取 worker 密钥

use crate::config::value::Value;
use crate::error::SecretsError;
use crate::secrets::fetcher::{SecretsBundle, SecretsFetcher, WorkerIdentity};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info};

/// 密钥服务的响应体
#[derive(Debug, Deserialize)]
struct SecretResponse {
    secret: Value,
    #[serde(default)]
    expires: Option<String>,
}

/// HTTP密钥获取器
pub struct HttpSecretsFetcher {
    /// HTTP客户端
    client: Client,
    /// 服务根地址
    root_url: Url,
    /// 访问令牌
    access_token: Option<String>,
    /// 单次获取的超时时间
    timeout: Duration,
}

impl HttpSecretsFetcher {
    /// 创建新的HTTP密钥获取器
    ///
    /// # 参数
    /// * `root_url` - 密钥服务根地址
    /// * `access_token` - 可选的Bearer令牌
    /// * `timeout` - 超时时间，超时视为不可达
    ///
    /// # 返回
    /// * `Result<Self>` - 获取器实例
    pub fn new(root_url: &str, access_token: Option<String>, timeout: Duration) -> Result<Self> {
        let root_url = Url::parse(root_url)
            .with_context(|| format!("无效的密钥服务地址: {}", root_url))?;
        if root_url.cannot_be_a_base() {
            anyhow::bail!("密钥服务地址不能作为基础地址: {}", root_url);
        }

        let client = Client::builder()
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()
            .context("创建HTTP客户端失败")?;

        Ok(Self {
            client,
            root_url,
            access_token,
            timeout,
        })
    }

    /// 构建密钥地址，密钥名称作为单个路径段编码
    fn secret_url(&self, name: &str) -> Result<Url, SecretsError> {
        let mut url = self.root_url.clone();
        url.path_segments_mut()
            .map_err(|_| SecretsError::ServiceError {
                status: None,
                message: format!("无效的密钥服务地址: {}", self.root_url),
            })?
            .pop_if_empty()
            .extend(["api", "secrets", "v1", "secret", name]);
        Ok(url)
    }

    /// 发送请求并解析响应
    async fn request_secret(&self, url: Url) -> Result<Value, SecretsError> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(classify_request_error)?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SecretsError::Unauthorized {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("密钥服务返回错误: {} - {}", status, text);
            return Err(SecretsError::ServiceError {
                status: Some(status.as_u16()),
                message: text,
            });
        }

        let body: SecretResponse =
            response
                .json()
                .await
                .map_err(|e| SecretsError::ServiceError {
                    status: Some(status.as_u16()),
                    message: format!("响应格式无效: {}", e),
                })?;

        if let Some(expires) = &body.expires {
            debug!("密钥过期时间: {}", expires);
        }

        Ok(body.secret)
    }
}

/// 将传输层错误映射为密钥错误
fn classify_request_error(e: reqwest::Error) -> SecretsError {
    if e.is_decode() {
        SecretsError::ServiceError {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    } else {
        SecretsError::Unreachable(e.to_string())
    }
}

#[async_trait]
impl SecretsFetcher for HttpSecretsFetcher {
    async fn fetch(&self, identity: &WorkerIdentity) -> Result<SecretsBundle, SecretsError> {
        let name = identity.secret_name();
        let url = self.secret_url(&name)?;
        debug!("从密钥服务获取密钥: {}", url);

        let secret = match timeout(self.timeout, self.request_secret(url)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(SecretsError::Unreachable(format!(
                    "请求超时（{}秒）",
                    self.timeout.as_secs_f64()
                )))
            }
        };

        let bundle = SecretsBundle::from_secret(secret)?;
        info!(secret = %name, keys = bundle.len(), "密钥获取成功");
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_url_encodes_name_as_one_segment() {
        let fetcher =
            HttpSecretsFetcher::new("https://tc.example.com/", None, Duration::from_secs(5))
                .unwrap();
        let url = fetcher.secret_url("worker-pool:proj/pool").unwrap();
        assert_eq!(
            url.as_str(),
            "https://tc.example.com/api/secrets/v1/secret/worker-pool:proj%2Fpool"
        );
    }

    #[test]
    fn test_secret_url_keeps_root_prefix() {
        let fetcher =
            HttpSecretsFetcher::new("https://example.com/tc", None, Duration::from_secs(5))
                .unwrap();
        let url = fetcher.secret_url("worker-pool:p").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/tc/api/secrets/v1/secret/worker-pool:p"
        );
    }

    #[test]
    fn test_invalid_root_url() {
        assert!(HttpSecretsFetcher::new("not a url", None, Duration::from_secs(5)).is_err());
        assert!(HttpSecretsFetcher::new("mailto:ops@example.com", None, Duration::from_secs(5)).is_err());
    }
}
