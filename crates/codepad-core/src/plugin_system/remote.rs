//! Plugin registry and package download collaborators.
//!
//! [`PluginRegistryClient`] covers the registry endpoints installation needs;
//! [`PackageFetcher`] turns a package URL into bytes. Both have HTTP
//! implementations built on `reqwest`.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client as HttpClient, Url};
use serde::{Deserialize, Serialize};

use crate::plugin_system::error::{PluginResult, PluginSystemError};
use crate::plugin_system::manifest::RemoteManifest;
use crate::plugin_system::source::api_url;
use crate::storage::config::RegistryConfig;
use crate::storage::provider::StorageProvider;

/// Bytes received so far, and the expected total when the source reports one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub loaded: u64,
    pub total: Option<u64>,
}

impl DownloadProgress {
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some(self.loaded as f64 / total as f64 * 100.0),
            _ => None,
        }
    }
}

/// Progress callback passed to [`PackageFetcher::download`]
pub type ProgressFn<'a> = &'a (dyn Fn(DownloadProgress) + Send + Sync);

/// Fetches plugin packages
#[async_trait]
pub trait PackageFetcher: Send + Sync {
    async fn download(&self, url: &str, progress: Option<ProgressFn<'_>>) -> PluginResult<Vec<u8>>;
}

/// Order registered with the registry after a successful purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginOrder {
    pub id: String,
    pub token: String,
    pub package: String,
}

/// The plugin registry endpoints used by installation and update checks
#[async_trait]
pub trait PluginRegistryClient: Send + Sync {
    /// Registry manifest of `plugin_id`
    async fn fetch_manifest(&self, plugin_id: &str) -> PluginResult<RemoteManifest>;

    /// Whether the registry has a newer release than `version`
    async fn check_update(&self, plugin_id: &str, version: &str) -> PluginResult<bool>;

    /// Whether the registry API is reachable
    async fn api_status(&self) -> bool;

    async fn place_order(&self, order: &PluginOrder) -> PluginResult<()>;
}

#[derive(Debug, Deserialize)]
struct CheckUpdateResponse {
    #[serde(default)]
    update: bool,
}

fn registry_error(context: &str, e: impl std::fmt::Display) -> PluginSystemError {
    PluginSystemError::Registry {
        message: format!("{}: {}", context, e),
    }
}

fn build_http_client(registry: &RegistryConfig) -> PluginResult<HttpClient> {
    HttpClient::builder()
        .timeout(Duration::from_secs(registry.timeout_secs))
        .build()
        .map_err(|e| registry_error("cannot build HTTP client", e))
}

/// Registry client talking to the hosted plugin API
#[derive(Clone)]
pub struct HttpRegistryClient {
    http_client: HttpClient,
    registry: RegistryConfig,
}

impl std::fmt::Debug for HttpRegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRegistryClient")
            .field("api_base", &self.registry.api_base)
            .finish()
    }
}

impl HttpRegistryClient {
    pub fn new(registry: RegistryConfig) -> PluginResult<Self> {
        Ok(Self {
            http_client: build_http_client(&registry)?,
            registry,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url) -> PluginResult<T> {
        let context = url.to_string();
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| registry_error(&context, e))?
            .error_for_status()
            .map_err(|e| registry_error(&context, e))?;
        response.json::<T>().await.map_err(|e| registry_error(&context, e))
    }
}

#[async_trait]
impl PluginRegistryClient for HttpRegistryClient {
    async fn fetch_manifest(&self, plugin_id: &str) -> PluginResult<RemoteManifest> {
        let url = api_url(&self.registry, &["plugin", plugin_id])?;
        self.get_json(url).await
    }

    async fn check_update(&self, plugin_id: &str, version: &str) -> PluginResult<bool> {
        let url = api_url(&self.registry, &["plugin", "check-update", plugin_id, version])?;
        let response: CheckUpdateResponse = self.get_json(url).await?;
        Ok(response.update)
    }

    async fn api_status(&self) -> bool {
        let Ok(url) = api_url(&self.registry, &["status"]) else {
            return false;
        };
        match self.http_client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::warn!("Registry status check failed: {}", e);
                false
            }
        }
    }

    async fn place_order(&self, order: &PluginOrder) -> PluginResult<()> {
        let url = api_url(&self.registry, &["plugin", "order"])?;
        let context = url.to_string();
        self.http_client
            .post(url)
            .json(order)
            .send()
            .await
            .map_err(|e| registry_error(&context, e))?
            .error_for_status()
            .map_err(|e| registry_error(&context, e))?;
        Ok(())
    }
}

/// Fetches `http(s)` packages over the network and `file:` packages from
/// the storage provider.
#[derive(Clone)]
pub struct HttpPackageFetcher {
    http_client: HttpClient,
    storage: Arc<dyn StorageProvider>,
}

impl std::fmt::Debug for HttpPackageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPackageFetcher")
            .field("storage", &self.storage.name())
            .finish()
    }
}

impl HttpPackageFetcher {
    pub fn new(registry: &RegistryConfig, storage: Arc<dyn StorageProvider>) -> PluginResult<Self> {
        Ok(Self {
            http_client: build_http_client(registry)?,
            storage,
        })
    }

    async fn download_http(&self, url: Url, progress: Option<ProgressFn<'_>>) -> PluginResult<Vec<u8>> {
        let failed = |message: String| PluginSystemError::DownloadFailed {
            url: url.to_string(),
            message,
        };
        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?
            .error_for_status()
            .map_err(|e| failed(e.to_string()))?;

        let total = response.content_length();
        let mut data = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| failed(e.to_string()))?;
            data.extend_from_slice(&chunk);
            if let Some(progress) = progress {
                progress(DownloadProgress {
                    loaded: data.len() as u64,
                    total,
                });
            }
        }
        Ok(data)
    }
}

#[async_trait]
impl PackageFetcher for HttpPackageFetcher {
    async fn download(&self, url: &str, progress: Option<ProgressFn<'_>>) -> PluginResult<Vec<u8>> {
        let failed = |message: String| PluginSystemError::DownloadFailed {
            url: url.to_string(),
            message,
        };
        let parsed = Url::parse(url).map_err(|e| failed(e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => self.download_http(parsed, progress).await,
            "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|_| failed("not a local file path".to_string()))?;
                let data = self
                    .storage
                    .read_to_bytes(&path)
                    .await
                    .map_err(|e| failed(e.to_string()))?;
                if let Some(progress) = progress {
                    let len = data.len() as u64;
                    progress(DownloadProgress {
                        loaded: len,
                        total: Some(len),
                    });
                }
                Ok(data)
            }
            other => Err(failed(format!("unsupported package scheme '{}'", other))),
        }
    }
}
