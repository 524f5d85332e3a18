use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::kernel::constants;
use crate::storage::error::StorageSystemError;
use crate::storage::provider::{StorageProvider, StorageResult};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }

    /// Serialize a value in this format
    pub fn serialize<T: Serialize>(&self, value: &T) -> StorageResult<String> {
        let ser_err = |format: &str, e: Box<dyn std::error::Error + Send + Sync>| {
            StorageSystemError::SerializationError {
                format: format.to_string(),
                source: e,
            }
        };
        match self {
            ConfigFormat::Json => serde_json::to_string_pretty(value).map_err(|e| ser_err("json", Box::new(e))),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(value).map_err(|e| ser_err("yaml", Box::new(e))),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(value).map_err(|e| ser_err("toml", Box::new(e))),
        }
    }

    /// Deserialize a value from a string in this format
    pub fn deserialize<T: for<'de> Deserialize<'de>>(&self, data: &str) -> StorageResult<T> {
        let de_err = |format: &str, e: Box<dyn std::error::Error + Send + Sync>| {
            StorageSystemError::DeserializationError {
                format: format.to_string(),
                source: e,
            }
        };
        match self {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| de_err("json", Box::new(e))),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| de_err("yaml", Box::new(e))),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| de_err("toml", Box::new(e))),
        }
    }
}

/// Filesystem roots used by the plugin subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// One directory per installed plugin
    pub plugins_dir: PathBuf,
    /// One install ledger file per plugin
    pub state_dir: PathBuf,
    /// One private cache file per plugin
    pub cache_dir: PathBuf,
}

/// Plugin registry endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            api_base: constants::DEFAULT_API_BASE.to_string(),
            timeout_secs: constants::DEFAULT_REGISTRY_TIMEOUT_SECS,
        }
    }
}

/// Identity of this installation, reported with registry downloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub device_id: String,
    pub app_version: String,
    pub package_name: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            device_id: "unknown-device".to_string(),
            app_version: constants::APP_VERSION.to_string(),
            package_name: constants::APP_PACKAGE_NAME.to_string(),
        }
    }
}

/// Interpreter used by the subprocess script engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    pub interpreter: String,
    pub args: Vec<String>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            interpreter: "node".to_string(),
            args: Vec::new(),
        }
    }
}

/// Application configuration injected into the installer, loader and manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub paths: PathsConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub device: DeviceInfo,
    #[serde(default)]
    pub script: ScriptConfig,
}

impl AppConfig {
    /// Default configuration with every directory rooted at `data_dir`
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            paths: PathsConfig {
                plugins_dir: data_dir.join(constants::DEFAULT_PLUGINS_DIR),
                state_dir: data_dir.join(constants::DEFAULT_STATE_DIR),
                cache_dir: data_dir.join(constants::DEFAULT_CACHE_DIR),
            },
            registry: RegistryConfig::default(),
            device: DeviceInfo::default(),
            script: ScriptConfig::default(),
        }
    }

    /// Load the configuration at `path`, falling back to defaults rooted at
    /// `data_dir` when the file does not exist.
    pub async fn load_or_default(
        provider: &dyn StorageProvider,
        path: &Path,
        data_dir: &Path,
    ) -> StorageResult<Self> {
        if !provider.exists(path).await {
            log::debug!("No config at {}, using defaults under {}", path.display(), data_dir.display());
            return Ok(Self::with_data_dir(data_dir));
        }
        Self::load(provider, path).await
    }

    /// Load the configuration at `path`; the format follows the file extension
    pub async fn load(provider: &dyn StorageProvider, path: &Path) -> StorageResult<Self> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.display().to_string()))?;
        let data = provider.read_to_string(path).await?;
        format.deserialize(&data)
    }

    /// Save the configuration to `path`; the format follows the file extension
    pub async fn save(&self, provider: &dyn StorageProvider, path: &Path) -> StorageResult<()> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.display().to_string()))?;
        let data = format.serialize(self)?;
        provider.write_bytes(path, data.as_bytes()).await
    }
}
