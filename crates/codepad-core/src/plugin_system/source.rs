use reqwest::Url;

use crate::kernel::constants;
use crate::plugin_system::error::{PluginResult, PluginSystemError};
use crate::storage::config::{DeviceInfo, RegistryConfig};
use crate::utils::checked_segment;

/// Where a plugin package comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallSource {
    /// Installed by bare id from the plugin registry
    Registry { plugin_id: String, url: String },
    /// Installed from a URL or a local/content path given verbatim
    Direct { url: String },
}

/// Whether `id` is a package URL rather than a registry plugin id
pub fn is_direct_source(id: &str) -> bool {
    match id.split_once(':') {
        Some((scheme, _)) => constants::DIRECT_SOURCE_SCHEMES
            .iter()
            .any(|s| s.eq_ignore_ascii_case(scheme)),
        None => false,
    }
}

impl InstallSource {
    /// Classify an install id and build the registry download URL if needed
    pub fn resolve(
        id: &str,
        purchase_token: Option<&str>,
        registry: &RegistryConfig,
        device: &DeviceInfo,
    ) -> PluginResult<Self> {
        if is_direct_source(id) {
            return Ok(InstallSource::Direct { url: id.to_string() });
        }
        checked_segment(id).map_err(|e| PluginSystemError::invalid_plugin(format!("invalid plugin id: {}", e)))?;
        let url = registry_download_url(registry, id, purchase_token, device)?;
        Ok(InstallSource::Registry {
            plugin_id: id.to_string(),
            url,
        })
    }

    pub fn url(&self) -> &str {
        match self {
            InstallSource::Registry { url, .. } | InstallSource::Direct { url } => url,
        }
    }

    /// The plugin id known before the package is read (registry installs only)
    pub fn known_plugin_id(&self) -> Option<&str> {
        match self {
            InstallSource::Registry { plugin_id, .. } => Some(plugin_id),
            InstallSource::Direct { .. } => None,
        }
    }

    pub fn is_registry(&self) -> bool {
        matches!(self, InstallSource::Registry { .. })
    }
}

/// Join path segments onto the registry API base
pub fn api_url(registry: &RegistryConfig, segments: &[&str]) -> PluginResult<Url> {
    let mut url = Url::parse(&registry.api_base).map_err(|e| PluginSystemError::Registry {
        message: format!("invalid registry api base '{}': {}", registry.api_base, e),
    })?;
    {
        let mut path = url.path_segments_mut().map_err(|_| PluginSystemError::Registry {
            message: format!("registry api base '{}' cannot be a base URL", registry.api_base),
        })?;
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

/// `<api_base>/plugin/download/<id>?device=..[&token=..]&package=..&version=..`
pub fn registry_download_url(
    registry: &RegistryConfig,
    plugin_id: &str,
    purchase_token: Option<&str>,
    device: &DeviceInfo,
) -> PluginResult<String> {
    let mut url = api_url(registry, &["plugin", "download", plugin_id])?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("device", &device.device_id);
        if let Some(token) = purchase_token.filter(|t| !t.is_empty()) {
            query.append_pair("token", token);
        }
        query.append_pair("package", &device.package_name);
        query.append_pair("version", &device.app_version);
    }
    Ok(url.into())
}
