use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::kernel::constants;
use crate::plugin_system::error::PluginResult;
use crate::plugin_system::manifest::PluginManifest;
use crate::storage::provider::StorageProvider;
use crate::utils::checked_segment;

/// An installed plugin: its directory name and installed manifest
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledPlugin {
    pub id: String,
    pub manifest: PluginManifest,
}

/// Filesystem-backed view of the installed plugins.
///
/// A directory under the plugins root is an installed plugin when it holds a
/// readable `plugin.json` naming a non-empty main script.
#[derive(Debug, Clone)]
pub struct InstalledPlugins {
    provider: Arc<dyn StorageProvider>,
    plugins_dir: PathBuf,
}

impl InstalledPlugins {
    pub fn new(provider: Arc<dyn StorageProvider>, plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            plugins_dir: plugins_dir.into(),
        }
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// Directory a plugin is (or would be) installed into.
    ///
    /// Fails with `InvalidPath` for ids that are not a single directory name.
    pub fn plugin_dir(&self, plugin_id: &str) -> PluginResult<PathBuf> {
        Ok(self.plugins_dir.join(checked_segment(plugin_id)?))
    }

    pub fn manifest_path(&self, plugin_id: &str) -> PluginResult<PathBuf> {
        Ok(self.plugin_dir(plugin_id)?.join(constants::MANIFEST_FILE))
    }

    /// Installed manifest of `plugin_id`; `None` when there is no `plugin.json`
    pub async fn read_manifest(&self, plugin_id: &str) -> PluginResult<Option<PluginManifest>> {
        let path = self.manifest_path(plugin_id)?;
        let data = match self.provider.read_to_bytes(&path).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        PluginManifest::from_slice(&data).map(Some)
    }

    /// Manifest of `plugin_id` if it passes the membership test
    pub async fn get(&self, plugin_id: &str) -> Option<PluginManifest> {
        if plugin_id.is_empty() {
            return None;
        }
        match self.read_manifest(plugin_id).await {
            Ok(Some(manifest)) if !manifest.main.trim().is_empty() => Some(manifest),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Ignoring plugin directory '{}': {}", plugin_id, e);
                None
            }
        }
    }

    pub async fn is_installed(&self, plugin_id: &str) -> bool {
        self.get(plugin_id).await.is_some()
    }

    /// Version of the installed plugin, if any
    pub async fn installed_version(&self, plugin_id: &str) -> Option<String> {
        self.get(plugin_id).await.map(|manifest| manifest.version)
    }

    /// Every installed plugin, sorted by directory name
    pub async fn list(&self) -> PluginResult<Vec<InstalledPlugin>> {
        if !self.provider.is_dir(&self.plugins_dir).await {
            return Ok(Vec::new());
        }
        let mut plugins = Vec::new();
        for entry in self.provider.read_dir(&self.plugins_dir).await? {
            if !entry.is_dir {
                continue;
            }
            if let Some(manifest) = self.get(&entry.name).await {
                plugins.push(InstalledPlugin {
                    id: entry.name,
                    manifest,
                });
            }
        }
        Ok(plugins)
    }

    /// Ids of every installed plugin
    pub async fn ids(&self) -> PluginResult<Vec<String>> {
        Ok(self.list().await?.into_iter().map(|plugin| plugin.id).collect())
    }
}
