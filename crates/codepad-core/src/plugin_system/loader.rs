//! Plugin loading and activation.
//!
//! Loading a plugin means executing its entry script, giving it a page on
//! the host navigation stack and a private cache file, and calling the host's
//! init entry point. [`PluginLoader`] owns the resulting runtime instances.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::kernel::constants;
use crate::plugin_system::error::{PluginResult, PluginSystemError};
use crate::plugin_system::registry::InstalledPlugins;
use crate::plugin_system::runtime::{InitContext, NavigationStack, PluginHost, PluginPage, ScriptEngine};
use crate::storage::provider::StorageProvider;
use crate::utils::checked_segment;

/// Runtime state of one loaded plugin
#[derive(Debug)]
pub struct PluginInstance {
    pub plugin_id: String,
    /// Entry script that was executed
    pub entry: PathBuf,
    pub cache_file: PathBuf,
    pub page: Arc<PluginPage>,
    /// Whether the init entry point completed
    pub initialized: bool,
}

/// Loads installed plugins into the host
pub struct PluginLoader {
    provider: Arc<dyn StorageProvider>,
    installed: InstalledPlugins,
    cache_dir: PathBuf,
    engine: Arc<dyn ScriptEngine>,
    host: Arc<dyn PluginHost>,
    navigation: Arc<dyn NavigationStack>,
    instances: Mutex<HashMap<String, PluginInstance>>,
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLoader")
            .field("plugins_dir", &self.installed.plugins_dir())
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

impl PluginLoader {
    pub fn new(
        provider: Arc<dyn StorageProvider>,
        installed: InstalledPlugins,
        cache_dir: impl Into<PathBuf>,
        engine: Arc<dyn ScriptEngine>,
        host: Arc<dyn PluginHost>,
        navigation: Arc<dyn NavigationStack>,
    ) -> Self {
        Self {
            provider,
            installed,
            cache_dir: cache_dir.into(),
            engine,
            host,
            navigation,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Private cache file of `plugin_id`
    pub fn cache_file(&self, plugin_id: &str) -> PluginResult<PathBuf> {
        Ok(self.cache_dir.join(checked_segment(plugin_id)?))
    }

    async fn is_file(&self, path: &Path) -> bool {
        self.provider.exists(path).await && !self.provider.is_dir(path).await
    }

    /// Declared `main` if it exists on disk, otherwise `main.js`
    async fn entry_script(&self, plugin_dir: &Path, main: &str) -> PathBuf {
        if !main.trim().is_empty() {
            let declared = plugin_dir.join(main);
            if self.is_file(&declared).await {
                return declared;
            }
            log::debug!("Entry '{}' missing, falling back to {}", main, constants::DEFAULT_MAIN);
        }
        plugin_dir.join(constants::DEFAULT_MAIN)
    }

    async fn ensure_cache_file(&self, plugin_id: &str) -> PluginResult<PathBuf> {
        if !self.provider.is_dir(&self.cache_dir).await {
            self.provider.create_dir_all(&self.cache_dir).await?;
        }
        let cache_file = self.cache_file(plugin_id)?;
        self.provider.create_file(&cache_file).await?;
        Ok(cache_file)
    }

    /// Execute and initialize an installed plugin.
    ///
    /// A plugin that is already loaded is unloaded first. If the init entry
    /// point fails the script stays loaded and `InitFailed` is returned.
    pub async fn load(&self, plugin_id: &str, just_installed: bool) -> PluginResult<()> {
        let script_error = |message: String| PluginSystemError::ScriptLoadError {
            plugin_id: plugin_id.to_string(),
            message,
        };
        if plugin_id.trim().is_empty() {
            return Err(script_error("plugin id is empty".to_string()));
        }

        let manifest = self
            .installed
            .read_manifest(plugin_id)
            .await?
            .ok_or_else(|| PluginSystemError::NotInstalled {
                plugin_id: plugin_id.to_string(),
            })?;
        let plugin_dir = self.installed.plugin_dir(plugin_id)?;
        let entry = self.entry_script(&plugin_dir, &manifest.main).await;
        if !self.is_file(&entry).await {
            return Err(script_error(format!("entry script {} not found", entry.display())));
        }

        let cache_file = self.ensure_cache_file(plugin_id).await?;
        self.unload(plugin_id).await;

        log::debug!("Executing {} for plugin '{}'", entry.display(), plugin_id);
        self.engine
            .execute(plugin_id, &entry)
            .await
            .map_err(|e| script_error(e.message))?;

        let page = Arc::new(PluginPage::new(plugin_id, manifest.display_name(), self.navigation.clone()));
        let mut base_url = self.host.convert_file_src(&plugin_dir);
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let context = InitContext {
            cache_file_url: self.host.convert_file_src(&cache_file),
            cache_file: cache_file.clone(),
            first_init: just_installed,
        };

        self.instances.lock().await.insert(
            plugin_id.to_string(),
            PluginInstance {
                plugin_id: plugin_id.to_string(),
                entry,
                cache_file,
                page: page.clone(),
                initialized: false,
            },
        );

        if let Err(e) = self.host.init_plugin(plugin_id, &base_url, page, context).await {
            log::error!("Plugin '{}' failed to initialize: {}", plugin_id, e);
            return Err(PluginSystemError::InitFailed {
                plugin_id: plugin_id.to_string(),
                message: e.message,
            });
        }

        if let Some(instance) = self.instances.lock().await.get_mut(plugin_id) {
            instance.initialized = true;
        }
        log::info!("Loaded plugin '{}'", plugin_id);
        Ok(())
    }

    /// Drop the runtime instance of `plugin_id` and remove its page.
    ///
    /// Returns false if the plugin was not loaded.
    pub async fn unload(&self, plugin_id: &str) -> bool {
        let Some(instance) = self.instances.lock().await.remove(plugin_id) else {
            return false;
        };
        instance.page.hide();
        self.host.unmount_plugin(plugin_id).await;
        log::debug!("Unloaded plugin '{}'", plugin_id);
        true
    }

    pub async fn is_loaded(&self, plugin_id: &str) -> bool {
        self.instances.lock().await.contains_key(plugin_id)
    }

    /// Whether the init entry point of a loaded plugin completed
    pub async fn is_initialized(&self, plugin_id: &str) -> bool {
        self.instances
            .lock()
            .await
            .get(plugin_id)
            .is_some_and(|instance| instance.initialized)
    }

    /// Ids of the loaded plugins, sorted
    pub async fn loaded_plugins(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.instances.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The page of a loaded plugin
    pub async fn page(&self, plugin_id: &str) -> Option<Arc<PluginPage>> {
        self.instances
            .lock()
            .await
            .get(plugin_id)
            .map(|instance| instance.page.clone())
    }
}
