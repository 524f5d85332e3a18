use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::plugin_system::error::{PluginResult, PluginSystemError};
use crate::plugin_system::installer::{InstallOutcome, InstallRequest, InstallServices, InstallState, PluginInstaller};
use crate::plugin_system::ledger::ContentLedger;
use crate::plugin_system::loader::PluginLoader;
use crate::plugin_system::purchase::NoStore;
use crate::plugin_system::registry::{InstalledPlugin, InstalledPlugins};
use crate::plugin_system::remote::{HttpPackageFetcher, HttpRegistryClient, PluginRegistryClient};
use crate::plugin_system::runtime::{NavigationStack, PluginHost, ProcessScriptEngine, ScriptEngine};
use crate::plugin_system::update;
use crate::storage::config::AppConfig;
use crate::storage::local::LocalStorageProvider;
use crate::storage::provider::StorageProvider;
use crate::ui_bridge::InstallUi;

/// Result of loading every installed plugin
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<(String, PluginSystemError)>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Plugin lifecycle operations exposed to the host application
#[async_trait]
pub trait PluginManager: Send + Sync {
    /// Install by registry id or package URL, then activate
    async fn install_plugin(
        &self,
        id: &str,
        name: Option<&str>,
        purchase_token: Option<&str>,
    ) -> PluginResult<InstallOutcome>;

    /// Execute and initialize an installed plugin
    async fn load_plugin(&self, id: &str, just_installed: bool) -> PluginResult<()>;

    /// Ids of installed plugins with a newer registry release
    async fn check_plugins_update(&self) -> PluginResult<Vec<String>>;

    /// Unload a plugin and delete its directory, ledger and cache file
    async fn uninstall_plugin(&self, id: &str) -> PluginResult<()>;

    /// Load every installed plugin; failures are collected, not fatal
    async fn load_installed_plugins(&self) -> PluginResult<LoadReport>;

    async fn installed_plugins(&self) -> PluginResult<Vec<InstalledPlugin>>;
}

/// Host-side collaborators used to run plugins
#[derive(Clone)]
pub struct HostServices {
    pub engine: Arc<dyn ScriptEngine>,
    pub host: Arc<dyn PluginHost>,
    pub navigation: Arc<dyn NavigationStack>,
}

/// Default implementation of plugin manager
pub struct DefaultPluginManager {
    config: AppConfig,
    storage: Arc<dyn StorageProvider>,
    registry: Arc<dyn PluginRegistryClient>,
    installed: InstalledPlugins,
    loader: Arc<PluginLoader>,
    installer: PluginInstaller,
}

impl Debug for DefaultPluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultPluginManager")
            .field("plugins_dir", &self.config.paths.plugins_dir)
            .field("state_dir", &self.config.paths.state_dir)
            .field("cache_dir", &self.config.paths.cache_dir)
            .finish()
    }
}

impl DefaultPluginManager {
    pub fn new(config: AppConfig, services: InstallServices, host: HostServices) -> Self {
        let installed = InstalledPlugins::new(services.storage.clone(), config.paths.plugins_dir.clone());
        let loader = Arc::new(PluginLoader::new(
            services.storage.clone(),
            installed.clone(),
            config.paths.cache_dir.clone(),
            host.engine,
            host.host,
            host.navigation,
        ));
        let storage = services.storage.clone();
        let registry = services.registry.clone();
        let installer = PluginInstaller::new(config.clone(), services, loader.clone());
        Self {
            config,
            storage,
            registry,
            installed,
            loader,
            installer,
        }
    }

    /// Manager backed by the local filesystem, the HTTP registry and the
    /// subprocess script engine. No store is available, so paid dependencies
    /// cannot be purchased.
    pub fn with_defaults(
        config: AppConfig,
        ui: Arc<dyn InstallUi>,
        host: Arc<dyn PluginHost>,
        navigation: Arc<dyn NavigationStack>,
    ) -> PluginResult<Self> {
        let storage: Arc<dyn StorageProvider> = Arc::new(LocalStorageProvider::new(PathBuf::new()));
        let services = InstallServices {
            storage: storage.clone(),
            fetcher: Arc::new(HttpPackageFetcher::new(&config.registry, storage.clone())?),
            registry: Arc::new(HttpRegistryClient::new(config.registry.clone())?),
            store: Arc::new(NoStore),
            ui,
        };
        let host = HostServices {
            engine: Arc::new(ProcessScriptEngine::new(&config.script)),
            host,
            navigation,
        };
        Ok(Self::new(config, services, host))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn loader(&self) -> &Arc<PluginLoader> {
        &self.loader
    }

    /// State of the most recent installation
    pub fn install_state(&self) -> InstallState {
        self.installer.state()
    }

    async fn remove_if_present(&self, path: &Path, is_dir: bool) -> PluginResult<()> {
        if !self.storage.exists(path).await {
            return Ok(());
        }
        let removed = if is_dir {
            self.storage.remove_dir_all(path).await
        } else {
            self.storage.remove_file(path).await
        };
        match removed {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PluginManager for DefaultPluginManager {
    async fn install_plugin(
        &self,
        id: &str,
        name: Option<&str>,
        purchase_token: Option<&str>,
    ) -> PluginResult<InstallOutcome> {
        let mut request = InstallRequest::new(id).with_purchase_token(purchase_token.map(str::to_string));
        if let Some(name) = name {
            request = request.with_name(name);
        }
        self.installer.install(request).await
    }

    async fn load_plugin(&self, id: &str, just_installed: bool) -> PluginResult<()> {
        self.loader.load(id, just_installed).await
    }

    async fn check_plugins_update(&self) -> PluginResult<Vec<String>> {
        update::check_plugins_update(&self.installed, &self.registry).await
    }

    async fn uninstall_plugin(&self, id: &str) -> PluginResult<()> {
        let not_installed = || PluginSystemError::NotInstalled {
            plugin_id: id.to_string(),
        };
        let plugin_dir = self.installed.plugin_dir(id).map_err(|e| {
            log::warn!("Refusing to uninstall '{}': {}", id, e);
            not_installed()
        })?;
        if !self.storage.is_dir(&plugin_dir).await {
            return Err(not_installed());
        }
        let ledger = ContentLedger::path_for(&self.config.paths.state_dir, id)?;
        let cache_file = self.loader.cache_file(id)?;

        self.loader.unload(id).await;
        self.remove_if_present(&plugin_dir, true).await?;
        self.remove_if_present(&ledger, false).await?;
        self.remove_if_present(&cache_file, false).await?;
        log::info!("Uninstalled plugin '{}'", id);
        Ok(())
    }

    async fn load_installed_plugins(&self) -> PluginResult<LoadReport> {
        let mut report = LoadReport::default();
        for id in self.installed.ids().await? {
            match self.loader.load(&id, false).await {
                Ok(()) => report.loaded.push(id),
                Err(e) => {
                    log::error!("Failed to load plugin '{}': {}", id, e);
                    report.failed.push((id, e));
                }
            }
        }
        log::info!("Loaded {} plugin(s), {} failed", report.loaded.len(), report.failed.len());
        Ok(report)
    }

    async fn installed_plugins(&self) -> PluginResult<Vec<InstalledPlugin>> {
        self.installed.list().await
    }
}
