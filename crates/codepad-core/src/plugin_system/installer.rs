//! # Plugin installer
//!
//! Drives one installation from package bytes to an activated plugin:
//!
//! ```text
//! Idle -> FetchingPackage -> OpeningArchive -> ValidatingManifest
//!      -> ResolvingDependencies -> InstallingDependencies
//!      -> MaterializingFiles -> Committing -> Activating -> Done
//! ```
//!
//! A failure after the plugin directory is prepared and before the ledger is
//! committed moves through `RollingBack`: the in-memory ledger is discarded
//! and a directory created by this attempt is removed. A directory that
//! already held an earlier install is left in place.
//!
//! Dependency installs are materialized and committed like any other install
//! but their activation is queued and runs right before the top-level plugin
//! is activated.
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use futures::future::join_all;

use crate::kernel::constants;
use crate::plugin_system::archive::{EntryKind, PluginArchive};
use crate::plugin_system::dependency::DependencyResolver;
use crate::plugin_system::error::{PluginResult, PluginSystemError};
use crate::plugin_system::ledger::ContentStore;
use crate::plugin_system::loader::PluginLoader;
use crate::plugin_system::manifest::{PluginManifest, RemoteManifest};
use crate::plugin_system::purchase::{PurchaseGate, PurchaseProvider};
use crate::plugin_system::registry::InstalledPlugins;
use crate::plugin_system::remote::{DownloadProgress, PackageFetcher, PluginRegistryClient, ProgressFn};
use crate::plugin_system::source::InstallSource;
use crate::storage::config::AppConfig;
use crate::storage::provider::StorageProvider;
use crate::ui_bridge::{InstallUi, LoaderGuard};
use crate::utils::{ensure_path, list_files_recursive};

/// Installer progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallState {
    Idle,
    FetchingPackage,
    OpeningArchive,
    ValidatingManifest,
    ResolvingDependencies,
    InstallingDependencies,
    MaterializingFiles,
    Committing,
    Activating,
    RollingBack,
    Done,
}

/// What to install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Registry plugin id, or a package URL for direct installs
    pub id: String,
    /// Display name for the loader indicator
    pub name: Option<String>,
    pub purchase_token: Option<String>,
    pub is_dependency: bool,
}

impl InstallRequest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            purchase_token: None,
            is_dependency: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_purchase_token(mut self, token: Option<String>) -> Self {
        self.purchase_token = token;
        self
    }

    fn dependency(manifest: &RemoteManifest, purchase_token: Option<String>) -> Self {
        Self {
            id: manifest.id().to_string(),
            name: Some(manifest.manifest.display_name().to_string()),
            purchase_token,
            is_dependency: true,
        }
    }
}

/// How an installation ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Installed and activated
    Installed { plugin_id: String },
    /// The user declined the dependency prompt; nothing was changed
    Declined,
}

/// Collaborators the installer works with
#[derive(Clone)]
pub struct InstallServices {
    pub storage: Arc<dyn StorageProvider>,
    pub fetcher: Arc<dyn PackageFetcher>,
    pub registry: Arc<dyn PluginRegistryClient>,
    pub store: Arc<dyn PurchaseProvider>,
    pub ui: Arc<dyn InstallUi>,
}

type InstallFuture<'a> = Pin<Box<dyn Future<Output = PluginResult<InstallOutcome>> + Send + 'a>>;

/// Plugin installer
pub struct PluginInstaller {
    config: AppConfig,
    storage: Arc<dyn StorageProvider>,
    fetcher: Arc<dyn PackageFetcher>,
    ui: Arc<dyn InstallUi>,
    installed: InstalledPlugins,
    resolver: DependencyResolver,
    purchases: PurchaseGate,
    loader: Arc<PluginLoader>,
    state: Mutex<InstallState>,
}

impl std::fmt::Debug for PluginInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstaller")
            .field("plugins_dir", &self.config.paths.plugins_dir)
            .field("state", &self.state())
            .finish()
    }
}

/// Map a failed dependency install to the error reported for the top-level plugin
fn dependency_error(plugin_id: &str, error: PluginSystemError) -> PluginSystemError {
    match error {
        e @ (PluginSystemError::PurchaseRequired { .. }
        | PluginSystemError::PurchaseFailed { .. }
        | PluginSystemError::DependencyInstallFailed { .. }) => e,
        other => PluginSystemError::DependencyInstallFailed {
            plugin_id: plugin_id.to_string(),
            source: Box::new(other),
        },
    }
}

fn dependency_prompt(plugin: &PluginManifest, dependencies: &[RemoteManifest]) -> String {
    let noun = if dependencies.len() == 1 { "dependency" } else { "dependencies" };
    let names: Vec<&str> = dependencies.iter().map(|d| d.manifest.display_name()).collect();
    format!(
        "{} wants to install the following {}: {}",
        plugin.display_name(),
        noun,
        names.join(", ")
    )
}

/// `path` relative to `root` with `/` separators
fn relative_entry_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(segments.join("/"))
}

impl PluginInstaller {
    pub fn new(config: AppConfig, services: InstallServices, loader: Arc<PluginLoader>) -> Self {
        let installed = InstalledPlugins::new(services.storage.clone(), config.paths.plugins_dir.clone());
        let resolver = DependencyResolver::new(services.registry.clone(), installed.clone());
        let purchases = PurchaseGate::new(
            services.store,
            services.registry,
            services.ui.clone(),
            config.device.package_name.clone(),
        );
        Self {
            config,
            storage: services.storage,
            fetcher: services.fetcher,
            ui: services.ui,
            installed,
            resolver,
            purchases,
            loader,
            state: Mutex::new(InstallState::Idle),
        }
    }

    /// Current state of the most recent installation
    pub fn state(&self) -> InstallState {
        self.state.lock().map(|state| *state).unwrap_or(InstallState::Idle)
    }

    fn transition(&self, plugin_id: &str, next: InstallState) {
        if let Ok(mut state) = self.state.lock() {
            log::debug!("Install '{}': {:?} -> {:?}", plugin_id, *state, next);
            *state = next;
        }
    }

    /// Install a plugin and, for top-level installs, activate it.
    ///
    /// The loading indicator is shown for top-level installs and removed
    /// whatever the outcome.
    pub async fn install(&self, request: InstallRequest) -> PluginResult<InstallOutcome> {
        let loader = (!request.is_dependency).then(|| {
            LoaderGuard::show(
                self.ui.clone(),
                request.name.as_deref().unwrap_or(&request.id),
                "Loading...",
            )
        });
        let id = request.id.clone();
        let mut activations = Vec::new();
        let result = self.install_inner(request, loader.as_ref(), &mut activations).await;
        if let Err(e) = &result {
            log::error!("Installation of '{}' failed: {}", id, e);
            self.transition(&id, InstallState::Idle);
        }
        result
    }

    fn install_inner<'a>(
        &'a self,
        request: InstallRequest,
        loader: Option<&'a LoaderGuard>,
        activations: &'a mut Vec<String>,
    ) -> InstallFuture<'a> {
        Box::pin(async move {
            self.transition(&request.id, InstallState::FetchingPackage);
            let source = InstallSource::resolve(
                &request.id,
                request.purchase_token.as_deref(),
                &self.config.registry,
                &self.config.device,
            )?;

            let report = |progress: DownloadProgress| {
                if let (Some(loader), Some(percent)) = (loader, progress.percent()) {
                    loader.set_message(&format!("Loading... {:.0}%", percent));
                }
            };
            let progress: ProgressFn<'_> = &report;
            let bytes = self.fetcher.download(source.url(), Some(progress)).await?;

            self.transition(&request.id, InstallState::OpeningArchive);
            let mut archive = PluginArchive::open(bytes)?;

            self.transition(&request.id, InstallState::ValidatingManifest);
            let mut manifest = archive.read_patched_manifest().map_err(|e| match e {
                PluginSystemError::MissingManifest => {
                    PluginSystemError::invalid_plugin(format!("package has no {}", constants::MANIFEST_FILE))
                }
                other => other,
            })?;
            let plugin_id = match source.known_plugin_id() {
                Some(id) => {
                    if id != manifest.id {
                        log::warn!("Registry plugin '{}' ships manifest id '{}'", id, manifest.id);
                    }
                    id.to_string()
                }
                None => {
                    manifest.source = Some(source.url().to_string());
                    manifest.id.clone()
                }
            };

            if !request.is_dependency && !manifest.dependencies.is_empty() {
                self.transition(&plugin_id, InstallState::ResolvingDependencies);
                let dependencies = self.resolver.resolve(&plugin_id, &manifest.dependencies).await?;
                if !dependencies.is_empty() {
                    let message = dependency_prompt(&manifest, &dependencies);
                    if !self.ui.confirm("Dependencies", &message).await {
                        log::info!("Installation of '{}' declined at dependency prompt", plugin_id);
                        self.transition(&plugin_id, InstallState::Idle);
                        return Ok(InstallOutcome::Declined);
                    }

                    self.transition(&plugin_id, InstallState::InstallingDependencies);
                    for dependency in &dependencies {
                        let token = self.purchases.entitlement(dependency).await?;
                        self.install_inner(InstallRequest::dependency(dependency, token), loader, activations)
                            .await
                            .map_err(|e| dependency_error(dependency.id(), e))?;
                    }
                }
            }

            self.materialize_and_commit(&plugin_id, archive, &manifest).await?;

            if request.is_dependency {
                activations.push(plugin_id.clone());
                return Ok(InstallOutcome::Installed { plugin_id });
            }

            self.transition(&plugin_id, InstallState::Activating);
            self.activate(&plugin_id, activations).await?;
            self.transition(&plugin_id, InstallState::Done);
            log::info!("Installed plugin '{}'", plugin_id);
            Ok(InstallOutcome::Installed { plugin_id })
        })
    }

    /// Write the package into the plugin directory and commit its ledger,
    /// rolling back on failure.
    async fn materialize_and_commit(
        &self,
        plugin_id: &str,
        archive: PluginArchive,
        manifest: &PluginManifest,
    ) -> PluginResult<()> {
        let plugin_dir = self.installed.plugin_dir(plugin_id)?;
        let created = !self.storage.is_dir(&plugin_dir).await;
        if created {
            self.storage.create_dir_all(&plugin_dir).await?;
        }

        let mut store = match ContentStore::open(self.storage.clone(), &self.config.paths.state_dir, plugin_id).await {
            Ok(store) => store,
            Err(e) => {
                self.roll_back(plugin_id, &plugin_dir, created, None).await;
                return Err(e);
            }
        };
        if created {
            store.ignore_committed();
        }

        self.transition(plugin_id, InstallState::MaterializingFiles);
        let result = match self.materialize(archive, manifest, &plugin_dir, &mut store).await {
            Ok(written) => {
                log::debug!("Plugin '{}': {} file(s) written", plugin_id, written);
                self.transition(plugin_id, InstallState::Committing);
                store.commit().await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            self.roll_back(plugin_id, &plugin_dir, created, Some(&mut store)).await;
            return Err(match e {
                PluginSystemError::Storage(e) => PluginSystemError::install_failed(plugin_id, e.to_string()),
                other => other,
            });
        }

        self.remove_stale_files(plugin_id, &plugin_dir, &store).await;
        Ok(())
    }

    /// Decode every entry, then write the changed files concurrently.
    ///
    /// Returns the number of files written. A file whose directory cannot be
    /// created or whose write fails is logged and left out of the ledger; it
    /// does not fail the install.
    async fn materialize(
        &self,
        archive: PluginArchive,
        manifest: &PluginManifest,
        plugin_dir: &Path,
        store: &mut ContentStore,
    ) -> PluginResult<usize> {
        let manifest_bytes = manifest.to_json_bytes()?;
        let mut pending: Vec<(String, Vec<u8>)> = Vec::new();

        for entry in archive.entries() {
            let entry = entry?;
            // Files in the committed ledger already have their directories
            if !store.exists(&entry.path) {
                if let Err(e) = ensure_path(self.storage.as_ref(), plugin_dir, &entry.path).await {
                    log::warn!("Cannot create directory for {}: {}", entry.path, e);
                    store.claim(&entry.path);
                    continue;
                }
            }
            let data = match entry.kind {
                EntryKind::Directory => continue,
                EntryKind::File(_) if entry.path == constants::MANIFEST_FILE => manifest_bytes.clone(),
                EntryKind::File(data) => data,
            };
            if store.is_updated(&entry.path, &data) {
                pending.push((entry.path, data));
            }
        }

        let writes = pending.iter().map(|(path, data)| {
            let target: PathBuf = plugin_dir.join(path);
            async move { self.storage.write_bytes(&target, data).await }
        });
        let results = join_all(writes).await;

        let mut written = 0;
        for ((path, data), result) in pending.iter().zip(results) {
            match result {
                Ok(()) => {
                    store.record_written(path, data);
                    written += 1;
                }
                Err(e) => log::warn!("Failed to write {}: {}", path, e),
            }
        }
        Ok(written)
    }

    async fn roll_back(&self, plugin_id: &str, plugin_dir: &Path, created: bool, store: Option<&mut ContentStore>) {
        self.transition(plugin_id, InstallState::RollingBack);
        if let Some(store) = store {
            store.discard();
        }
        if created {
            if let Err(e) = self.storage.remove_dir_all(plugin_dir).await {
                log::error!("Rollback of '{}' could not remove {}: {}", plugin_id, plugin_dir.display(), e);
            }
        }
        log::error!("Installation of '{}' rolled back", plugin_id);
    }

    /// Delete files left over from a previous install that the new package
    /// no longer ships.
    async fn remove_stale_files(&self, plugin_id: &str, plugin_dir: &Path, store: &ContentStore) {
        let on_disk = match list_files_recursive(self.storage.as_ref(), plugin_dir).await {
            Ok(files) => files,
            Err(e) => {
                log::warn!("Cannot list files of '{}' for cleanup: {}", plugin_id, e);
                return;
            }
        };
        let relative: Vec<String> = on_disk
            .iter()
            .filter_map(|path| relative_entry_path(plugin_dir, path))
            .collect();

        for stale in store.diff_against_disk(relative.iter().map(String::as_str)) {
            let path = plugin_dir.join(&stale);
            match self.storage.remove_file(&path).await {
                Ok(()) => log::debug!("Removed stale file {} of '{}'", stale, plugin_id),
                Err(e) => log::warn!("Cannot remove stale file {}: {}", path.display(), e),
            }
        }
    }

    /// Run queued dependency activations, then activate `plugin_id`.
    ///
    /// Every activation is attempted; the first failure is returned.
    async fn activate(&self, plugin_id: &str, activations: &mut Vec<String>) -> PluginResult<()> {
        let mut first_error = None;
        for dependency in activations.drain(..) {
            if let Err(e) = self.loader.load(&dependency, true).await {
                log::error!("Activation of dependency '{}' failed: {}", dependency, e);
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.loader.load(plugin_id, true).await {
            first_error.get_or_insert(e);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
