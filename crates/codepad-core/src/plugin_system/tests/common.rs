//! Fixtures shared by the plugin system tests: a zip package builder and
//! in-memory fakes for every collaborator.
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::plugin_system::error::{PluginResult, PluginSystemError};
use crate::plugin_system::installer::InstallServices;
use crate::plugin_system::manager::{DefaultPluginManager, HostServices};
use crate::plugin_system::manifest::{PluginManifest, RemoteManifest};
use crate::plugin_system::purchase::{Product, Purchase, PurchaseProvider};
use crate::plugin_system::remote::{DownloadProgress, PackageFetcher, PluginOrder, PluginRegistryClient, ProgressFn};
use crate::plugin_system::runtime::{InitContext, PageStack, PluginHost, PluginPage, RuntimeError, ScriptEngine};
use crate::storage::config::AppConfig;
use crate::storage::error::StorageSystemError;
use crate::storage::local::LocalStorageProvider;
use crate::storage::provider::{DirEntry, StorageProvider, StorageResult};
use crate::ui_bridge::InstallUi;

pub const API_BASE: &str = "https://registry.test/api";

// --- Packages ---

/// Builds plugin packages in memory
pub struct PackageBuilder {
    entries: Vec<(String, Option<Vec<u8>>)>,
    method: CompressionMethod,
}

impl PackageBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            method: CompressionMethod::Deflated,
        }
    }

    /// Package with `plugin.json` for `manifest` and a `main.js`
    pub fn plugin(manifest: &PluginManifest) -> Self {
        Self::new()
            .manifest(manifest)
            .file("main.js", format!("// {}@{}", manifest.id, manifest.version).as_bytes())
    }

    pub fn manifest(self, manifest: &PluginManifest) -> Self {
        let json = serde_json::to_vec(manifest).expect("manifest serializes");
        self.file("plugin.json", &json)
    }

    pub fn file(mut self, path: &str, data: &[u8]) -> Self {
        self.entries.push((path.to_string(), Some(data.to_vec())));
        self
    }

    pub fn dir(mut self, path: &str) -> Self {
        self.entries.push((path.to_string(), None));
        self
    }

    /// Store entries uncompressed, so entry bytes appear verbatim in the package
    pub fn stored(mut self) -> Self {
        self.method = CompressionMethod::Stored;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(self.method);
        for (path, data) in self.entries {
            match data {
                Some(data) => {
                    writer.start_file(path.as_str(), options).expect("start zip entry");
                    writer.write_all(&data).expect("write zip entry");
                }
                None => writer.add_directory(path.as_str(), options).expect("add zip directory"),
            }
        }
        writer.finish().expect("finish zip").into_inner()
    }
}

/// Flip one byte of the first occurrence of `needle` inside `package`
pub fn corrupt(mut package: Vec<u8>, needle: &[u8]) -> Vec<u8> {
    let position = package
        .windows(needle.len())
        .position(|window| window == needle)
        .expect("needle present in package");
    package[position] ^= 0xff;
    package
}

// --- Storage ---

/// Local storage that counts writes and can be told to fail some of them
#[derive(Debug)]
pub struct TestStorage {
    inner: LocalStorageProvider,
    writes: Mutex<Vec<PathBuf>>,
    failing_suffixes: Mutex<Vec<String>>,
}

impl TestStorage {
    pub fn new() -> Self {
        Self {
            inner: LocalStorageProvider::new(PathBuf::new()),
            writes: Mutex::new(Vec::new()),
            failing_suffixes: Mutex::new(Vec::new()),
        }
    }

    /// Make writes to paths ending with `suffix` fail
    pub fn fail_writes_to(&self, suffix: &str) {
        self.failing_suffixes.lock().unwrap().push(suffix.to_string());
    }

    /// Successful writes below `dir`
    pub fn writes_under(&self, dir: &Path) -> Vec<PathBuf> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|path| path.starts_with(dir))
            .cloned()
            .collect()
    }

    pub fn reset_writes(&self) {
        self.writes.lock().unwrap().clear();
    }
}

#[async_trait]
impl StorageProvider for TestStorage {
    fn name(&self) -> &str {
        "test"
    }

    async fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path).await
    }

    async fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        self.inner.create_dir_all(path).await
    }

    async fn create_file(&self, path: &Path) -> StorageResult<()> {
        self.inner.create_file(path).await
    }

    async fn read_to_bytes(&self, path: &Path) -> StorageResult<Vec<u8>> {
        self.inner.read_to_bytes(path).await
    }

    async fn read_to_string(&self, path: &Path) -> StorageResult<String> {
        self.inner.read_to_string(path).await
    }

    async fn write_bytes(&self, path: &Path, contents: &[u8]) -> StorageResult<()> {
        let fails = {
            let suffixes = self.failing_suffixes.lock().unwrap();
            let display = path.to_string_lossy();
            suffixes.iter().any(|suffix| display.ends_with(suffix.as_str()))
        };
        if fails {
            return Err(StorageSystemError::OperationFailed {
                operation: "write_bytes".to_string(),
                path: Some(path.to_path_buf()),
                message: "injected failure".to_string(),
            });
        }
        self.inner.write_bytes(path, contents).await?;
        self.writes.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> StorageResult<()> {
        self.inner.remove_file(path).await
    }

    async fn remove_dir_all(&self, path: &Path) -> StorageResult<()> {
        self.inner.remove_dir_all(path).await
    }

    async fn read_dir(&self, path: &Path) -> StorageResult<Vec<DirEntry>> {
        self.inner.read_dir(path).await
    }
}

// --- Registry and downloads ---

#[derive(Default)]
pub struct FakeRegistry {
    manifests: Mutex<HashMap<String, RemoteManifest>>,
    updates: Mutex<HashMap<String, bool>>,
    offline: AtomicBool,
    pub orders: Mutex<Vec<PluginOrder>>,
    pub manifest_fetches: AtomicUsize,
}

impl FakeRegistry {
    pub fn publish(&self, manifest: RemoteManifest) {
        self.manifests
            .lock()
            .unwrap()
            .insert(manifest.id().to_string(), manifest);
    }

    /// Serve `manifest` when `plugin_id` is requested, whatever id it carries
    pub fn publish_as(&self, plugin_id: &str, manifest: RemoteManifest) {
        self.manifests.lock().unwrap().insert(plugin_id.to_string(), manifest);
    }

    /// Answer for the update check of `plugin_id`; unset ids fail the check
    pub fn set_update(&self, plugin_id: &str, update: bool) {
        self.updates.lock().unwrap().insert(plugin_id.to_string(), update);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl PluginRegistryClient for FakeRegistry {
    async fn fetch_manifest(&self, plugin_id: &str) -> PluginResult<RemoteManifest> {
        self.manifest_fetches.fetch_add(1, Ordering::SeqCst);
        self.manifests
            .lock()
            .unwrap()
            .get(plugin_id)
            .cloned()
            .ok_or_else(|| PluginSystemError::Registry {
                message: format!("404 for {}", plugin_id),
            })
    }

    async fn check_update(&self, plugin_id: &str, _version: &str) -> PluginResult<bool> {
        self.updates
            .lock()
            .unwrap()
            .get(plugin_id)
            .copied()
            .ok_or_else(|| PluginSystemError::Registry {
                message: format!("check-update failed for {}", plugin_id),
            })
    }

    async fn api_status(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }

    async fn place_order(&self, order: &PluginOrder) -> PluginResult<()> {
        self.orders.lock().unwrap().push(order.clone());
        Ok(())
    }
}

/// Serves packages by registry plugin id or by exact URL
#[derive(Default)]
pub struct FakeFetcher {
    registry_packages: Mutex<HashMap<String, Vec<u8>>>,
    url_packages: Mutex<HashMap<String, Vec<u8>>>,
    pub requested: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn serve_plugin(&self, plugin_id: &str, package: Vec<u8>) {
        self.registry_packages
            .lock()
            .unwrap()
            .insert(plugin_id.to_string(), package);
    }

    pub fn serve_url(&self, url: &str, package: Vec<u8>) {
        self.url_packages.lock().unwrap().insert(url.to_string(), package);
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl PackageFetcher for FakeFetcher {
    async fn download(&self, url: &str, progress: Option<ProgressFn<'_>>) -> PluginResult<Vec<u8>> {
        self.requested.lock().unwrap().push(url.to_string());
        let by_url = self.url_packages.lock().unwrap().get(url).cloned();
        let package = by_url.or_else(|| {
            let packages = self.registry_packages.lock().unwrap();
            packages
                .iter()
                .find(|(id, _)| url.contains(&format!("/plugin/download/{}?", id)))
                .map(|(_, package)| package.clone())
        });
        let package = package.ok_or_else(|| PluginSystemError::DownloadFailed {
            url: url.to_string(),
            message: "404".to_string(),
        })?;
        if let Some(progress) = progress {
            let total = package.len() as u64;
            progress(DownloadProgress { loaded: total / 2, total: Some(total) });
            progress(DownloadProgress { loaded: total, total: Some(total) });
        }
        Ok(package)
    }
}

// --- Purchases ---

#[derive(Default)]
pub struct FakeStore {
    products: Mutex<HashMap<String, Product>>,
    purchases: Mutex<Vec<Purchase>>,
    fail_purchase: AtomicBool,
    pub purchase_calls: AtomicUsize,
}

impl FakeStore {
    pub fn add_product(&self, sku: &str) {
        self.products.lock().unwrap().insert(
            sku.to_string(),
            Product {
                product_id: sku.to_string(),
                details: serde_json::json!({ "sku": sku }),
            },
        );
    }

    pub fn add_purchase(&self, product_id: &str, token: &str) {
        self.purchases.lock().unwrap().push(Purchase {
            product_ids: vec![product_id.to_string()],
            purchase_token: token.to_string(),
        });
    }

    pub fn set_fail_purchase(&self, fail: bool) {
        self.fail_purchase.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PurchaseProvider for FakeStore {
    async fn get_product(&self, sku: &str) -> PluginResult<Option<Product>> {
        Ok(self.products.lock().unwrap().get(sku).cloned())
    }

    async fn purchase(&self, product: &Product) -> PluginResult<()> {
        self.purchase_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_purchase.load(Ordering::SeqCst) {
            return Err(PluginSystemError::PurchaseFailed {
                plugin_id: product.product_id.clone(),
                message: "user cancelled".to_string(),
            });
        }
        self.add_purchase(&product.product_id, &format!("token-{}", product.product_id));
        Ok(())
    }

    async fn get_purchases(&self) -> PluginResult<Vec<Purchase>> {
        Ok(self.purchases.lock().unwrap().clone())
    }
}

// --- UI ---

pub struct RecordingUi {
    answer: AtomicBool,
    pub prompts: Mutex<Vec<String>>,
    pub alerts: Mutex<Vec<String>>,
    pub loader_messages: Mutex<Vec<String>>,
    pub loaders_shown: AtomicUsize,
    pub loaders_destroyed: AtomicUsize,
}

impl RecordingUi {
    pub fn new(answer: bool) -> Self {
        Self {
            answer: AtomicBool::new(answer),
            prompts: Mutex::new(Vec::new()),
            alerts: Mutex::new(Vec::new()),
            loader_messages: Mutex::new(Vec::new()),
            loaders_shown: AtomicUsize::new(0),
            loaders_destroyed: AtomicUsize::new(0),
        }
    }

    pub fn set_answer(&self, answer: bool) {
        self.answer.store(answer, Ordering::SeqCst);
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl InstallUi for RecordingUi {
    async fn confirm(&self, _title: &str, message: &str) -> bool {
        self.prompts.lock().unwrap().push(message.to_string());
        self.answer.load(Ordering::SeqCst)
    }

    fn show_loader(&self, _title: &str, _message: &str) {
        self.loaders_shown.fetch_add(1, Ordering::SeqCst);
    }

    fn set_loader_message(&self, message: &str) {
        self.loader_messages.lock().unwrap().push(message.to_string());
    }

    fn destroy_loader(&self) {
        self.loaders_destroyed.fetch_add(1, Ordering::SeqCst);
    }

    fn alert(&self, _title: &str, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }
}

// --- Runtime ---

#[derive(Default)]
pub struct RecordingEngine {
    pub executed: Mutex<Vec<(String, PathBuf)>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingEngine {
    pub fn fail_for(&self, plugin_id: &str) {
        self.failing.lock().unwrap().insert(plugin_id.to_string());
    }

    pub fn executed_ids(&self) -> Vec<String> {
        self.executed.lock().unwrap().iter().map(|(id, _)| id.clone()).collect()
    }
}

#[async_trait]
impl ScriptEngine for RecordingEngine {
    async fn execute(&self, plugin_id: &str, entry: &Path) -> Result<(), RuntimeError> {
        if self.failing.lock().unwrap().contains(plugin_id) {
            return Err(RuntimeError::new("SyntaxError: unexpected token"));
        }
        self.executed
            .lock()
            .unwrap()
            .push((plugin_id.to_string(), entry.to_path_buf()));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct InitCall {
    pub plugin_id: String,
    pub base_url: String,
    pub context: InitContext,
}

#[derive(Default)]
pub struct RecordingHost {
    pub inits: Mutex<Vec<InitCall>>,
    pub unmounted: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    show_pages: AtomicBool,
}

impl RecordingHost {
    pub fn fail_for(&self, plugin_id: &str) {
        self.failing.lock().unwrap().insert(plugin_id.to_string());
    }

    /// Make every init call `show()` on the page it receives
    pub fn show_pages(&self) {
        self.show_pages.store(true, Ordering::SeqCst);
    }

    pub fn init_ids(&self) -> Vec<String> {
        self.inits.lock().unwrap().iter().map(|call| call.plugin_id.clone()).collect()
    }
}

#[async_trait]
impl PluginHost for RecordingHost {
    fn convert_file_src(&self, path: &Path) -> String {
        format!("https://localhost/_app_file_{}", path.display())
    }

    async fn init_plugin(
        &self,
        plugin_id: &str,
        base_url: &str,
        page: Arc<PluginPage>,
        context: InitContext,
    ) -> Result<(), RuntimeError> {
        self.inits.lock().unwrap().push(InitCall {
            plugin_id: plugin_id.to_string(),
            base_url: base_url.to_string(),
            context,
        });
        if self.show_pages.load(Ordering::SeqCst) {
            page.show();
        }
        if self.failing.lock().unwrap().contains(plugin_id) {
            return Err(RuntimeError::new("init threw"));
        }
        Ok(())
    }

    async fn unmount_plugin(&self, plugin_id: &str) {
        self.unmounted.lock().unwrap().push(plugin_id.to_string());
    }
}

// --- Harness ---

/// A manager wired to fakes, rooted in a temp directory
pub struct Harness {
    pub temp: TempDir,
    pub config: AppConfig,
    pub storage: Arc<TestStorage>,
    pub registry: Arc<FakeRegistry>,
    pub fetcher: Arc<FakeFetcher>,
    pub store: Arc<FakeStore>,
    pub ui: Arc<RecordingUi>,
    pub engine: Arc<RecordingEngine>,
    pub host: Arc<RecordingHost>,
    pub navigation: Arc<PageStack>,
    pub manager: DefaultPluginManager,
}

impl Harness {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("Failed to create temp directory");
        let mut config = AppConfig::with_data_dir(temp.path());
        config.registry.api_base = API_BASE.to_string();
        config.device.device_id = "device-1".to_string();

        let storage = Arc::new(TestStorage::new());
        let registry = Arc::new(FakeRegistry::default());
        let fetcher = Arc::new(FakeFetcher::default());
        let store = Arc::new(FakeStore::default());
        let ui = Arc::new(RecordingUi::new(true));
        let engine = Arc::new(RecordingEngine::default());
        let host = Arc::new(RecordingHost::default());
        let navigation = Arc::new(PageStack::new());

        let manager = DefaultPluginManager::new(
            config.clone(),
            InstallServices {
                storage: storage.clone(),
                fetcher: fetcher.clone(),
                registry: registry.clone(),
                store: store.clone(),
                ui: ui.clone(),
            },
            HostServices {
                engine: engine.clone(),
                host: host.clone(),
                navigation: navigation.clone(),
            },
        );

        Self {
            temp,
            config,
            storage,
            registry,
            fetcher,
            store,
            ui,
            engine,
            host,
            navigation,
            manager,
        }
    }

    pub fn plugin_dir(&self, plugin_id: &str) -> PathBuf {
        self.config.paths.plugins_dir.join(plugin_id)
    }

    pub fn ledger_path(&self, plugin_id: &str) -> PathBuf {
        self.config.paths.state_dir.join(format!("{}.json", plugin_id))
    }

    pub fn cache_file(&self, plugin_id: &str) -> PathBuf {
        self.config.paths.cache_dir.join(plugin_id)
    }

    /// Publish `manifest` in the registry and serve `package` for it
    pub fn publish(&self, manifest: RemoteManifest, package: Vec<u8>) {
        self.fetcher.serve_plugin(manifest.id(), package);
        self.registry.publish(manifest);
    }

    /// Publish a free plugin with a default package built from `manifest`
    pub fn publish_plugin(&self, manifest: PluginManifest) {
        let package = PackageBuilder::plugin(&manifest).build();
        self.publish(
            RemoteManifest {
                manifest,
                price: 0.0,
                sku: None,
            },
            package,
        );
    }

    pub fn read_ledger(&self, plugin_id: &str) -> Option<serde_json::Value> {
        let data = std::fs::read(self.ledger_path(plugin_id)).ok()?;
        serde_json::from_slice(&data).ok()
    }
}

/// Write an installed plugin directly to disk, bypassing the installer
pub fn install_on_disk(harness: &Harness, manifest: &PluginManifest, files: &[(&str, &str)]) {
    let dir = harness.plugin_dir(&manifest.id);
    std::fs::create_dir_all(&dir).expect("create plugin dir");
    std::fs::write(dir.join("plugin.json"), serde_json::to_vec(manifest).expect("manifest serializes"))
        .expect("write manifest");
    for (path, content) in files {
        let target = dir.join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(target, content).expect("write file");
    }
}
