//! Contracts between the plugin loader and the host shell.
//!
//! The loader executes entry scripts through a [`ScriptEngine`], hands each
//! plugin a [`PluginPage`] on the host's [`NavigationStack`], and calls the
//! host's init entry point ([`PluginHost::init_plugin`]).
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::process::Command;

use crate::storage::config::ScriptConfig;

/// Failure reported by a script engine or by the host's init entry point
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Executes a plugin's entry script
#[async_trait]
pub trait ScriptEngine: Send + Sync {
    /// Run the top-level code of `entry`. An error means the script failed to
    /// parse or threw while executing.
    async fn execute(&self, plugin_id: &str, entry: &Path) -> Result<(), RuntimeError>;
}

/// Ordered stack of pages owned by the host UI
pub trait NavigationStack: Send + Sync {
    fn push(&self, page_id: &str, title: &str);

    fn remove(&self, page_id: &str);
}

/// Page container handed to a plugin at init.
///
/// `show` pushes the page onto the navigation stack, `hide` removes it.
pub struct PluginPage {
    plugin_id: String,
    title: String,
    navigation: Arc<dyn NavigationStack>,
    shown: AtomicBool,
}

impl std::fmt::Debug for PluginPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginPage")
            .field("plugin_id", &self.plugin_id)
            .field("title", &self.title)
            .field("shown", &self.is_shown())
            .finish()
    }
}

impl PluginPage {
    pub fn new(plugin_id: &str, title: &str, navigation: Arc<dyn NavigationStack>) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            title: title.to_string(),
            navigation,
            shown: AtomicBool::new(false),
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn show(&self) {
        if !self.shown.swap(true, Ordering::SeqCst) {
            self.navigation.push(&self.plugin_id, &self.title);
        }
    }

    pub fn hide(&self) {
        if self.shown.swap(false, Ordering::SeqCst) {
            self.navigation.remove(&self.plugin_id);
        }
    }

    pub fn is_shown(&self) -> bool {
        self.shown.load(Ordering::SeqCst)
    }
}

/// Extra arguments of the init entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitContext {
    /// Front-end addressable URL of the plugin's private cache file
    pub cache_file_url: String,
    pub cache_file: PathBuf,
    /// True right after installation
    pub first_init: bool,
}

/// The host application shell
#[async_trait]
pub trait PluginHost: Send + Sync {
    /// URL under which the front end can address a local path
    fn convert_file_src(&self, path: &Path) -> String;

    /// Run the init entry point the plugin's script registered
    async fn init_plugin(
        &self,
        plugin_id: &str,
        base_url: &str,
        page: Arc<PluginPage>,
        context: InitContext,
    ) -> Result<(), RuntimeError>;

    /// Called when a plugin is unloaded
    async fn unmount_plugin(&self, _plugin_id: &str) {}
}

/// Navigation stack kept in memory, for hosts without a page UI
#[derive(Debug, Default)]
pub struct PageStack {
    pages: Mutex<Vec<String>>,
}

impl PageStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page ids, bottom first
    pub fn pages(&self) -> Vec<String> {
        self.pages.lock().map(|pages| pages.clone()).unwrap_or_default()
    }
}

impl NavigationStack for PageStack {
    fn push(&self, page_id: &str, _title: &str) {
        if let Ok(mut pages) = self.pages.lock() {
            pages.push(page_id.to_string());
        }
    }

    fn remove(&self, page_id: &str) {
        if let Ok(mut pages) = self.pages.lock() {
            pages.retain(|id| id != page_id);
        }
    }
}

/// Runs entry scripts in a child process of a configured interpreter
#[derive(Debug, Clone)]
pub struct ProcessScriptEngine {
    interpreter: String,
    args: Vec<String>,
}

impl ProcessScriptEngine {
    pub fn new(config: &ScriptConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            args: config.args.clone(),
        }
    }
}

#[async_trait]
impl ScriptEngine for ProcessScriptEngine {
    async fn execute(&self, plugin_id: &str, entry: &Path) -> Result<(), RuntimeError> {
        let mut command = Command::new(&self.interpreter);
        command.args(&self.args).arg(entry).env("CODEPAD_PLUGIN_ID", plugin_id);
        if let Some(dir) = entry.parent() {
            command.current_dir(dir);
        }

        log::debug!("Running {} {:?} {}", self.interpreter, self.args, entry.display());
        let output = command
            .output()
            .await
            .map_err(|e| RuntimeError::new(format!("cannot start '{}': {}", self.interpreter, e)))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = match stderr.trim() {
            "" => format!("interpreter exited with {}", output.status),
            detail => format!("interpreter exited with {}: {}", output.status, detail),
        };
        Err(RuntimeError::new(message))
    }
}
