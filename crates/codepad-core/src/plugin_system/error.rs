//! # Codepad Core Plugin System Errors
//!
//! [`PluginSystemError`] is the taxonomy surfaced by installation, loading,
//! update checks and removal. Every variant is terminal for the call that
//! produced it; nothing here is retried internally.
use crate::storage::error::StorageSystemError;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    /// Bad or missing manifest, or no entry script after defaulting
    #[error("Invalid plugin: {message}")]
    InvalidPlugin { message: String },

    /// The package container has no `plugin.json`
    #[error("Plugin package has no manifest entry")]
    MissingManifest,

    /// The package container could not be parsed or an entry failed to decode
    #[error("Corrupt plugin archive: {message}")]
    CorruptArchive { message: String },

    #[error("Unknown plugin dependency: {plugin_id}")]
    UnknownDependency { plugin_id: String },

    #[error("Failed to install dependency '{plugin_id}': {source}")]
    DependencyInstallFailed {
        plugin_id: String,
        #[source]
        source: Box<PluginSystemError>,
    },

    #[error("Download failed for '{url}': {message}")]
    DownloadFailed { url: String, message: String },

    #[error("Plugin '{plugin_id}' must be purchased before it can be installed")]
    PurchaseRequired { plugin_id: String },

    #[error("Purchase of plugin '{plugin_id}' failed: {message}")]
    PurchaseFailed { plugin_id: String, message: String },

    #[error("Installation of '{plugin_id}' failed: {message}")]
    InstallFailed { plugin_id: String, message: String },

    /// Entry script failed to parse or threw during top-level execution
    #[error("Failed to load script for plugin {plugin_id}: {message}")]
    ScriptLoadError { plugin_id: String, message: String },

    /// The plugin's init entry point failed; the script stays loaded
    #[error("Plugin '{plugin_id}' failed to initialize: {message}")]
    InitFailed { plugin_id: String, message: String },

    #[error("Plugin '{plugin_id}' is not installed")]
    NotInstalled { plugin_id: String },

    #[error("Registry request failed: {message}")]
    Registry { message: String },

    #[error(transparent)]
    Storage(#[from] StorageSystemError),
}

impl PluginSystemError {
    pub fn invalid_plugin(message: impl Into<String>) -> Self {
        PluginSystemError::InvalidPlugin { message: message.into() }
    }

    pub fn corrupt_archive(message: impl Into<String>) -> Self {
        PluginSystemError::CorruptArchive { message: message.into() }
    }

    pub fn install_failed(plugin_id: &str, message: impl Into<String>) -> Self {
        PluginSystemError::InstallFailed {
            plugin_id: plugin_id.to_string(),
            message: message.into(),
        }
    }
}

/// Shorthand for plugin system results
pub type PluginResult<T> = std::result::Result<T, PluginSystemError>;
