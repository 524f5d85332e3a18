//! # Codepad Core Plugin System
//!
//! Installs, loads, updates and removes third-party plugins.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`archive`]**: reads plugin packages (zip containers) lazily, one
//!   entry at a time.
//! - **[`manifest`]**: the `plugin.json` record ([`PluginManifest`]) with its
//!   default file names and validation, plus the registry's
//!   [`RemoteManifest`].
//! - **[`ledger`]**: per-plugin content ledger and the [`ContentStore`] that
//!   makes an install attempt commit or discard atomically.
//! - **[`dependency`]**: depth-first dependency resolution against the
//!   registry and the installed plugins.
//! - **[`purchase`]**: the purchase gate for paid dependencies.
//! - **[`installer`]**: the installation state machine ([`PluginInstaller`]).
//! - **[`loader`]**: script execution and the init contract with the host
//!   ([`PluginLoader`]).
//! - **[`registry`]**: the filesystem-backed set of installed plugins.
//! - **[`remote`]**: registry client and package fetcher collaborators.
//! - **[`runtime`]**: script engine, host shell and page container contracts.
//! - **[`manager`]**: the [`PluginManager`] façade used by the host shell.
pub mod archive;
pub mod dependency;
pub mod error;
pub mod installer;
pub mod ledger;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod purchase;
pub mod registry;
pub mod remote;
pub mod runtime;
pub mod source;
pub mod update;
pub mod version;

pub use error::{PluginResult, PluginSystemError};
pub use installer::{InstallOutcome, InstallRequest, InstallServices, InstallState, PluginInstaller};
pub use ledger::{ContentLedger, ContentStore};
pub use loader::PluginLoader;
pub use manager::{DefaultPluginManager, HostServices, LoadReport, PluginManager};
pub use manifest::{ManifestBuilder, PluginManifest, RemoteManifest};
pub use registry::{InstalledPlugin, InstalledPlugins};
pub use update::check_plugins_update;

// Test module declaration
#[cfg(test)]
mod tests;
