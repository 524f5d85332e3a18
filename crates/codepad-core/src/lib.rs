pub mod kernel;
pub mod plugin_system;
pub mod storage;
pub mod ui_bridge;
pub mod utils;

// Re-export key public types/traits for easier use by the binary and hosts
pub use kernel::error::{Error, Result};
pub use plugin_system::{DefaultPluginManager, InstallOutcome, PluginManager, PluginManifest, PluginSystemError};
pub use storage::{AppConfig, StorageProvider};
pub use ui_bridge::InstallUi;
