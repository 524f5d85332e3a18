pub mod provider;
pub mod local;
pub mod config;
pub mod error;

/// Re-export key types
pub use provider::{DirEntry, StorageProvider, StorageResult};
pub use local::LocalStorageProvider;
pub use config::{AppConfig, ConfigFormat, DeviceInfo, PathsConfig, RegistryConfig, ScriptConfig};
pub use error::StorageSystemError;
