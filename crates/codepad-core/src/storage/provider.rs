use std::fmt::Debug;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::storage::error::StorageSystemError;

/// Result type used by storage providers
pub type StorageResult<T> = std::result::Result<T, StorageSystemError>;

/// A single entry returned by [`StorageProvider::read_dir`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Path of the entry, formed by joining the listed directory and `name`
    pub path: PathBuf,
    /// File name of the entry
    pub name: String,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

/// Filesystem collaborator used by the plugin subsystem.
///
/// Every operation is async so the installer can overlap sibling file writes.
/// Deleting a directory is recursive.
#[async_trait]
pub trait StorageProvider: Send + Sync + Debug {
    /// Get the name of this provider
    fn name(&self) -> &str;

    /// Check if a path exists
    async fn exists(&self, path: &Path) -> bool;

    /// Check if a path is a directory
    async fn is_dir(&self, path: &Path) -> bool;

    /// Create a directory and all its parent directories
    async fn create_dir_all(&self, path: &Path) -> StorageResult<()>;

    /// Create an empty file if nothing exists at `path` yet
    async fn create_file(&self, path: &Path) -> StorageResult<()>;

    /// Read a file to a vector of bytes
    async fn read_to_bytes(&self, path: &Path) -> StorageResult<Vec<u8>>;

    /// Read a file to a string
    async fn read_to_string(&self, path: &Path) -> StorageResult<String>;

    /// Write bytes to a file, replacing it atomically
    async fn write_bytes(&self, path: &Path, contents: &[u8]) -> StorageResult<()>;

    /// Remove a file
    async fn remove_file(&self, path: &Path) -> StorageResult<()>;

    /// Remove a directory and all its contents
    async fn remove_dir_all(&self, path: &Path) -> StorageResult<()>;

    /// List all entries in a directory
    async fn read_dir(&self, path: &Path) -> StorageResult<Vec<DirEntry>>;
}
