use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::fs;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReadDirStream;

use crate::storage::error::StorageSystemError;
use crate::storage::provider::{DirEntry, StorageProvider, StorageResult};

/// Local filesystem storage provider
#[derive(Clone)]
pub struct LocalStorageProvider {
    base_path: PathBuf,
}

impl LocalStorageProvider {
    /// Create a new local storage provider with the given base path.
    ///
    /// Relative paths are resolved against `base_path`; absolute paths are
    /// used as they are.
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Resolve a relative path against the base path
    fn resolve_path<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.base_path.join(path)
    }
}

/// Writes `contents` next to `target` in a temp file and renames it over the target.
fn write_atomic(target: &Path, contents: &[u8]) -> StorageResult<()> {
    let parent = target.parent().ok_or_else(|| StorageSystemError::OperationFailed {
        operation: "write_bytes".to_string(),
        path: Some(target.to_path_buf()),
        message: "Cannot write to path without parent directory".to_string(),
    })?;

    std::fs::create_dir_all(parent)
        .map_err(|e| StorageSystemError::io(e, "create_dir_all", parent.to_path_buf()))?;

    let mut temp_file = NamedTempFile::new_in(parent)
        .map_err(|e| StorageSystemError::io(e, "create_temp_file", parent.to_path_buf()))?;
    temp_file
        .write_all(contents)
        .map_err(|e| StorageSystemError::io(e, "write_to_temp_file", temp_file.path().to_path_buf()))?;
    temp_file
        .persist(target)
        .map_err(|e| StorageSystemError::io(e.error, "persist_temp_file", target.to_path_buf()))?;
    Ok(())
}

#[async_trait]
impl StorageProvider for LocalStorageProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(self.resolve_path(path)).await.unwrap_or(false)
    }

    async fn is_dir(&self, path: &Path) -> bool {
        fs::metadata(self.resolve_path(path))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        let full_path = self.resolve_path(path);
        fs::create_dir_all(&full_path)
            .await
            .map_err(|e| StorageSystemError::io(e, "create_dir_all", full_path))
    }

    async fn create_file(&self, path: &Path) -> StorageResult<()> {
        let full_path = self.resolve_path(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageSystemError::io(e, "create_dir_all", parent.to_path_buf()))?;
        }
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full_path)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(StorageSystemError::io(e, "create_file", full_path)),
        }
    }

    async fn read_to_bytes(&self, path: &Path) -> StorageResult<Vec<u8>> {
        let full_path = self.resolve_path(path);
        fs::read(&full_path)
            .await
            .map_err(|e| StorageSystemError::io(e, "read_to_bytes", full_path))
    }

    async fn read_to_string(&self, path: &Path) -> StorageResult<String> {
        let full_path = self.resolve_path(path);
        fs::read_to_string(&full_path)
            .await
            .map_err(|e| StorageSystemError::io(e, "read_to_string", full_path))
    }

    async fn write_bytes(&self, path: &Path, contents: &[u8]) -> StorageResult<()> {
        let full_path = self.resolve_path(path);
        let contents = contents.to_vec();
        tokio::task::spawn_blocking(move || write_atomic(&full_path, &contents))
            .await
            .map_err(|e| StorageSystemError::OperationFailed {
                operation: "write_bytes".to_string(),
                path: Some(path.to_path_buf()),
                message: format!("write task failed: {}", e),
            })?
    }

    async fn remove_file(&self, path: &Path) -> StorageResult<()> {
        let full_path = self.resolve_path(path);
        fs::remove_file(&full_path)
            .await
            .map_err(|e| StorageSystemError::io(e, "remove_file", full_path))
    }

    async fn remove_dir_all(&self, path: &Path) -> StorageResult<()> {
        let full_path = self.resolve_path(path);
        fs::remove_dir_all(&full_path)
            .await
            .map_err(|e| StorageSystemError::io(e, "remove_dir_all", full_path))
    }

    async fn read_dir(&self, path: &Path) -> StorageResult<Vec<DirEntry>> {
        let full_path = self.resolve_path(path);
        let read_dir = fs::read_dir(&full_path)
            .await
            .map_err(|e| StorageSystemError::io(e, "read_dir", full_path.clone()))?;

        let mut stream = ReadDirStream::new(read_dir);
        let mut result = Vec::new();
        while let Some(entry) = stream.next().await {
            let entry = entry.map_err(|e| StorageSystemError::io(e, "read_dir_entry", full_path.clone()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            result.push(DirEntry {
                path: path.join(&name),
                name,
                is_dir,
            });
        }
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }
}

impl fmt::Debug for LocalStorageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStorageProvider")
            .field("base_path", &self.base_path)
            .finish()
    }
}
