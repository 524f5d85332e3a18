use std::path::{Path, PathBuf};
use tempfile::tempdir;

use crate::storage::local::LocalStorageProvider;
use crate::storage::provider::{StorageProvider, StorageResult};
use crate::storage::error::StorageSystemError;
use crate::utils::{checked_segment, ensure_path, list_files_recursive, normalize_entry_path, path_segments};

#[test]
fn test_path_segments_skip_empty_parts() {
    let segments: Vec<&str> = path_segments("a//b/./c/").collect();
    assert_eq!(segments, vec!["a", "b", "c"]);
    assert_eq!(path_segments("").count(), 0);
}

#[test]
fn test_normalize_entry_path() {
    assert_eq!(normalize_entry_path("lib\\util.js").as_deref(), Some("lib/util.js"));
    assert_eq!(normalize_entry_path("assets/").as_deref(), Some("assets/"));
    assert_eq!(normalize_entry_path("../evil.js"), None);
    assert_eq!(normalize_entry_path("a/../../evil.js"), None);
    assert_eq!(normalize_entry_path("/etc/passwd"), None);
    assert_eq!(normalize_entry_path("\\abs.js"), None);
}

#[test]
fn test_checked_segment_accepts_plain_names() {
    for name in ["acode.hello", "my-plugin", "v1.2", "...", "a b"] {
        assert_eq!(checked_segment(name).unwrap(), name);
    }
}

#[test]
fn test_checked_segment_rejects_escaping_names() {
    for name in ["", "  ", ".", "..", "a/b", "../escaped", "a\\b", "/etc", "/", "\\", "nul\0byte"] {
        let err = checked_segment(name).unwrap_err();
        assert!(
            matches!(err, StorageSystemError::InvalidPath { .. }),
            "{:?} gave {:?}",
            name,
            err
        );
    }
}

#[tokio::test]
async fn test_ensure_path_creates_parents_only_for_files() -> StorageResult<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());
    let root = Path::new("plugin");

    let full = ensure_path(&provider, root, "lib/deep/file.js").await?;
    assert_eq!(full, PathBuf::from("plugin/lib/deep/file.js"));
    assert!(provider.is_dir(Path::new("plugin/lib/deep")).await);
    assert!(!provider.exists(Path::new("plugin/lib/deep/file.js")).await);

    let dir = ensure_path(&provider, root, "assets/img/").await?;
    assert_eq!(dir, PathBuf::from("plugin/assets/img"));
    assert!(provider.is_dir(&dir).await);
    Ok(())
}

#[tokio::test]
async fn test_list_files_recursive() -> StorageResult<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());

    provider.write_bytes(Path::new("root/a.js"), b"a").await?;
    provider.write_bytes(Path::new("root/lib/b.js"), b"b").await?;
    provider.create_dir_all(Path::new("root/empty")).await?;

    let mut files = list_files_recursive(&provider, Path::new("root")).await?;
    files.sort();
    assert_eq!(files, vec![PathBuf::from("root/a.js"), PathBuf::from("root/lib/b.js")]);
    Ok(())
}
