use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;

use crate::storage::error::StorageSystemError;
use crate::storage::provider::{StorageProvider, StorageResult};

/// Check that `name` is one plain path segment that stays inside whatever
/// directory it is joined onto.
///
/// Rejects empty names, `.`, `..`, names with a separator and absolute or
/// prefixed paths.
pub fn checked_segment(name: &str) -> StorageResult<&str> {
    let invalid = |reason: &str| StorageSystemError::InvalidPath {
        path: PathBuf::from(name),
        reason: reason.to_string(),
    };
    if name.trim().is_empty() {
        return Err(invalid("empty name"));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(invalid("name contains a path separator"));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(invalid("name does not denote a single directory entry")),
    }
}

/// Normalize an archive-style path: backslashes become `/`.
///
/// Returns `None` for paths that would escape their root (absolute paths,
/// `..` segments).
pub fn normalize_entry_path(raw: &str) -> Option<String> {
    let normalized = raw.replace('\\', "/");
    if normalized.starts_with('/') {
        return None;
    }
    let escapes = Path::new(&normalized)
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return None;
    }
    Some(normalized)
}

/// Iterate the non-empty `/`-separated segments of a relative path
pub fn path_segments(relative: &str) -> impl Iterator<Item = &str> {
    relative.split('/').filter(|s| !s.is_empty() && *s != ".")
}

/// Make sure every directory leading to `relative` exists under `root`.
///
/// A trailing `/` marks `relative` itself as a directory; otherwise only its
/// parent directories are created. Returns the full path of `relative`.
pub async fn ensure_path(
    provider: &dyn StorageProvider,
    root: &Path,
    relative: &str,
) -> StorageResult<PathBuf> {
    let is_dir = relative.ends_with('/');
    let segments: Vec<&str> = path_segments(relative).collect();
    let dir_segments = if is_dir {
        &segments[..]
    } else {
        &segments[..segments.len().saturating_sub(1)]
    };

    let mut dir = root.to_path_buf();
    for segment in dir_segments {
        dir.push(segment);
    }
    if !provider.is_dir(&dir).await {
        provider.create_dir_all(&dir).await?;
    }

    Ok(segments.iter().fold(root.to_path_buf(), |acc, s| acc.join(s)))
}

/// Recursively list every file (not directory) below `dir`
pub fn list_files_recursive<'a>(
    provider: &'a dyn StorageProvider,
    dir: &'a Path,
) -> Pin<Box<dyn Future<Output = StorageResult<Vec<PathBuf>>> + Send + 'a>> {
    Box::pin(async move {
        let mut files = Vec::new();
        for entry in provider.read_dir(dir).await? {
            if entry.is_dir {
                files.extend(list_files_recursive(provider, &entry.path).await?);
            } else {
                files.push(entry.path);
            }
        }
        Ok(files)
    })
}
