//! Plugin package reader.
//!
//! A package is a zip container holding `plugin.json`, the entry script and
//! any assets. [`PluginArchive`] validates the container up front and hands
//! out its entries in a single lazy pass.
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};

use zip::ZipArchive;

use crate::kernel::constants;
use crate::plugin_system::error::{PluginResult, PluginSystemError};
use crate::plugin_system::manifest::PluginManifest;
use crate::utils::normalize_entry_path;

/// Content of one archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Only causes directory creation
    Directory,
    File(Vec<u8>),
}

/// One entry yielded by [`PluginArchive::entries`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Normalized relative path; directories end with `/`
    pub path: String,
    pub kind: EntryKind,
}

impl ArchiveEntry {
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }
}

/// An opened plugin package
pub struct PluginArchive {
    zip: ZipArchive<Cursor<Vec<u8>>>,
    /// normalized path -> index in the container
    names: HashMap<String, usize>,
    directories: HashSet<String>,
}

impl std::fmt::Debug for PluginArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginArchive")
            .field("entries", &self.names.len())
            .finish()
    }
}

impl PluginArchive {
    /// Parse the container
    pub fn open(bytes: Vec<u8>) -> PluginResult<Self> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| PluginSystemError::corrupt_archive(e.to_string()))?;

        let mut names = HashMap::with_capacity(zip.len());
        let mut directories = HashSet::new();
        for index in 0..zip.len() {
            let file = zip
                .by_index_raw(index)
                .map_err(|e| PluginSystemError::corrupt_archive(e.to_string()))?;
            match normalize_entry_path(file.name()) {
                Some(path) => {
                    if file.is_dir() || path.ends_with('/') {
                        directories.insert(path.clone());
                    }
                    names.entry(path).or_insert(index);
                }
                None => log::warn!("Ignoring archive entry outside plugin root: {}", file.name()),
            }
        }

        Ok(Self { zip, names, directories })
    }

    /// Number of usable entries
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether the package holds `path` (a file or an explicit directory entry)
    pub fn has_entry(&self, path: &str) -> bool {
        !path.is_empty() && self.names.contains_key(path)
    }

    /// Whether the package holds `path` as a file
    pub fn has_file(&self, path: &str) -> bool {
        self.has_entry(path) && !path.ends_with('/') && !self.directories.contains(path)
    }

    /// Read the raw bytes of one file entry
    pub fn read_entry(&mut self, path: &str) -> PluginResult<Option<Vec<u8>>> {
        let Some(&index) = self.names.get(path) else {
            return Ok(None);
        };
        let mut file = self
            .zip
            .by_index(index)
            .map_err(|e| PluginSystemError::corrupt_archive(format!("{}: {}", path, e)))?;
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)
            .map_err(|e| PluginSystemError::corrupt_archive(format!("{}: {}", path, e)))?;
        Ok(Some(data))
    }

    /// Parse `plugin.json` as shipped, without patching
    pub fn read_manifest(&mut self) -> PluginResult<PluginManifest> {
        let bytes = self
            .read_entry(constants::MANIFEST_FILE)?
            .ok_or(PluginSystemError::MissingManifest)?;
        PluginManifest::from_slice(&bytes)
    }

    /// Read `plugin.json`, substitute default file names and validate
    pub fn read_patched_manifest(&mut self) -> PluginResult<PluginManifest> {
        let raw = self.read_manifest()?;
        raw.patched(|path| self.has_file(path))
    }

    /// Consume the archive and iterate its entries once, in container order
    pub fn entries(self) -> ArchiveEntries {
        ArchiveEntries {
            zip: self.zip,
            index: 0,
        }
    }
}

/// Single-pass iterator over the entries of a [`PluginArchive`]
pub struct ArchiveEntries {
    zip: ZipArchive<Cursor<Vec<u8>>>,
    index: usize,
}

impl Iterator for ArchiveEntries {
    type Item = PluginResult<ArchiveEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.zip.len() {
            let index = self.index;
            self.index += 1;

            let mut file = match self.zip.by_index(index) {
                Ok(file) => file,
                Err(e) => return Some(Err(PluginSystemError::corrupt_archive(e.to_string()))),
            };
            let Some(path) = normalize_entry_path(file.name()) else {
                continue;
            };
            if path.ends_with('/') || file.is_dir() {
                let path = if path.ends_with('/') { path } else { format!("{}/", path) };
                return Some(Ok(ArchiveEntry {
                    path,
                    kind: EntryKind::Directory,
                }));
            }

            let mut data = Vec::with_capacity(file.size() as usize);
            if let Err(e) = file.read_to_end(&mut data) {
                return Some(Err(PluginSystemError::corrupt_archive(format!("{}: {}", path, e))));
            }
            return Some(Ok(ArchiveEntry {
                path,
                kind: EntryKind::File(data),
            }));
        }
        None
    }
}
