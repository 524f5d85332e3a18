//! Per-plugin install ledger.
//!
//! The ledger maps every file of an installed plugin to a SHA-256 fingerprint
//! of its content. [`ContentStore`] wraps one install attempt: it answers
//! "did this file change?" against the committed ledger, collects the new
//! ledger in memory and only replaces the persisted one in [`ContentStore::commit`].
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::plugin_system::error::PluginResult;
use crate::storage::error::StorageSystemError;
use crate::storage::provider::StorageProvider;
use crate::utils::checked_segment;

/// Hex SHA-256 of `bytes`
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Persisted mapping from relative file path to content fingerprint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentLedger {
    pub files: BTreeMap<String, String>,
}

impl ContentLedger {
    /// Location of the ledger of `plugin_id` under `state_dir`
    pub fn path_for(state_dir: &Path, plugin_id: &str) -> PluginResult<PathBuf> {
        Ok(state_dir.join(format!("{}.json", checked_segment(plugin_id)?)))
    }

    /// Read a persisted ledger; a missing file is an empty ledger
    pub async fn load(provider: &dyn StorageProvider, path: &Path) -> PluginResult<Self> {
        let data = match provider.read_to_bytes(path).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&data) {
            Ok(ledger) => Ok(ledger),
            Err(e) => {
                // An unreadable ledger only costs a full rewrite
                log::warn!("Ignoring unreadable install ledger {}: {}", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    /// Atomically replace the persisted ledger at `path`
    pub async fn save(&self, provider: &dyn StorageProvider, path: &Path) -> PluginResult<()> {
        let data = serde_json::to_vec_pretty(self).map_err(|e| StorageSystemError::SerializationError {
            format: "json".to_string(),
            source: Box::new(e),
        })?;
        provider.write_bytes(path, &data).await?;
        Ok(())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Content store for one install attempt of one plugin
pub struct ContentStore {
    provider: Arc<dyn StorageProvider>,
    ledger_path: PathBuf,
    committed: ContentLedger,
    pending: ContentLedger,
    /// Paths shipped by the package, whether or not their write succeeded
    claimed: HashSet<String>,
    trust_committed: bool,
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("ledger_path", &self.ledger_path)
            .field("committed", &self.committed.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl ContentStore {
    /// Start an attempt for `plugin_id`, reading its committed ledger
    pub async fn open(
        provider: Arc<dyn StorageProvider>,
        state_dir: &Path,
        plugin_id: &str,
    ) -> PluginResult<Self> {
        let ledger_path = ContentLedger::path_for(state_dir, plugin_id)?;
        let committed = ContentLedger::load(provider.as_ref(), &ledger_path).await?;
        Ok(Self {
            provider,
            ledger_path,
            committed,
            pending: ContentLedger::default(),
            claimed: HashSet::new(),
            trust_committed: true,
        })
    }

    /// Stop trusting the committed ledger for change detection.
    ///
    /// Used when the plugin directory had to be created, so nothing the ledger
    /// lists is actually on disk.
    pub fn ignore_committed(&mut self) {
        self.trust_committed = false;
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    /// Whether the committed ledger lists `path`
    pub fn exists(&self, path: &str) -> bool {
        self.trust_committed && self.committed.contains(path)
    }

    /// True if `path` is new or its content differs from the committed ledger.
    ///
    /// Unchanged paths are carried into the new ledger immediately.
    pub fn is_updated(&mut self, path: &str, bytes: &[u8]) -> bool {
        self.claimed.insert(path.to_string());
        let digest = fingerprint(bytes);
        let unchanged = self.trust_committed
            && self.committed.files.get(path).is_some_and(|known| *known == digest);
        if unchanged {
            self.pending.files.insert(path.to_string(), digest);
        }
        !unchanged
    }

    /// Keep `path` out of stale-file cleanup without recording it
    pub fn claim(&mut self, path: &str) {
        self.claimed.insert(path.to_string());
    }

    /// Record a successful write of `path`
    pub fn record_written(&mut self, path: &str, bytes: &[u8]) {
        self.claimed.insert(path.to_string());
        self.pending.files.insert(path.to_string(), fingerprint(bytes));
    }

    /// The in-memory ledger of this attempt
    pub fn pending(&self) -> &ContentLedger {
        &self.pending
    }

    /// Persist the in-memory ledger, replacing the committed one
    pub async fn commit(&mut self) -> PluginResult<()> {
        self.pending.save(self.provider.as_ref(), &self.ledger_path).await?;
        self.committed = self.pending.clone();
        self.trust_committed = true;
        Ok(())
    }

    /// Drop the in-memory ledger; the persisted one is left as it was
    pub fn discard(&mut self) {
        self.pending = ContentLedger::default();
        self.claimed.clear();
    }

    /// Relative paths found on disk that the new package no longer ships
    pub fn diff_against_disk<'a>(&self, installed_files: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        installed_files
            .into_iter()
            .filter(|path| !self.pending.contains(path) && !self.claimed.contains(*path))
            .map(str::to_string)
            .collect()
    }
}
