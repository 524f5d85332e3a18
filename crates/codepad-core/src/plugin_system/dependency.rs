//! Dependency resolution for registry installs.
//!
//! [`DependencyResolver::resolve`] walks the declared dependencies of a
//! plugin depth-first and returns the registry manifests that still need to
//! be installed, dependencies before their dependents.
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::plugin_system::error::{PluginResult, PluginSystemError};
use crate::plugin_system::manifest::RemoteManifest;
use crate::plugin_system::registry::InstalledPlugins;
use crate::plugin_system::remote::PluginRegistryClient;
use crate::plugin_system::version::versions_match;
use crate::utils::checked_segment;

type ResolveFuture<'a> = Pin<Box<dyn Future<Output = PluginResult<()>> + Send + 'a>>;

/// Resolves plugin ids to the registry manifests that need installing
pub struct DependencyResolver {
    registry: Arc<dyn PluginRegistryClient>,
    installed: InstalledPlugins,
}

impl std::fmt::Debug for DependencyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyResolver")
            .field("plugins_dir", &self.installed.plugins_dir())
            .finish()
    }
}

impl DependencyResolver {
    pub fn new(registry: Arc<dyn PluginRegistryClient>, installed: InstalledPlugins) -> Self {
        Self { registry, installed }
    }

    /// Manifests to install for the dependencies `ids` of `dependent`, in
    /// install order.
    ///
    /// A plugin already installed at the registry's version is skipped along
    /// with its own dependencies. Each id appears at most once; the first
    /// occurrence decides its position. `dependent` itself is never returned.
    pub async fn resolve(&self, dependent: &str, ids: &[String]) -> PluginResult<Vec<RemoteManifest>> {
        let mut visited = HashSet::from([dependent.to_string()]);
        let mut ordered = Vec::new();
        for id in ids {
            self.visit(id, &mut visited, &mut ordered).await?;
        }
        Ok(ordered)
    }

    fn visit<'a>(
        &'a self,
        id: &'a str,
        visited: &'a mut HashSet<String>,
        ordered: &'a mut Vec<RemoteManifest>,
    ) -> ResolveFuture<'a> {
        Box::pin(async move {
            // Marking before recursing is what stops dependency cycles
            if !visited.insert(id.to_string()) {
                return Ok(());
            }

            let unknown = |reason: String| {
                log::warn!("Rejecting dependency '{}': {}", id, reason);
                PluginSystemError::UnknownDependency {
                    plugin_id: id.to_string(),
                }
            };
            checked_segment(id).map_err(|e| unknown(e.to_string()))?;
            let remote = self
                .registry
                .fetch_manifest(id)
                .await
                .map_err(|e| unknown(format!("cannot fetch manifest: {}", e)))?;
            checked_segment(remote.id()).map_err(|e| unknown(format!("registry manifest id: {}", e)))?;

            let installed_version = self.installed.installed_version(id).await;
            if versions_match(installed_version.as_deref(), &remote.manifest.version) {
                log::debug!("Dependency '{}' already installed at {}", id, remote.manifest.version);
                return Ok(());
            }

            for dependency in &remote.manifest.dependencies {
                self.visit(dependency, visited, ordered).await?;
            }
            if !ordered.iter().any(|m| m.id() == remote.id()) {
                ordered.push(remote);
            }
            Ok(())
        })
    }
}
