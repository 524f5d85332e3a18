use std::sync::atomic::Ordering;

use super::common::{install_on_disk, Harness};
use crate::plugin_system::dependency::DependencyResolver;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::manifest::ManifestBuilder;
use crate::plugin_system::registry::InstalledPlugins;

fn resolver(harness: &Harness) -> DependencyResolver {
    let installed = InstalledPlugins::new(harness.storage.clone(), harness.config.paths.plugins_dir.clone());
    DependencyResolver::new(harness.registry.clone(), installed)
}

fn ids(manifests: &[crate::plugin_system::manifest::RemoteManifest]) -> Vec<&str> {
    manifests.iter().map(|m| m.id()).collect()
}

#[tokio::test]
async fn test_dependencies_come_before_dependents_once() {
    let harness = Harness::new();
    harness.publish_plugin(ManifestBuilder::new("b", "1.0.0").build());
    harness.publish_plugin(ManifestBuilder::new("c", "1.0.0").dependency("b").build());

    // A depends on [B, C] and C depends on [B]
    let resolved = resolver(&harness)
        .resolve("a", &["b".to_string(), "c".to_string()])
        .await
        .unwrap();
    assert_eq!(ids(&resolved), vec!["b", "c"]);
}

#[tokio::test]
async fn test_nested_dependencies_are_resolved_depth_first() {
    let harness = Harness::new();
    harness.publish_plugin(ManifestBuilder::new("d", "1.0.0").build());
    harness.publish_plugin(ManifestBuilder::new("b", "1.0.0").dependency("d").build());
    harness.publish_plugin(ManifestBuilder::new("c", "1.0.0").build());

    let resolved = resolver(&harness)
        .resolve("a", &["b".to_string(), "c".to_string()])
        .await
        .unwrap();
    assert_eq!(ids(&resolved), vec!["d", "b", "c"]);
}

#[tokio::test]
async fn test_installed_at_same_version_is_skipped_without_recursing() {
    let harness = Harness::new();
    harness.publish_plugin(ManifestBuilder::new("b", "1.0.0").dependency("d").build());
    harness.publish_plugin(ManifestBuilder::new("d", "1.0.0").build());
    install_on_disk(&harness, &ManifestBuilder::new("b", "1.0").build(), &[("main.js", "")]);

    let resolved = resolver(&harness).resolve("a", &["b".to_string()]).await.unwrap();
    assert!(resolved.is_empty());
    assert_eq!(harness.registry.manifest_fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_outdated_install_is_resolved_again() {
    let harness = Harness::new();
    harness.publish_plugin(ManifestBuilder::new("b", "2.0.0").build());
    install_on_disk(&harness, &ManifestBuilder::new("b", "1.0.0").build(), &[("main.js", "")]);

    let resolved = resolver(&harness).resolve("a", &["b".to_string()]).await.unwrap();
    assert_eq!(ids(&resolved), vec!["b"]);
}

#[tokio::test]
async fn test_cycles_terminate() {
    let harness = Harness::new();
    harness.publish_plugin(ManifestBuilder::new("x", "1.0.0").dependency("y").build());
    harness.publish_plugin(ManifestBuilder::new("y", "1.0.0").dependency("x").build());

    let resolved = resolver(&harness).resolve("a", &["x".to_string()]).await.unwrap();
    assert_eq!(ids(&resolved), vec!["y", "x"]);
}

#[tokio::test]
async fn test_unknown_dependency() {
    let harness = Harness::new();
    let err = resolver(&harness).resolve("a", &["ghost".to_string()]).await.unwrap_err();
    assert!(matches!(err, PluginSystemError::UnknownDependency { ref plugin_id } if plugin_id == "ghost"));
}

#[tokio::test]
async fn test_dependent_is_never_resolved_as_its_own_dependency() {
    let harness = Harness::new();
    harness.publish_plugin(ManifestBuilder::new("b", "1.0.0").dependency("a").build());
    harness.publish_plugin(ManifestBuilder::new("a", "1.0.0").dependency("b").build());

    let resolved = resolver(&harness).resolve("a", &["b".to_string()]).await.unwrap();
    assert_eq!(ids(&resolved), vec!["b"]);
    assert_eq!(harness.registry.manifest_fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_escaping_dependency_ids_are_unknown() {
    let harness = Harness::new();
    let err = resolver(&harness).resolve("a", &["../up".to_string()]).await.unwrap_err();
    assert!(matches!(err, PluginSystemError::UnknownDependency { ref plugin_id } if plugin_id == "../up"));
    assert_eq!(harness.registry.manifest_fetches.load(Ordering::SeqCst), 0);
}
