use std::sync::Arc;

use futures::future::join_all;

use crate::plugin_system::error::PluginResult;
use crate::plugin_system::registry::InstalledPlugins;
use crate::plugin_system::remote::PluginRegistryClient;

/// Ids of installed plugins for which the registry reports a newer release.
///
/// Plugins are checked concurrently. A plugin whose check fails is logged and
/// left out of the result.
pub async fn check_plugins_update(
    installed: &InstalledPlugins,
    registry: &Arc<dyn PluginRegistryClient>,
) -> PluginResult<Vec<String>> {
    let plugins = installed.list().await?;

    let checks = plugins.iter().map(|plugin| async move {
        let outcome = registry.check_update(&plugin.id, &plugin.manifest.version).await;
        (plugin.id.as_str(), outcome)
    });

    let mut updates = Vec::new();
    for (plugin_id, outcome) in join_all(checks).await {
        match outcome {
            Ok(true) => updates.push(plugin_id.to_string()),
            Ok(false) => {}
            Err(e) => log::warn!("Update check for '{}' failed: {}", plugin_id, e),
        }
    }
    log::info!("{} of {} plugin(s) have updates", updates.len(), plugins.len());
    Ok(updates)
}
