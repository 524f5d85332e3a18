//! # Codepad Core UI Bridge
//!
//! The plugin subsystem never draws anything itself. It talks to the host UI
//! through [`InstallUi`]: a confirmation prompt, a loading indicator with a
//! changeable message, and an alert. [`LoaderGuard`] ties the indicator's
//! lifetime to a scope so it is torn down on every exit path.
use std::sync::Arc;

use async_trait::async_trait;

/// UI collaborator used during plugin installation
#[async_trait]
pub trait InstallUi: Send + Sync {
    /// Ask the user a yes/no question
    async fn confirm(&self, title: &str, message: &str) -> bool;

    /// Show the loading indicator
    fn show_loader(&self, title: &str, message: &str);

    /// Replace the loading indicator's message
    fn set_loader_message(&self, message: &str);

    /// Remove the loading indicator
    fn destroy_loader(&self);

    /// Show a blocking notice
    fn alert(&self, title: &str, message: &str);
}

/// Keeps the loading indicator alive until dropped
pub struct LoaderGuard {
    ui: Arc<dyn InstallUi>,
}

impl LoaderGuard {
    /// Show the loader and return a guard that destroys it on drop
    pub fn show(ui: Arc<dyn InstallUi>, title: &str, message: &str) -> Self {
        ui.show_loader(title, message);
        Self { ui }
    }

    pub fn set_message(&self, message: &str) {
        self.ui.set_loader_message(message);
    }
}

impl Drop for LoaderGuard {
    fn drop(&mut self) {
        self.ui.destroy_loader();
    }
}

/// UI that answers every prompt with a fixed value and only logs the rest.
///
/// Used by non-interactive hosts.
#[derive(Debug, Clone, Copy)]
pub struct HeadlessUi {
    pub auto_confirm: bool,
}

#[async_trait]
impl InstallUi for HeadlessUi {
    async fn confirm(&self, title: &str, message: &str) -> bool {
        log::info!("{}: {} -> {}", title, message, if self.auto_confirm { "yes" } else { "no" });
        self.auto_confirm
    }

    fn show_loader(&self, title: &str, message: &str) {
        log::debug!("[loader] {}: {}", title, message);
    }

    fn set_loader_message(&self, message: &str) {
        log::debug!("[loader] {}", message);
    }

    fn destroy_loader(&self) {
        log::debug!("[loader] closed");
    }

    fn alert(&self, title: &str, message: &str) {
        log::warn!("{}: {}", title, message);
    }
}

// Test module declaration
#[cfg(test)]
mod tests;
