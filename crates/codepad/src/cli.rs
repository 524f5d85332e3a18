use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use codepad_core::plugin_system::runtime::{InitContext, PluginHost, PluginPage, RuntimeError};
use codepad_core::InstallUi;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Install prompts and progress rendered on the terminal.
///
/// Prompts are answered on stdin unless `assume_yes` is set. Progress and
/// alerts go to stderr so stdout only carries command output.
#[derive(Debug, Clone, Copy)]
pub struct TerminalUi {
    pub assume_yes: bool,
}

impl TerminalUi {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

#[async_trait]
impl InstallUi for TerminalUi {
    async fn confirm(&self, title: &str, message: &str) -> bool {
        let mut stderr = tokio::io::stderr();
        let prompt = format!("{}: {} [y/N] ", title, message);
        if stderr.write_all(prompt.as_bytes()).await.is_err() {
            return false;
        }
        let _ = stderr.flush().await;

        if self.assume_yes {
            let _ = stderr.write_all(b"y\n").await;
            return true;
        }

        let mut answer = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut answer).await {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(e) => {
                log::warn!("Cannot read answer: {}", e);
                false
            }
        }
    }

    fn show_loader(&self, title: &str, message: &str) {
        eprintln!("{}: {}", title, message);
    }

    fn set_loader_message(&self, message: &str) {
        eprintln!("  {}", message);
    }

    fn destroy_loader(&self) {}

    fn alert(&self, title: &str, message: &str) {
        eprintln!("{}: {}", title.to_uppercase(), message);
    }
}

/// Host shell of the command line binary; pages have no front end here.
#[derive(Debug, Default)]
pub struct CliHost;

#[async_trait]
impl PluginHost for CliHost {
    fn convert_file_src(&self, path: &Path) -> String {
        format!("file://{}", path.display())
    }

    async fn init_plugin(
        &self,
        plugin_id: &str,
        base_url: &str,
        page: Arc<PluginPage>,
        context: InitContext,
    ) -> Result<(), RuntimeError> {
        tracing::info!(
            plugin = plugin_id,
            base_url,
            cache = %context.cache_file.display(),
            first_init = context.first_init,
            "initialized '{}'",
            page.title()
        );
        Ok(())
    }

    async fn unmount_plugin(&self, plugin_id: &str) {
        tracing::debug!(plugin = plugin_id, "unmounted");
    }
}
