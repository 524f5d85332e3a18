mod cli;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use codepad_core::plugin_system::runtime::PageStack;
use codepad_core::storage::LocalStorageProvider;
use codepad_core::ui_bridge::HeadlessUi;
use codepad_core::{AppConfig, DefaultPluginManager, InstallOutcome, InstallUi, PluginManager};
use tracing_subscriber::EnvFilter;

use crate::cli::{CliHost, TerminalUi};

/// Codepad: install and run editor plugins
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Configuration file (json, or yaml/toml when enabled)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Root of the plugin, state and cache directories when no config is found
    #[arg(long, value_name = "DIR", default_value = ".codepad")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage plugins
    Plugin {
        #[command(subcommand)]
        command: PluginCommand,
    },
}

#[derive(Subcommand, Debug)]
enum PluginCommand {
    /// Install a plugin by registry id or package URL
    Install {
        /// Registry id, or an http(s)/file URL of a plugin package
        id: String,
        /// Purchase token for a paid plugin
        #[arg(long)]
        token: Option<String>,
        /// Display name used in prompts
        #[arg(long)]
        name: Option<String>,
        /// Answer yes to dependency prompts
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// List installed plugins
    List,
    /// Load an installed plugin
    Load {
        id: String,
    },
    /// Report plugins with a newer registry release
    CheckUpdates,
    /// Uninstall a plugin
    Remove {
        id: String,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {}", e);
    }
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to forward library logs: {}", e);
    }
}

async fn load_config(config: Option<&Path>, data_dir: &Path) -> codepad_core::Result<AppConfig> {
    let provider = LocalStorageProvider::new(PathBuf::new());
    let path = config.map(Path::to_path_buf).unwrap_or_else(|| data_dir.join("config.json"));
    Ok(AppConfig::load_or_default(&provider, &path, data_dir).await?)
}

async fn run(args: CliArgs) -> codepad_core::Result<()> {
    let config = load_config(args.config.as_deref(), &args.data_dir).await?;
    log::debug!("Using plugins directory {}", config.paths.plugins_dir.display());

    let Commands::Plugin { command } = args.command;
    let assume_yes = matches!(command, PluginCommand::Install { yes: true, .. });
    // Without a terminal to ask on, prompts are declined unless --yes was given
    let ui: Arc<dyn InstallUi> = if assume_yes || std::io::stdin().is_terminal() {
        Arc::new(TerminalUi::new(assume_yes))
    } else {
        Arc::new(HeadlessUi { auto_confirm: false })
    };
    let manager = DefaultPluginManager::with_defaults(
        config,
        ui,
        Arc::new(CliHost),
        Arc::new(PageStack::new()),
    )?;

    match command {
        PluginCommand::Install { id, token, name, .. } => {
            match manager.install_plugin(&id, name.as_deref(), token.as_deref()).await? {
                InstallOutcome::Installed { plugin_id } => println!("Installed plugin '{}'.", plugin_id),
                InstallOutcome::Declined => println!("Installation of '{}' cancelled.", id),
            }
        }
        PluginCommand::List => {
            let plugins = manager.installed_plugins().await?;
            if plugins.is_empty() {
                println!("No plugins installed.");
            }
            for plugin in plugins {
                match &plugin.manifest.name {
                    Some(name) => println!("  - {} {} ({})", plugin.id, plugin.manifest.version, name),
                    None => println!("  - {} {}", plugin.id, plugin.manifest.version),
                }
            }
        }
        PluginCommand::Load { id } => {
            manager.load_plugin(&id, false).await?;
            println!("Loaded plugin '{}'.", id);
        }
        PluginCommand::CheckUpdates => {
            let updates = manager.check_plugins_update().await?;
            if updates.is_empty() {
                println!("All plugins are up to date.");
            }
            for id in updates {
                println!("  - {} has an update", id);
            }
        }
        PluginCommand::Remove { id } => {
            manager.uninstall_plugin(&id).await?;
            println!("Removed plugin '{}'.", id);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let args = CliArgs::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
