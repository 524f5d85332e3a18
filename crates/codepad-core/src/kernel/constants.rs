/// Application name
pub const APP_NAME: &str = "Codepad";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name reported to the plugin registry
pub const APP_PACKAGE_NAME: &str = "app.codepad.editor";

/// Default plugin registry API base
pub const DEFAULT_API_BASE: &str = "https://acode.app/api";

/// Manifest file name inside every plugin package and plugin directory
pub const MANIFEST_FILE: &str = "plugin.json";

/// Fallback entry script
pub const DEFAULT_MAIN: &str = "main.js";

/// Fallback icon
pub const DEFAULT_ICON: &str = "icon.png";

/// Fallback readme
pub const DEFAULT_README: &str = "readme.md";

/// Default plugins directory (relative to the data directory)
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";

/// Default install-ledger directory (relative to the data directory)
pub const DEFAULT_STATE_DIR: &str = "install-state";

/// Default plugin cache directory (relative to the data directory)
pub const DEFAULT_CACHE_DIR: &str = "cache";

/// Default HTTP timeout for registry requests, in seconds
pub const DEFAULT_REGISTRY_TIMEOUT_SECS: u64 = 60;

/// URL schemes that mark an install id as a direct package source
pub const DIRECT_SOURCE_SCHEMES: &[&str] = &["http", "https", "file", "content"];
