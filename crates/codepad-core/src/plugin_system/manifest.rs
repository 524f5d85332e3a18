use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::kernel::constants;
use crate::plugin_system::error::{PluginResult, PluginSystemError};
use crate::utils::checked_segment;

/// Represents a plugin manifest (`plugin.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique identifier for the plugin
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,

    /// Human-readable name
    #[serde(default, deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Plugin version
    #[serde(default, deserialize_with = "lenient_string")]
    pub version: String,

    /// Entry script, relative to the plugin directory
    #[serde(default, deserialize_with = "lenient_string")]
    pub main: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub icon: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub readme: String,

    /// Plugin IDs this plugin needs, in declaration order
    #[serde(default, deserialize_with = "lenient_dependencies")]
    pub dependencies: Vec<String>,

    /// Origin URL, set only for packages installed from a direct URL
    #[serde(default, deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Keys this crate does not interpret, kept for re-serialization
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A manifest as served by the plugin registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteManifest {
    #[serde(flatten)]
    pub manifest: PluginManifest,

    /// Price in the store's currency; anything above zero needs a purchase
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: f64,

    /// Store product id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
}

impl RemoteManifest {
    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    pub fn is_paid(&self) -> bool {
        self.price > 0.0
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn lenient_dependencies<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl PluginManifest {
    /// Create a new manifest with the default file names
    pub fn new(id: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            version: version.to_string(),
            main: constants::DEFAULT_MAIN.to_string(),
            icon: constants::DEFAULT_ICON.to_string(),
            readme: constants::DEFAULT_README.to_string(),
            dependencies: Vec::new(),
            source: None,
            extra: Map::new(),
        }
    }

    /// Parse a manifest from `plugin.json` bytes
    pub fn from_slice(bytes: &[u8]) -> PluginResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| PluginSystemError::invalid_plugin(format!("malformed {}: {}", constants::MANIFEST_FILE, e)))
    }

    /// Serialize for writing to the plugin directory
    pub fn to_json_bytes(&self) -> PluginResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| PluginSystemError::invalid_plugin(format!("cannot serialize manifest: {}", e)))
    }

    /// Name for prompts and log lines, falling back to the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Replace `main`, `icon` and `readme` with their defaults when they do
    /// not name a file of the package.
    pub fn patch_defaults(&mut self, has_file: impl Fn(&str) -> bool) {
        if !has_file(&self.main) {
            self.main = constants::DEFAULT_MAIN.to_string();
        }
        if !has_file(&self.icon) {
            self.icon = constants::DEFAULT_ICON.to_string();
        }
        if !has_file(&self.readme) {
            self.readme = constants::DEFAULT_README.to_string();
        }
    }

    /// The id must be usable as a directory name and `main` must name a file
    pub fn validate(&self, has_file: impl Fn(&str) -> bool) -> PluginResult<()> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(PluginSystemError::invalid_plugin("manifest has no id"));
        }
        checked_segment(&self.id)
            .map_err(|_| PluginSystemError::invalid_plugin(format!("invalid plugin id '{}'", self.id)))?;
        if !has_file(&self.main) {
            return Err(PluginSystemError::invalid_plugin(format!(
                "entry script '{}' not found in package",
                self.main
            )));
        }
        Ok(())
    }

    /// Patch then validate, consuming a raw manifest
    pub fn patched(mut self, has_file: impl Fn(&str) -> bool) -> PluginResult<Self> {
        self.patch_defaults(&has_file);
        self.validate(&has_file)?;
        Ok(self)
    }

    pub fn add_dependency(&mut self, id: &str) -> &mut Self {
        self.dependencies.push(id.to_string());
        self
    }
}

/// Builder for creating a plugin manifest
pub struct ManifestBuilder {
    manifest: PluginManifest,
}

impl ManifestBuilder {
    /// Create a new manifest builder
    pub fn new(id: &str, version: &str) -> Self {
        Self {
            manifest: PluginManifest::new(id, version),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.manifest.name = Some(name.to_string());
        self
    }

    pub fn main(mut self, main: &str) -> Self {
        self.manifest.main = main.to_string();
        self
    }

    pub fn dependency(mut self, id: &str) -> Self {
        self.manifest.add_dependency(id);
        self
    }

    pub fn dependencies(mut self, ids: &[&str]) -> Self {
        for id in ids {
            self.manifest.add_dependency(id);
        }
        self
    }

    /// Build the manifest
    pub fn build(self) -> PluginManifest {
        self.manifest
    }

    /// Build a registry manifest
    pub fn build_remote(self, price: f64, sku: Option<&str>) -> RemoteManifest {
        RemoteManifest {
            manifest: self.manifest,
            price,
            sku: sku.map(str::to_string),
        }
    }
}
