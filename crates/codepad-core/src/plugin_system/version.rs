use std::fmt;

use semver::Version;

/// A plugin version as written in a manifest.
///
/// Registry versions are usually semver (`1.2.3`) but older plugins ship
/// shorter forms such as `1.2`. Comparison parses both sides leniently and
/// falls back to plain string equality when either side is not a version.
#[derive(Debug, Clone)]
pub struct PluginVersion {
    raw: String,
    parsed: Option<Version>,
}

impl PluginVersion {
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.trim().to_string(),
            parsed: parse_lenient(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The semver reading of this version, if it has one
    pub fn semver(&self) -> Option<&Version> {
        self.parsed.as_ref()
    }
}

impl PartialEq for PluginVersion {
    fn eq(&self, other: &Self) -> bool {
        match (&self.parsed, &other.parsed) {
            (Some(a), Some(b)) => a == b,
            _ => self.raw == other.raw,
        }
    }
}

impl Eq for PluginVersion {}

impl fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Parse `1`, `1.2`, `1.2.3` and `v1.2.3` style strings
fn parse_lenient(raw: &str) -> Option<Version> {
    let trimmed = raw.trim().trim_start_matches('v');
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = Version::parse(trimmed) {
        return Some(v);
    }
    let (core, rest) = match trimmed.find(['-', '+']) {
        Some(idx) => trimmed.split_at(idx),
        None => (trimmed, ""),
    };
    let parts = core.split('.').count();
    let padded = match parts {
        1 => format!("{}.0.0{}", core, rest),
        2 => format!("{}.0{}", core, rest),
        _ => return None,
    };
    Version::parse(&padded).ok()
}

/// Whether an installed version (if any) satisfies the required one exactly
pub fn versions_match(installed: Option<&str>, required: &str) -> bool {
    match installed {
        Some(installed) => PluginVersion::parse(installed) == PluginVersion::parse(required),
        None => false,
    }
}
