//! Remote manifest and launcher descriptor types.
//!
//! Both documents are small JSON objects published by the update server:
//!
//! - `update.json`: `{ "latest_version": "1.0.0.2", "updates": ["update_1.0.0.1.zip", ...] }`
//! - `launcher_update.json`: `{ "version": "1.0.1", "file_name": "Launcher.exe" }`

use std::fmt;

use serde::Deserialize;

use crate::error::{Result, UpdateError};
use crate::version::Version;

/// Prefix of every patch archive name.
pub const PATCH_PREFIX: &str = "update_";

/// Extension of every patch archive name.
pub const PATCH_SUFFIX: &str = ".zip";

/// A patch archive name together with the version it installs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatchId {
    file_name: String,
    version: Version,
}

impl PatchId {
    /// Decode an identifier of the form `update_<major>.<minor>.<patch>.<build>.zip`.
    pub fn parse(file_name: &str) -> Result<Self> {
        let version_str = file_name
            .strip_prefix(PATCH_PREFIX)
            .and_then(|rest| rest.strip_suffix(PATCH_SUFFIX))
            .ok_or_else(|| {
                UpdateError::Manifest(format!("unrecognised update identifier {file_name:?}"))
            })?;
        let version = Version::parse(version_str).map_err(|e| {
            UpdateError::Manifest(format!("update identifier {file_name:?}: {e}"))
        })?;
        Ok(Self {
            file_name: file_name.to_string(),
            version,
        })
    }

    /// Build the canonical identifier for a version.
    #[must_use]
    pub fn for_version(version: Version) -> Self {
        Self {
            file_name: format!("{PATCH_PREFIX}{version}{PATCH_SUFFIX}"),
            version,
        }
    }

    /// The archive file name on the server.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The version installed by this patch.
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }
}

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}

#[derive(Debug, Deserialize)]
struct ManifestDocument {
    #[serde(default)]
    latest_version: Option<String>,
    #[serde(default)]
    updates: Option<Vec<String>>,
}

/// The game update manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteManifest {
    /// The latest published game version.
    pub latest_version: Version,
    /// Every published patch, in server order.
    pub updates: Vec<PatchId>,
}

impl RemoteManifest {
    /// Parse and validate a manifest document.
    ///
    /// Every identifier must decode; a single malformed entry rejects the
    /// whole manifest.
    pub fn from_json(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(UpdateError::Manifest("server returned an empty manifest".to_string()));
        }
        let doc: ManifestDocument = serde_json::from_str(text)?;

        let latest = doc
            .latest_version
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| UpdateError::Manifest("manifest has no latest_version".to_string()))?;
        let latest_version = Version::parse(&latest)
            .map_err(|e| UpdateError::Manifest(format!("latest_version: {e}")))?;

        let updates = doc
            .updates
            .unwrap_or_default()
            .iter()
            .map(String::as_str)
            .map(PatchId::parse)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            latest_version,
            updates,
        })
    }
}

#[derive(Debug, Deserialize)]
struct DescriptorDocument {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
}

/// Remote version and download name of the launcher executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherDescriptor {
    /// Published launcher version.
    pub version: Version,
    /// File name under `launcher_updates/` on the server.
    pub file_name: String,
}

impl LauncherDescriptor {
    /// Parse and validate a launcher descriptor document.
    pub fn from_json(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(UpdateError::Manifest(
                "server returned an empty launcher descriptor".to_string(),
            ));
        }
        let doc: DescriptorDocument = serde_json::from_str(text)?;

        let version = doc
            .version
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| UpdateError::Manifest("launcher descriptor has no version".to_string()))?;
        let version = Version::parse_lenient(&version)
            .map_err(|e| UpdateError::Manifest(format!("launcher version: {e}")))?;

        let file_name = doc
            .file_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| {
                UpdateError::Manifest("launcher descriptor has no file_name".to_string())
            })?;
        if file_name.contains(['/', '\\']) || file_name == ".." {
            return Err(UpdateError::Manifest(format!(
                "launcher file_name {file_name:?} is not a plain file name"
            )));
        }

        Ok(Self { version, file_name })
    }
}
