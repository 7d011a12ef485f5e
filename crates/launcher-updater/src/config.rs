//! Configuration types for the update engine.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, UpdateError};
use crate::obfuscation::ObfuscatedBlob;
use crate::version::Version;

/// Default helper executable name on the server and on disk.
#[cfg(target_os = "windows")]
pub const DEFAULT_HELPER_FILE_NAME: &str = "LauncherUpdater.exe";

/// Default helper executable name on the server and on disk.
#[cfg(not(target_os = "windows"))]
pub const DEFAULT_HELPER_FILE_NAME: &str = "launcher-updater-helper";

/// Version assumed when no installed state exists yet.
pub const BASELINE_VERSION: Version = Version::new(1, 0, 0, 0);

/// Settings for the update engine.
///
/// Relative paths are resolved against [`UpdaterSettings::install_root`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterSettings {
    /// Root of the game installation; patch archives extract here.
    pub install_root: PathBuf,

    /// JSON file holding the installed version.
    pub state_file: PathBuf,

    /// Directory patch archives are downloaded into.
    ///
    /// The helper's cleanup script always removes `updates` and
    /// `launcher_updates` next to the launcher; its three arguments carry no
    /// staging paths, so a custom value here is cleaned only at launcher start.
    pub staging_dir: PathBuf,

    /// Obfuscated blob holding the server base URL.
    pub server_blob: PathBuf,

    /// Base URL override. When set, the blob is not read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Name of the helper executable, both on the server and on disk.
    pub helper_file_name: String,

    /// Version written on first run.
    pub baseline_version: Version,

    /// Remove leftover patch downloads when the launcher starts.
    pub clean_staging_on_start: bool,

    /// User agent sent with every request.
    pub user_agent: String,

    /// The game started once the installation is current.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<GameSettings>,
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self {
            install_root: PathBuf::from("."),
            state_file: PathBuf::from("config.json"),
            staging_dir: PathBuf::from("updates"),
            server_blob: PathBuf::from("lccnct.dta"),
            base_url: None,
            helper_file_name: DEFAULT_HELPER_FILE_NAME.to_string(),
            baseline_version: BASELINE_VERSION,
            clean_staging_on_start: true,
            user_agent: concat!("launcher/", env!("CARGO_PKG_VERSION")).to_string(),
            game: None,
        }
    }
}

/// How to start the game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    /// Game executable, relative to the working directory.
    pub executable: PathBuf,

    /// Working directory, relative to the install root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Arguments passed to the game.
    #[serde(default)]
    pub args: Vec<String>,
}

impl UpdaterSettings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| UpdateError::Config(format!("invalid settings: {e}")))
    }

    /// Read settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            UpdateError::Config(format!("cannot read settings {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Resolve a configured path against the install root.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.install_root.join(path)
        }
    }

    /// Absolute location of the installed-state file.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.resolve(&self.state_file)
    }

    /// Absolute location of the patch staging directory.
    #[must_use]
    pub fn staging_path(&self) -> PathBuf {
        self.resolve(&self.staging_dir)
    }

    /// Where the helper executable is downloaded to.
    #[must_use]
    pub fn helper_path(&self) -> PathBuf {
        self.install_root.join(&self.helper_file_name)
    }

    /// Determine the server base URL, from the override or the obfuscated blob.
    pub fn resolve_base_url(&self) -> Result<String> {
        let url = match &self.base_url {
            Some(url) => url.clone(),
            None => {
                let path = self.resolve(&self.server_blob);
                tracing::debug!("Decoding server blob {}", path.display());
                ObfuscatedBlob::read(&path)?.decode()
            }
        };

        let url = url.trim().to_string();
        if url.is_empty() {
            return Err(UpdateError::Config("server base URL is empty".to_string()));
        }
        Ok(url)
    }
}

/// Join a base URL and a relative endpoint path with exactly one slash.
#[must_use]
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
