//! Installed-state persistence.
//!
//! The state file is the only record of update progress:
//! `{ "InstalledVersion": "1.0.0.5" }`. Writes go to a temporary file in the
//! same directory which is synced and then renamed over the old file, and the
//! directory is synced after the rename. A crash leaves either the old or the
//! new value, never a torn one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, UpdateError};
use crate::version::Version;

/// The persisted installed version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledState {
    /// The version currently installed.
    #[serde(rename = "InstalledVersion")]
    pub installed_version: Version,
}

/// Result of loading the state file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loaded {
    /// A valid state file was read.
    Existing(InstalledState),
    /// No usable state file; the baseline applies.
    FirstRun(InstalledState),
}

impl Loaded {
    /// The state, whichever way it was obtained.
    #[must_use]
    pub fn state(self) -> InstalledState {
        match self {
            Self::Existing(state) | Self::FirstRun(state) => state,
        }
    }
}

/// Reads and writes the installed-state file.
#[derive(Debug, Clone)]
pub struct InstalledStateStore {
    path: PathBuf,
    baseline: Version,
}

impl InstalledStateStore {
    /// Creates a store for the given file with a first-run baseline.
    pub fn new(path: impl Into<PathBuf>, baseline: Version) -> Self {
        Self {
            path: path.into(),
            baseline,
        }
    }

    /// Path of the state file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the installed state. Never fails: a missing, empty or unreadable
    /// file yields the baseline.
    #[must_use]
    pub fn load(&self) -> InstalledState {
        self.load_detailed().state()
    }

    /// Load the installed state, reporting whether the baseline was used.
    #[must_use]
    pub fn load_detailed(&self) -> Loaded {
        let baseline = InstalledState {
            installed_version: self.baseline,
        };

        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Cannot read {}: {e}", self.path.display());
                }
                return Loaded::FirstRun(baseline);
            }
        };

        if text.trim().is_empty() {
            tracing::warn!("{} is empty", self.path.display());
            return Loaded::FirstRun(baseline);
        }

        match serde_json::from_str(&text) {
            Ok(state) => Loaded::Existing(state),
            Err(e) => {
                tracing::warn!("Ignoring unreadable {}: {e}", self.path.display());
                Loaded::FirstRun(baseline)
            }
        }
    }

    /// Durably replace the stored state.
    pub fn save(&self, state: InstalledState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let store_err = |operation: &'static str, path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| UpdateError::Store {
                operation,
                path,
                source,
            }
        };

        fs::create_dir_all(&dir).map_err(store_err("create directory for", &self.path))?;

        let json = serde_json::to_string(&state).map_err(|e| UpdateError::Store {
            operation: "serialize",
            path: self.path.clone(),
            source: std::io::Error::other(e),
        })?;

        let mut temp = tempfile::NamedTempFile::new_in(&dir)
            .map_err(store_err("create temporary file for", &self.path))?;
        temp.write_all(json.as_bytes())
            .map_err(store_err("write", &self.path))?;
        temp.as_file()
            .sync_all()
            .map_err(store_err("sync", &self.path))?;
        temp.persist(&self.path)
            .map_err(|e| UpdateError::Store {
                operation: "replace",
                path: self.path.clone(),
                source: e.error,
            })?;
        sync_dir(&dir).map_err(store_err("sync directory of", &self.path))?;

        tracing::info!(
            "Installed version is now {} ({})",
            state.installed_version,
            self.path.display()
        );
        Ok(())
    }
}

/// Flush a directory entry so a completed rename survives power loss.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const BASELINE: Version = Version::new(1, 0, 0, 0);

    #[test]
    fn test_missing_file_is_first_run() {
        let dir = tempdir().unwrap();
        let store = InstalledStateStore::new(dir.path().join("config.json"), BASELINE);
        assert_eq!(
            store.load_detailed(),
            Loaded::FirstRun(InstalledState {
                installed_version: BASELINE
            })
        );
    }

    #[test]
    fn test_empty_and_garbage_files_fall_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = InstalledStateStore::new(&path, BASELINE);

        fs::write(&path, "   ").unwrap();
        assert!(matches!(store.load_detailed(), Loaded::FirstRun(_)));

        fs::write(&path, r#"{"InstalledVersion":"1.0"}"#).unwrap();
        assert_eq!(store.load().installed_version, BASELINE);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = InstalledStateStore::new(&path, BASELINE);

        store
            .save(InstalledState {
                installed_version: Version::new(1, 0, 0, 5),
            })
            .unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            r#"{"InstalledVersion":"1.0.0.5"}"#
        );
        // A fresh store stands in for a restarted process.
        let reopened = InstalledStateStore::new(&path, BASELINE);
        assert_eq!(
            reopened.load_detailed(),
            Loaded::Existing(InstalledState {
                installed_version: Version::new(1, 0, 0, 5)
            })
        );
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let store = InstalledStateStore::new(dir.path().join("config.json"), BASELINE);
        for build in 1..=3 {
            store
                .save(InstalledState {
                    installed_version: Version::new(1, 0, 0, build),
                })
                .unwrap();
        }
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(store.load().installed_version, Version::new(1, 0, 0, 3));
    }

    #[test]
    fn test_sync_dir() {
        let dir = tempdir().unwrap();
        sync_dir(dir.path()).unwrap();
        #[cfg(unix)]
        assert!(sync_dir(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_reads_hand_written_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{\"InstalledVersion\": \"1.0.0.7\"}\n").unwrap();
        let store = InstalledStateStore::new(&path, BASELINE);
        assert_eq!(store.load().installed_version, Version::new(1, 0, 0, 7));
    }

    #[cfg(unix)]
    #[test]
    fn test_save_into_read_only_dir_is_store_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        // Root ignores directory permissions.
        if fs::write(locked.join("probe"), b"x").is_ok() {
            return;
        }

        let store = InstalledStateStore::new(locked.join("config.json"), BASELINE);
        let err = store
            .save(InstalledState {
                installed_version: Version::new(1, 0, 0, 1),
            })
            .unwrap_err();
        assert!(matches!(err, UpdateError::Store { .. }));
    }
}
