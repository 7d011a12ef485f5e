//! Command-line configuration for the update helper.

use std::path::{Path, PathBuf};

/// Server directory holding launcher executables.
const LAUNCHER_UPDATES_PATH: &str = "launcher_updates";

/// The three positional arguments passed by the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperConfig {
    /// Update server base URL.
    pub base_url: String,
    /// Executable to replace.
    pub launcher_path: PathBuf,
    /// File name of the new executable on the server.
    pub file_name: String,
}

impl HelperConfig {
    /// Builds the configuration from the arguments after the program name.
    ///
    /// Returns `None` unless there are exactly three.
    pub fn from_args<I>(args: I) -> Option<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let base_url = args.next()?;
        let launcher_path = PathBuf::from(args.next()?);
        let file_name = args.next()?;
        if args.next().is_some() {
            return None;
        }
        Some(Self {
            base_url,
            launcher_path,
            file_name,
        })
    }

    /// Checks the arguments before anything on disk is touched.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.trim().is_empty() {
            return Err("Base URL is empty".to_string());
        }
        if self.file_name.trim().is_empty()
            || self.file_name.contains(['/', '\\'])
            || self.file_name == ".."
        {
            return Err(format!("Invalid launcher file name: {:?}", self.file_name));
        }
        if self.launcher_path.file_name().is_none() {
            return Err(format!(
                "Launcher path has no file name: {:?}",
                self.launcher_path
            ));
        }
        Ok(())
    }

    /// URL of the new launcher executable.
    pub fn download_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            LAUNCHER_UPDATES_PATH,
            self.file_name
        )
    }

    /// Directory containing the launcher.
    pub fn install_dir(&self) -> &Path {
        match self.launcher_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}
