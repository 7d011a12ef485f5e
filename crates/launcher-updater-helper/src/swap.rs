//! Download of the new launcher and replacement of the old one.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::HelperConfig;
use crate::log::log;

/// Stem of the temporary download, placed next to the launcher.
const TEMP_STEM: &str = "temp_launcher";

/// Where the new executable is downloaded before the swap.
pub fn temp_path(launcher_path: &Path) -> PathBuf {
    let name = match launcher_path.extension() {
        Some(ext) => format!("{}.{}", TEMP_STEM, ext.to_string_lossy()),
        None => TEMP_STEM.to_string(),
    };
    launcher_path.with_file_name(name)
}

/// Downloads the new launcher next to the old one.
pub fn download_launcher(config: &HelperConfig) -> Result<PathBuf, String> {
    let url = config.download_url();
    let destination = temp_path(&config.launcher_path);
    log(&format!("Downloading {} to {:?}", url, destination));

    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("launcher-updater-helper/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(300))
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

    let mut response = client
        .get(&url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|e| format!("Failed to download {}: {}", url, e))?;

    let mut file = File::create(&destination)
        .map_err(|e| format!("Failed to create {:?}: {}", destination, e))?;
    let bytes = response
        .copy_to(&mut file)
        .map_err(|e| format!("Failed to write {:?}: {}", destination, e))?;
    file.sync_all()
        .map_err(|e| format!("Failed to sync {:?}: {}", destination, e))?;

    log(&format!("Downloaded {} bytes", bytes));
    Ok(destination)
}

/// Deletes the old executable and moves the new one into its place.
///
/// The old file is only deleted once the new one is on disk.
pub fn replace_executable(new_exe: &Path, current_exe: &Path) -> Result<(), String> {
    if !new_exe.is_file() {
        return Err(format!("New launcher not found: {:?}", new_exe));
    }

    log(&format!("Removing old launcher {:?}", current_exe));
    match fs::remove_file(current_exe) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log("Old launcher already gone");
        }
        Err(e) => return Err(format!("Failed to remove old launcher: {}", e)),
    }

    log(&format!("Moving {:?} -> {:?}", new_exe, current_exe));
    if let Err(e) = fs::rename(new_exe, current_exe) {
        log(&format!("Rename failed ({}), copying instead", e));
        fs::copy(new_exe, current_exe)
            .map_err(|e| format!("Failed to move new launcher into place: {}", e))?;
        let _ = fs::remove_file(new_exe);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(current_exe, fs::Permissions::from_mode(0o755))
            .map_err(|e| format!("Failed to set permissions: {}", e))?;
    }

    Ok(())
}
