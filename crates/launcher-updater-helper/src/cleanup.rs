//! The cleanup script that outlives the helper.
//!
//! The helper cannot delete its own executable, so it writes a short script
//! that waits for it to exit, removes it and the staging directories,
//! restarts the launcher and finally deletes itself.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::HelperConfig;

/// Staging directories removed after a launcher update.
///
/// Fixed: the helper's three arguments carry no staging paths, so these match
/// the launcher's default layout.
const STAGING_DIRS: [&str; 2] = ["launcher_updates", "updates"];

/// Everything the cleanup script acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupPlan {
    /// The helper executable.
    pub helper_path: PathBuf,
    /// Directories to remove recursively.
    pub staging_dirs: Vec<PathBuf>,
    /// Launcher to restart.
    pub launcher_path: PathBuf,
    /// Directory the launcher is restarted in.
    pub working_dir: PathBuf,
}

impl CleanupPlan {
    /// Builds the plan for a finished swap.
    pub fn new(config: &HelperConfig, helper_path: PathBuf) -> Self {
        let working_dir = config.install_dir().to_path_buf();
        Self {
            helper_path,
            staging_dirs: STAGING_DIRS.iter().map(|d| working_dir.join(d)).collect(),
            launcher_path: config.launcher_path.clone(),
            working_dir,
        }
    }
}

/// Windows batch rendering.
#[cfg_attr(not(windows), allow(dead_code))]
pub fn render_batch(plan: &CleanupPlan) -> String {
    let mut script = String::from("@echo off\r\ntimeout /t 1 /nobreak > nul\r\n");
    script.push_str(&format!("del /f /q \"{}\"\r\n", plan.helper_path.display()));
    for dir in &plan.staging_dirs {
        script.push_str(&format!(
            "if exist \"{0}\" rd /s /q \"{0}\"\r\n",
            dir.display()
        ));
    }
    script.push_str(&format!("cd /d \"{}\"\r\n", plan.working_dir.display()));
    script.push_str(&format!(
        "start \"\" \"{}\"\r\n",
        plan.launcher_path.display()
    ));
    script.push_str("del \"%~f0\"\r\n");
    script
}

/// POSIX shell rendering.
#[cfg_attr(windows, allow(dead_code))]
pub fn render_shell(plan: &CleanupPlan) -> String {
    let mut script = String::from("#!/bin/sh\nsleep 1\n");
    script.push_str(&format!("rm -f {}\n", shell_quote(&plan.helper_path)));
    for dir in &plan.staging_dirs {
        script.push_str(&format!("rm -rf {}\n", shell_quote(dir)));
    }
    script.push_str(&format!(
        "cd {} && nohup {} >/dev/null 2>&1 &\n",
        shell_quote(&plan.working_dir),
        shell_quote(&plan.launcher_path)
    ));
    script.push_str("rm -f \"$0\"\n");
    script
}

#[cfg_attr(windows, allow(dead_code))]
fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', "'\\''"))
}

/// Writes the platform's script into the launcher directory.
pub fn write_script(plan: &CleanupPlan) -> Result<PathBuf, String> {
    #[cfg(windows)]
    let (name, contents) = ("cleanup.bat", render_batch(plan));
    #[cfg(not(windows))]
    let (name, contents) = ("cleanup.sh", render_shell(plan));

    let path = plan.working_dir.join(name);
    fs::write(&path, contents).map_err(|e| format!("Failed to write {:?}: {}", path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .map_err(|e| format!("Failed to set permissions on {:?}: {}", path, e))?;
    }

    Ok(path)
}
